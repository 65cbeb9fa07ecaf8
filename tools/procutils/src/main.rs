//! procutils - CLI driver for the process control facade
//!
//! Commands:
//! - `procutils pid` - Print the current process id
//! - `procutils exit <CODE>` - Fork a child that exits with CODE, then await it
//! - `procutils signal [--signal NAME]` - Fork a child that signals itself, then await it
//! - `procutils wait <PID>` - Await an arbitrary process id
//!
//! `--json` switches every command to one JSON object per line on stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use procutils_posix::{
    await_process, current_process_id, duplicate_process, exit_immediately, ForkOutcome,
    NativePlatform, Platform, ProcessId, Signal, Termination, TerminationCause,
};

/// Child exit status when it could not signal itself
const SIGNAL_NOT_SENT: i32 = 125;

/// Child exit status when it outlived its own signal
const SIGNAL_SURVIVED: i32 = 126;

#[derive(Parser)]
#[command(name = "procutils")]
#[command(version)]
#[command(about = "Duplicate, await and identify processes", long_about = None)]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current process id
    Pid,

    /// Fork a child that exits with CODE and await it
    Exit {
        /// Exit status for the child (0-255)
        code: u8,
    },

    /// Fork a child that terminates itself with a signal and await it
    Signal {
        /// Signal name, with or without the SIG prefix
        #[arg(short, long, default_value = "SIGKILL", value_parser = parse_signal)]
        signal: Signal,
    },

    /// Await PID, which must be a child of this process
    Wait {
        /// Process id to wait for
        #[arg(allow_hyphen_values = true)]
        pid: i32,
    },
}

fn parse_signal(name: &str) -> std::result::Result<Signal, String> {
    let upper = name.to_ascii_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{}", upper)
    };

    let signal: Signal = full
        .parse()
        .map_err(|_| format!("unknown signal '{}'", name))?;

    // A stopped child is never reported by a plain wait
    match signal {
        Signal::SIGSTOP | Signal::SIGTSTP | Signal::SIGTTIN | Signal::SIGTTOU => {
            Err(format!("{} would stop the child instead of ending it", full))
        }
        Signal::SIGCHLD | Signal::SIGCONT | Signal::SIGURG | Signal::SIGWINCH => {
            Err(format!("{} is ignored by default and would not end the child", full))
        }
        _ => Ok(signal),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Pid => {
            show_pid(current_process_id(), cli.json);
        }

        Commands::Exit { code } => {
            let child = spawn_child(|| exit_immediately(i32::from(code)))?;
            report(child, cli.json)?;
        }

        Commands::Signal { signal } => {
            let child = spawn_child(move || {
                let platform = NativePlatform;
                if platform.signal(platform.getpid(), Some(signal)).is_err() {
                    exit_immediately(SIGNAL_NOT_SENT)
                }
                // Reached only if the disposition inherited from us ignores it
                exit_immediately(SIGNAL_SURVIVED)
            })?;
            let termination = report(child, cli.json)?;
            ensure_signaled(&termination, signal)?;
        }

        Commands::Wait { pid } => {
            report(ProcessId::from_raw(pid), cli.json)?;
        }
    }

    Ok(())
}

/// Fork; the child runs `body` and never returns
fn spawn_child(body: impl FnOnce()) -> Result<ProcessId> {
    // Single-threaded here, so the child is free to run `body`.
    let outcome = unsafe { duplicate_process() }.context("Failed to create child process")?;
    match outcome {
        ForkOutcome::Child => {
            body();
            exit_immediately(0)
        }
        ForkOutcome::Parent { child } => {
            log::info!("Started child {}", child);
            Ok(child)
        }
    }
}

fn report(pid: ProcessId, json: bool) -> Result<Termination> {
    let termination =
        await_process(pid).with_context(|| format!("Failed to await process {}", pid))?;

    if json {
        println!("{}", serde_json::to_string(&termination)?);
    } else {
        println!("{}", describe(&termination));
    }
    Ok(termination)
}

fn ensure_signaled(termination: &Termination, signal: Signal) -> Result<()> {
    match termination.cause {
        TerminationCause::Signaled { .. } => Ok(()),
        TerminationCause::Exited { code } if code == SIGNAL_NOT_SENT => {
            anyhow::bail!("Child {} could not send {} to itself", termination.pid, signal)
        }
        _ => anyhow::bail!(
            "Child {} was not terminated by {} (exit code {})",
            termination.pid,
            signal,
            termination.exit_code
        ),
    }
}

fn show_pid(pid: ProcessId, json: bool) {
    if json {
        println!("{}", serde_json::json!({ "pid": pid }));
    } else {
        println!("{}", pid);
    }
}

fn describe(termination: &Termination) -> String {
    let pid = termination.pid.to_string().bold();
    match termination.cause {
        TerminationCause::Exited { code } if code == 0 => {
            format!("{} {} exited with code {}", "✓".green(), pid, code)
        }
        TerminationCause::Exited { code } => {
            format!("{} {} exited with code {}", "✗".yellow(), pid, code)
        }
        TerminationCause::Signaled {
            signal,
            core_dumped,
        } => format!(
            "{} {} killed by signal {}{} (exit code {})",
            "✗".red(),
            pid,
            signal,
            if core_dumped { ", core dumped" } else { "" },
            termination.exit_code
        ),
        TerminationCause::Other => format!(
            "{} {} ended abnormally (exit code {})",
            "✗".red(),
            pid,
            termination.exit_code
        ),
    }
}
