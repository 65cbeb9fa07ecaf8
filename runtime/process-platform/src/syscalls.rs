//! Native POSIX backend
//!
//! One call per operation. `fork`, `kill` and `getpid` go through nix;
//! `waitpid` goes through libc so that statuses carrying signal numbers nix
//! has no `Signal` variant for (real-time signals) still decode.

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::{self, ForkResult};

use crate::adapter::{ForkOutcome, Platform, ProcessId, WaitStatus};

/// Backend that talks to the running kernel
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePlatform;

impl Platform for NativePlatform {
    unsafe fn fork(&self) -> Result<ForkOutcome, Errno> {
        match unistd::fork()? {
            // Nothing else happens on this side: the child is restricted to
            // async-signal-safe calls.
            ForkResult::Child => Ok(ForkOutcome::Child),
            ForkResult::Parent { child } => {
                log::trace!("fork: created process {}", child);
                Ok(ForkOutcome::Parent {
                    child: child.into(),
                })
            }
        }
    }

    fn wait(&self, pid: ProcessId) -> Result<WaitStatus, Errno> {
        let mut status: libc::c_int = 0;
        let reaped = Errno::result(unsafe { libc::waitpid(pid.as_raw(), &mut status, 0) })?;
        let decoded = WaitStatus::from_raw(ProcessId::from_raw(reaped), status);
        log::trace!("waitpid({}) -> {:?}", pid, decoded);
        Ok(decoded)
    }

    fn try_wait(&self, pid: ProcessId) -> Result<Option<WaitStatus>, Errno> {
        let mut status: libc::c_int = 0;
        let reaped =
            Errno::result(unsafe { libc::waitpid(pid.as_raw(), &mut status, libc::WNOHANG) })?;
        if reaped == 0 {
            return Ok(None);
        }
        let decoded = WaitStatus::from_raw(ProcessId::from_raw(reaped), status);
        log::trace!("waitpid({}, WNOHANG) -> {:?}", pid, decoded);
        Ok(Some(decoded))
    }

    fn signal(&self, pid: ProcessId, signal: Option<Signal>) -> Result<(), Errno> {
        signal::kill(pid.into(), signal)
    }

    fn getpid(&self) -> ProcessId {
        unistd::getpid().into()
    }

    fn exit(&self, code: i32) -> ! {
        exit_immediately(code)
    }
}

/// Terminate the calling process with `code` via `_exit`
///
/// Skips atexit handlers and stdio flushing, so a forked child never replays
/// state inherited from its parent.
pub fn exit_immediately(code: i32) -> ! {
    unsafe { libc::_exit(code) }
}
