//! Process Control Facade - fork, waitpid and getpid for scripting hosts
//!
//! # Purpose
//! Exposes three process primitives with no added state: duplicate the
//! calling process, wait for a child to terminate, and query the current
//! process identifier. Each operation is exactly one OS call plus argument
//! marshalling and error translation.
//!
//! # Integration Points
//! - Depends on: `procutils-platform` (native POSIX or scripted mock backend)
//! - Provides to: the C ABI binding, the `procutils` CLI, Rust callers
//!
//! # Architecture
//! - [`ProcessControl`] is generic over a [`Platform`]; the free functions
//!   at the crate root use the native backend
//! - [`Termination`] collapses every abnormal end into exit code `-1` and
//!   keeps the decoded [`TerminationCause`] next to it
//! - [`bridge::ForkProcess`] offers a start/join/terminate handle on top
//!
//! # Testing Strategy
//! - Unit tests: status decoding and error translation against `MockPlatform`
//! - Integration tests: real fork/exit/signal scenarios (`tests/`)

mod control;
mod termination;

pub mod bridge;

pub use control::ProcessControl;
pub use termination::{Termination, TerminationCause, ABNORMAL_EXIT};

pub use procutils_platform::{
    exit_immediately, Errno, ForkOutcome, NativePlatform, Platform, ProcessId, Signal,
};

#[cfg(feature = "mock")]
pub use procutils_platform::{MockCall, MockPlatform};

use thiserror::Error;

/// Failures surfaced by the facade
///
/// Both map to the host's generic runtime error; the wrapped `Errno` is kept
/// for Rust callers.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Fork failed: {0}")]
    DuplicationFailed(#[source] Errno),

    #[error("Wait failed for process {pid}: {source}")]
    WaitFailed {
        pid: ProcessId,
        #[source]
        source: Errno,
    },
}

impl ProcessError {
    /// Underlying OS error number
    pub fn errno(&self) -> Errno {
        match *self {
            ProcessError::DuplicationFailed(errno) => errno,
            ProcessError::WaitFailed { source, .. } => source,
        }
    }
}

pub type Result<T> = core::result::Result<T, ProcessError>;

/// Duplicate the calling process
///
/// Returns [`ForkOutcome::Parent`] with the new process's id in the
/// originating process and [`ForkOutcome::Child`] in the new one.
///
/// # Safety
/// See [`Platform::fork`]: in a multi-threaded process the child may only do
/// async-signal-safe work before exiting.
pub unsafe fn duplicate_process() -> Result<ForkOutcome> {
    ProcessControl::native().duplicate_process()
}

/// Block until child `pid` terminates; returns its pid and exit code
pub fn await_process(pid: impl Into<ProcessId>) -> Result<Termination> {
    ProcessControl::native().await_process(pid)
}

/// Identifier of the calling process
pub fn current_process_id() -> ProcessId {
    ProcessControl::native().current_process_id()
}
