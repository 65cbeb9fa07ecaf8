//! ProcessControl - the three facade operations over a platform backend

use procutils_platform::{ForkOutcome, NativePlatform, Platform, ProcessId};

use crate::{ProcessError, Result, Termination};

/// Stateless facade over a [`Platform`]
///
/// Holds nothing between calls; the process table belongs to the kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessControl<P: Platform = NativePlatform> {
    platform: P,
}

impl ProcessControl<NativePlatform> {
    /// Facade over the running kernel
    pub const fn native() -> Self {
        Self {
            platform: NativePlatform,
        }
    }
}

impl<P: Platform> ProcessControl<P> {
    /// Facade over an explicit backend
    pub fn new(platform: P) -> Self {
        Self { platform }
    }

    /// Backend in use
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Duplicate the calling process
    ///
    /// No retry: a failed fork is returned to the caller as
    /// [`ProcessError::DuplicationFailed`].
    ///
    /// # Safety
    /// See [`Platform::fork`].
    pub unsafe fn duplicate_process(&self) -> Result<ForkOutcome> {
        let outcome = self
            .platform
            .fork()
            .map_err(ProcessError::DuplicationFailed)?;

        if let ForkOutcome::Parent { child } = outcome {
            log::debug!("duplicated process, child is {}", child);
        }
        Ok(outcome)
    }

    /// Block until `pid` terminates
    ///
    /// The identifier is passed to the kernel unchecked. Errors from the wait
    /// call itself (not a child, no such process, interrupted) become
    /// [`ProcessError::WaitFailed`].
    pub fn await_process(&self, pid: impl Into<ProcessId>) -> Result<Termination> {
        let pid = pid.into();
        let status = self
            .platform
            .wait(pid)
            .map_err(|source| ProcessError::WaitFailed { pid, source })?;

        let termination = Termination::from(status);
        log::debug!(
            "process {} terminated with exit code {}",
            termination.pid,
            termination.exit_code
        );
        Ok(termination)
    }

    /// Identifier of the calling process
    pub fn current_process_id(&self) -> ProcessId {
        self.platform.getpid()
    }
}
