//! Termination result of an awaited child

use procutils_platform::{ProcessId, WaitStatus};

/// Exit code reported for any termination other than a normal exit
pub const ABNORMAL_EXIT: i32 = -1;

/// How a reaped process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum TerminationCause {
    /// Normal exit with the declared status
    Exited { code: i32 },

    /// Killed by a signal
    Signaled { signal: i32, core_dumped: bool },

    /// Any other reported state
    Other,
}

/// `(pid, exit_code)` pair returned by a successful wait
///
/// `exit_code` is the declared status for a normal exit and
/// [`ABNORMAL_EXIT`] otherwise. The signal number dropped by that collapse
/// is still available through [`Termination::cause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Termination {
    pub pid: ProcessId,
    pub exit_code: i32,
    pub cause: TerminationCause,
}

impl Termination {
    /// True for a normal exit with status 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn is_abnormal(&self) -> bool {
        !matches!(self.cause, TerminationCause::Exited { .. })
    }

    /// Signal that ended the process, if any
    pub fn signal(&self) -> Option<i32> {
        match self.cause {
            TerminationCause::Signaled { signal, .. } => Some(signal),
            _ => None,
        }
    }

    /// Plain tuple form, as handed to scripting hosts
    pub fn into_pair(self) -> (ProcessId, i32) {
        (self.pid, self.exit_code)
    }
}

impl From<WaitStatus> for Termination {
    fn from(status: WaitStatus) -> Self {
        let (exit_code, cause) = match status {
            WaitStatus::Exited { code, .. } => (code, TerminationCause::Exited { code }),
            WaitStatus::Signaled {
                signal,
                core_dumped,
                ..
            } => (
                ABNORMAL_EXIT,
                TerminationCause::Signaled {
                    signal,
                    core_dumped,
                },
            ),
            WaitStatus::Other { .. } => (ABNORMAL_EXIT, TerminationCause::Other),
        };

        Termination {
            pid: status.pid(),
            exit_code,
            cause,
        }
    }
}
