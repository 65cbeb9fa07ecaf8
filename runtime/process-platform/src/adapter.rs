//! Platform Adapter Layer
//!
//! Defines the `Platform` trait every backend implements and the plain values
//! that cross it. Backends report failures as the raw `Errno`; giving them
//! meaning is left to the caller.

use core::fmt;

use nix::errno::Errno;
use nix::sys::signal::Signal;

// ========== Process Identifier ==========

/// Operating-system process identifier (`pid_t`)
///
/// Owned by the kernel; holding one does not keep the process alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(transparent))]
pub struct ProcessId(libc::pid_t);

impl ProcessId {
    /// Wrap a raw identifier as received from a caller or the kernel
    pub const fn from_raw(raw: libc::pid_t) -> Self {
        Self(raw)
    }

    /// Raw identifier
    pub const fn as_raw(self) -> libc::pid_t {
        self.0
    }
}

impl From<libc::pid_t> for ProcessId {
    fn from(raw: libc::pid_t) -> Self {
        Self(raw)
    }
}

impl From<nix::unistd::Pid> for ProcessId {
    fn from(pid: nix::unistd::Pid) -> Self {
        Self(pid.as_raw())
    }
}

impl From<ProcessId> for nix::unistd::Pid {
    fn from(pid: ProcessId) -> Self {
        nix::unistd::Pid::from_raw(pid.0)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ========== Fork Outcome ==========

/// Which side of a successful fork the caller is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkOutcome {
    /// Originating process; `child` is the new process
    Parent { child: ProcessId },

    /// Newly created process
    Child,
}

impl ForkOutcome {
    /// Classic integer form: the child's pid in the parent, 0 in the child
    pub const fn as_raw(self) -> libc::pid_t {
        match self {
            ForkOutcome::Parent { child } => child.as_raw(),
            ForkOutcome::Child => 0,
        }
    }

    pub const fn is_child(self) -> bool {
        matches!(self, ForkOutcome::Child)
    }
}

// ========== Wait Status ==========

/// Decoded `waitpid` status of a reaped process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "state", rename_all = "snake_case"))]
pub enum WaitStatus {
    /// Called exit with `code` (0..=255)
    Exited { pid: ProcessId, code: i32 },

    /// Terminated by signal number `signal`
    Signaled {
        pid: ProcessId,
        signal: i32,
        core_dumped: bool,
    },

    /// Any other state change reported by the kernel
    Other { pid: ProcessId },
}

impl WaitStatus {
    /// Decode a raw status word as filled in by `waitpid`
    pub fn from_raw(pid: ProcessId, status: libc::c_int) -> Self {
        if libc::WIFEXITED(status) {
            WaitStatus::Exited {
                pid,
                code: libc::WEXITSTATUS(status),
            }
        } else if libc::WIFSIGNALED(status) {
            WaitStatus::Signaled {
                pid,
                signal: libc::WTERMSIG(status),
                core_dumped: libc::WCOREDUMP(status),
            }
        } else {
            WaitStatus::Other { pid }
        }
    }

    /// Process the status belongs to
    pub const fn pid(&self) -> ProcessId {
        match *self {
            WaitStatus::Exited { pid, .. }
            | WaitStatus::Signaled { pid, .. }
            | WaitStatus::Other { pid } => pid,
        }
    }
}

// ========== Platform Trait ==========

/// Process calls a backend must provide
///
/// Every method maps onto exactly one underlying call. Nothing is retried,
/// including `EINTR`.
pub trait Platform {
    /// Duplicate the calling process
    ///
    /// # Safety
    /// In a multi-threaded process the child may only perform
    /// async-signal-safe operations until it execs or exits.
    unsafe fn fork(&self) -> Result<ForkOutcome, Errno>;

    /// Block until `pid` terminates and reap it
    fn wait(&self, pid: ProcessId) -> Result<WaitStatus, Errno>;

    /// Reap `pid` if it has terminated, `Ok(None)` if it is still running
    fn try_wait(&self, pid: ProcessId) -> Result<Option<WaitStatus>, Errno>;

    /// Deliver `signal` to `pid`; `None` only checks that it can be signalled
    fn signal(&self, pid: ProcessId, signal: Option<Signal>) -> Result<(), Errno>;

    /// Identifier of the calling process
    fn getpid(&self) -> ProcessId;

    /// Terminate the calling process without running exit handlers
    fn exit(&self, code: i32) -> !;
}

impl<P: Platform + ?Sized> Platform for &P {
    unsafe fn fork(&self) -> Result<ForkOutcome, Errno> {
        (**self).fork()
    }

    fn wait(&self, pid: ProcessId) -> Result<WaitStatus, Errno> {
        (**self).wait(pid)
    }

    fn try_wait(&self, pid: ProcessId) -> Result<Option<WaitStatus>, Errno> {
        (**self).try_wait(pid)
    }

    fn signal(&self, pid: ProcessId, signal: Option<Signal>) -> Result<(), Errno> {
        (**self).signal(pid, signal)
    }

    fn getpid(&self) -> ProcessId {
        (**self).getpid()
    }

    fn exit(&self, code: i32) -> ! {
        (**self).exit(code)
    }
}
