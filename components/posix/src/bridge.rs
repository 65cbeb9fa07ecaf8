//! ForkProcess - a start/join/terminate handle built on the facade
//!
//! Mirrors the `multiprocessing.Process` surface scripting hosts expect:
//! the target runs in a forked child, which then exits on its own.
//!
//! ```no_run
//! use std::time::Duration;
//! use procutils_posix::bridge::ForkProcess;
//!
//! let mut worker = ForkProcess::new(|| {
//!     // runs in the child
//! });
//! unsafe { worker.start() }.expect("start");
//! worker.join(Some(Duration::from_secs(5))).expect("join");
//! println!("exit code: {:?}", worker.exit_code());
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

use procutils_platform::{Errno, ForkOutcome, NativePlatform, Platform, ProcessId, Signal};
use thiserror::Error;

use crate::{ProcessControl, ProcessError, Termination};

/// Interval between liveness checks in a bounded `join`
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Exit status of a child whose target panicked
pub const TARGET_PANICKED: i32 = 1;

/// ForkProcess error types
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Process already started")]
    AlreadyStarted,

    #[error("Cannot set daemon status of active process")]
    DaemonOnActive,

    #[error("Failed to signal process {pid}: {source}")]
    Signal {
        pid: ProcessId,
        #[source]
        source: Errno,
    },
}

pub type BridgeResult<T> = core::result::Result<T, BridgeError>;

type Target = Box<dyn FnOnce() + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Running(ProcessId),
    Finished(ProcessId),
}

/// Child process running a closure
pub struct ForkProcess<P: Platform = NativePlatform> {
    control: ProcessControl<P>,
    target: Option<Target>,
    daemon: Option<bool>,
    state: State,
    exit_code: Option<i32>,
}

impl ForkProcess<NativePlatform> {
    /// Handle for `target`, not yet started
    pub fn new<F>(target: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self::with_platform(NativePlatform, target)
    }
}

impl<P: Platform> ForkProcess<P> {
    /// Handle for `target` on an explicit backend
    pub fn with_platform<F>(platform: P, target: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            control: ProcessControl::new(platform),
            target: Some(Box::new(target)),
            daemon: None,
            state: State::Created,
            exit_code: None,
        }
    }

    /// Fork and run the target in the child
    ///
    /// Never returns in the child: after the target finishes the child exits
    /// with 0, or [`TARGET_PANICKED`] if the target panicked.
    ///
    /// # Safety
    /// See [`Platform::fork`]. The target itself runs in the child, so it is
    /// bound by the same restrictions.
    pub unsafe fn start(&mut self) -> BridgeResult<()> {
        if self.state != State::Created {
            return Err(BridgeError::AlreadyStarted);
        }

        match self.control.duplicate_process()? {
            ForkOutcome::Child => {
                let code = match self.target.take() {
                    Some(target) => match panic::catch_unwind(AssertUnwindSafe(target)) {
                        Ok(()) => 0,
                        Err(_) => {
                            log::error!("Error in process: target panicked");
                            TARGET_PANICKED
                        }
                    },
                    None => 0,
                };
                self.control.platform().exit(code)
            }
            ForkOutcome::Parent { child } => {
                self.target = None;
                self.state = State::Running(child);
                Ok(())
            }
        }
    }

    /// Child's pid once started
    pub fn pid(&self) -> Option<ProcessId> {
        match self.state {
            State::Created => None,
            State::Running(pid) | State::Finished(pid) => Some(pid),
        }
    }

    /// Exit code once the child has been reaped
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn daemon(&self) -> Option<bool> {
        self.daemon
    }

    pub fn set_daemon(&mut self, daemon: bool) -> BridgeResult<()> {
        if self.state != State::Created {
            return Err(BridgeError::DaemonOnActive);
        }
        self.daemon = Some(daemon);
        Ok(())
    }

    /// Whether the child is still running
    ///
    /// Reaps the child if it has finished. A child the kernel no longer
    /// reports (reaped elsewhere) counts as not alive.
    pub fn is_alive(&mut self) -> bool {
        let pid = match self.state {
            State::Running(pid) => pid,
            State::Created | State::Finished(_) => return false,
        };

        match self.control.platform().try_wait(pid) {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.finish(pid, Some(Termination::from(status)));
                false
            }
            Err(errno) => {
                log::debug!("liveness check on {} failed: {}", pid, errno);
                self.finish(pid, None);
                false
            }
        }
    }

    /// Wait for the child to terminate
    ///
    /// Without a timeout this blocks in [`ProcessControl::await_process`].
    /// With one it polls every [`POLL_INTERVAL`] and returns once the child
    /// is gone or the timeout has elapsed, whichever comes first.
    pub fn join(&mut self, timeout: Option<Duration>) -> BridgeResult<()> {
        let pid = match self.state {
            State::Running(pid) => pid,
            State::Created | State::Finished(_) => return Ok(()),
        };

        match timeout {
            None => {
                let termination = self.control.await_process(pid)?;
                self.finish(pid, Some(termination));
            }
            Some(timeout) => {
                let started = Instant::now();
                while self.is_alive() {
                    if started.elapsed() > timeout {
                        break;
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
        Ok(())
    }

    /// Ask the child to stop with SIGTERM
    ///
    /// A child that already disappeared is not an error.
    pub fn terminate(&mut self) -> BridgeResult<()> {
        let pid = match self.state {
            State::Running(pid) => pid,
            State::Created | State::Finished(_) => return Ok(()),
        };

        match self.control.platform().signal(pid, Some(Signal::SIGTERM)) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(source) => Err(BridgeError::Signal { pid, source }),
        }
    }

    fn finish(&mut self, pid: ProcessId, termination: Option<Termination>) {
        self.state = State::Finished(pid);
        self.exit_code = termination.map(|t| t.exit_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procutils_platform::{MockCall, MockPlatform, WaitStatus};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    const CHILD: i32 = 501;

    fn child() -> ProcessId {
        ProcessId::from_raw(CHILD)
    }

    fn started(mock: MockPlatform) -> ForkProcess<MockPlatform> {
        mock.push_fork(Ok(ForkOutcome::Parent { child: child() }));
        let mut process = ForkProcess::with_platform(mock, || {});
        unsafe { process.start() }.unwrap();
        process
    }

    #[test]
    fn test_not_started_is_inert() {
        let mut process = ForkProcess::with_platform(MockPlatform::default(), || {});
        assert_eq!(process.pid(), None);
        assert!(!process.is_alive());
        assert_eq!(process.join(None), Ok(()));
        assert_eq!(process.terminate(), Ok(()));
        assert!(process.control.platform().calls().is_empty());
    }

    #[test]
    fn test_start_records_child() {
        let mut process = started(MockPlatform::default());
        assert_eq!(process.pid(), Some(child()));
        assert_eq!(unsafe { process.start() }, Err(BridgeError::AlreadyStarted));
    }

    #[test]
    fn test_start_failure_propagates() {
        let mock = MockPlatform::default();
        mock.push_fork(Err(Errno::EAGAIN));
        let mut process = ForkProcess::with_platform(mock, || {});

        let err = unsafe { process.start() }.unwrap_err();
        assert_eq!(
            err,
            BridgeError::Process(ProcessError::DuplicationFailed(Errno::EAGAIN))
        );
        assert_eq!(process.pid(), None);
    }

    #[test]
    fn test_child_side_runs_target_then_exits() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let mock = MockPlatform::default();
        mock.push_fork(Ok(ForkOutcome::Child));
        let mut process = ForkProcess::with_platform(mock, move || {
            flag.store(true, Ordering::SeqCst);
        });

        let result = panic::catch_unwind(AssertUnwindSafe(|| unsafe { process.start() }));
        assert!(result.is_err(), "mock exit should unwind");
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(process.control.platform().exit_code(), Some(0));
    }

    #[test]
    fn test_child_side_panicking_target() {
        let mock = MockPlatform::default();
        mock.push_fork(Ok(ForkOutcome::Child));
        let mut process = ForkProcess::with_platform(mock, || panic!("boom"));

        let _ = panic::catch_unwind(AssertUnwindSafe(|| unsafe { process.start() }));
        assert_eq!(process.control.platform().exit_code(), Some(TARGET_PANICKED));
    }

    #[test]
    fn test_daemon_flag() {
        let mut process = ForkProcess::with_platform(MockPlatform::default(), || {});
        assert_eq!(process.daemon(), None);
        process.set_daemon(true).unwrap();
        assert_eq!(process.daemon(), Some(true));

        let mut process = started(MockPlatform::default());
        assert_eq!(process.set_daemon(false), Err(BridgeError::DaemonOnActive));
        assert_eq!(
            BridgeError::DaemonOnActive.to_string(),
            "Cannot set daemon status of active process"
        );
    }

    #[test]
    fn test_is_alive_reaps_finished_child() {
        let mock = MockPlatform::default();
        mock.set_running(CHILD, 1)
            .push_wait(CHILD, Ok(WaitStatus::Exited { pid: child(), code: 3 }));
        let mut process = started(mock);

        assert!(process.is_alive());
        assert!(!process.is_alive());
        assert_eq!(process.exit_code(), Some(3));
        // Already reaped: no further kernel calls
        let before = process.control.platform().calls().len();
        assert!(!process.is_alive());
        assert_eq!(process.control.platform().calls().len(), before);
    }

    #[test]
    fn test_join_without_timeout_waits() {
        let mock = MockPlatform::default();
        mock.push_wait(
            CHILD,
            Ok(WaitStatus::Signaled {
                pid: child(),
                signal: 15,
                core_dumped: false,
            }),
        );
        let mut process = started(mock);

        process.join(None).unwrap();
        assert_eq!(process.exit_code(), Some(-1));
        assert!(process
            .control
            .platform()
            .calls()
            .contains(&MockCall::Wait(child())));
    }

    #[test]
    fn test_join_without_timeout_propagates_wait_failure() {
        let mut process = started(MockPlatform::default());
        let err = process.join(None).unwrap_err();
        assert_eq!(
            err,
            BridgeError::Process(ProcessError::WaitFailed {
                pid: child(),
                source: Errno::ECHILD,
            })
        );
    }

    #[test]
    fn test_join_with_timeout_polls_until_exit() {
        let mock = MockPlatform::default();
        mock.set_running(CHILD, 3)
            .push_wait(CHILD, Ok(WaitStatus::Exited { pid: child(), code: 0 }));
        let mut process = started(mock);

        process.join(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(process.exit_code(), Some(0));
        let polls = process
            .control
            .platform()
            .calls()
            .into_iter()
            .filter(|call| *call == MockCall::TryWait(child()))
            .count();
        assert_eq!(polls, 4);
    }

    #[test]
    fn test_join_with_timeout_gives_up() {
        let mock = MockPlatform::default();
        mock.set_running(CHILD, usize::MAX);
        let mut process = started(mock);

        process.join(Some(Duration::from_millis(30))).unwrap();
        assert_eq!(process.exit_code(), None);
        assert_eq!(process.pid(), Some(child()));
        assert!(process.is_alive());
    }

    #[test]
    fn test_terminate_sends_sigterm() {
        let mut process = started(MockPlatform::default());
        process.terminate().unwrap();
        assert!(process
            .control
            .platform()
            .calls()
            .contains(&MockCall::Signal(child(), Some(Signal::SIGTERM))));
    }

    #[test]
    fn test_terminate_tolerates_vanished_child() {
        let mock = MockPlatform::default();
        mock.fail_signal(CHILD, Errno::ESRCH);
        let mut process = started(mock);
        assert_eq!(process.terminate(), Ok(()));
    }

    #[test]
    fn test_terminate_reports_other_failures() {
        let mock = MockPlatform::default();
        mock.fail_signal(CHILD, Errno::EPERM);
        let mut process = started(mock);
        assert_eq!(
            process.terminate(),
            Err(BridgeError::Signal {
                pid: child(),
                source: Errno::EPERM,
            })
        );
    }
}
