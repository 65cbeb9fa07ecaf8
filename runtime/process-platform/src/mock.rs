//! ⚠️  MOCK process backend
//!
//! # WARNING: No process is ever created here!
//!
//! Results are scripted ahead of time and handed out in order, so code built
//! on `Platform` can be unit tested without forking the test harness.
//!
//! ## Behaviour when nothing is scripted
//!
//! - `fork` fails with `EAGAIN`
//! - `wait`/`try_wait` fail with `ECHILD`
//! - `signal` succeeds
//! - `exit` panics with `mock exit(<code>)`

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use nix::errno::Errno;
use nix::sys::signal::Signal;

use crate::adapter::{ForkOutcome, Platform, ProcessId, WaitStatus};

/// Calls recorded by `MockPlatform`, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCall {
    Fork,
    Wait(ProcessId),
    TryWait(ProcessId),
    Signal(ProcessId, Option<Signal>),
    GetPid,
    Exit(i32),
}

/// Scripted platform
#[derive(Debug)]
pub struct MockPlatform {
    pid: ProcessId,
    forks: RefCell<VecDeque<Result<ForkOutcome, Errno>>>,
    waits: RefCell<HashMap<ProcessId, VecDeque<Result<WaitStatus, Errno>>>>,
    running_polls: RefCell<HashMap<ProcessId, usize>>,
    signal_errors: RefCell<HashMap<ProcessId, Errno>>,
    calls: RefCell<Vec<MockCall>>,
    exit_code: Cell<Option<i32>>,
}

impl MockPlatform {
    /// Create a mock whose own process id is `pid`
    pub fn new(pid: libc::pid_t) -> Self {
        Self {
            pid: ProcessId::from_raw(pid),
            forks: RefCell::new(VecDeque::new()),
            waits: RefCell::new(HashMap::new()),
            running_polls: RefCell::new(HashMap::new()),
            signal_errors: RefCell::new(HashMap::new()),
            calls: RefCell::new(Vec::new()),
            exit_code: Cell::new(None),
        }
    }

    /// Next `fork` returns `outcome`
    pub fn push_fork(&self, outcome: Result<ForkOutcome, Errno>) -> &Self {
        self.forks.borrow_mut().push_back(outcome);
        self
    }

    /// Next `wait`/`try_wait` on `pid` returns `result`
    pub fn push_wait(&self, pid: libc::pid_t, result: Result<WaitStatus, Errno>) -> &Self {
        self.waits
            .borrow_mut()
            .entry(ProcessId::from_raw(pid))
            .or_default()
            .push_back(result);
        self
    }

    /// The next `polls` calls to `try_wait(pid)` report the process as running
    pub fn set_running(&self, pid: libc::pid_t, polls: usize) -> &Self {
        self.running_polls
            .borrow_mut()
            .insert(ProcessId::from_raw(pid), polls);
        self
    }

    /// `signal(pid, ..)` fails with `errno` from now on
    pub fn fail_signal(&self, pid: libc::pid_t, errno: Errno) -> &Self {
        self.signal_errors
            .borrow_mut()
            .insert(ProcessId::from_raw(pid), errno);
        self
    }

    /// Calls made so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.borrow().clone()
    }

    /// Code passed to the last `exit`, if any
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code.get()
    }

    fn record(&self, call: MockCall) {
        self.calls.borrow_mut().push(call);
    }

    fn next_wait(&self, pid: ProcessId) -> Result<WaitStatus, Errno> {
        self.waits
            .borrow_mut()
            .get_mut(&pid)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Err(Errno::ECHILD))
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl Platform for MockPlatform {
    unsafe fn fork(&self) -> Result<ForkOutcome, Errno> {
        self.record(MockCall::Fork);
        self.forks
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(Errno::EAGAIN))
    }

    fn wait(&self, pid: ProcessId) -> Result<WaitStatus, Errno> {
        self.record(MockCall::Wait(pid));
        self.next_wait(pid)
    }

    fn try_wait(&self, pid: ProcessId) -> Result<Option<WaitStatus>, Errno> {
        self.record(MockCall::TryWait(pid));
        if let Some(polls) = self.running_polls.borrow_mut().get_mut(&pid) {
            if *polls > 0 {
                *polls -= 1;
                return Ok(None);
            }
        }
        self.next_wait(pid).map(Some)
    }

    fn signal(&self, pid: ProcessId, signal: Option<Signal>) -> Result<(), Errno> {
        self.record(MockCall::Signal(pid, signal));
        match self.signal_errors.borrow().get(&pid) {
            Some(errno) => Err(*errno),
            None => Ok(()),
        }
    }

    fn getpid(&self) -> ProcessId {
        self.record(MockCall::GetPid);
        self.pid
    }

    fn exit(&self, code: i32) -> ! {
        self.record(MockCall::Exit(code));
        self.exit_code.set(Some(code));
        panic!("mock exit({})", code);
    }
}
