//! process_utils - C ABI binding for scripting hosts
//!
//! # Purpose
//! Exports the process control facade as plain C functions so an embedding
//! runtime can register them as `fork`, `wait` and `getpid` in its own
//! module table.
//!
//! # Error Model
//! A failing call returns `-1` and stores a message in a per-thread slot.
//! The host turns that into its generic runtime error after reading it with
//! [`process_utils_last_error`]. Messages are the facade's error text, e.g.
//! `Fork failed: EAGAIN: ...` or `Wait failed for process 12: ECHILD: ...`.
//!
//! # Exported Symbols
//! - `pid_t process_utils_fork(void)`
//! - `int process_utils_wait(pid_t pid, pid_t *out_pid, int *out_exit_code)`
//! - `pid_t process_utils_getpid(void)`
//! - `size_t process_utils_last_error(char *buf, size_t len)`
//! - `void process_utils_clear_error(void)`

use std::cell::RefCell;
use std::fmt::Display;
use std::ptr;

use libc::{c_char, c_int, pid_t};
use procutils_posix::{await_process, current_process_id, duplicate_process};

/// Module name hosts register the functions under
pub const MODULE_NAME: &str = "process_utils";

/// Module docstring
pub const MODULE_DOC: &str = "Process creation and management utilities using system calls";

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

fn set_last_error(error: impl Display) {
    let message = error.to_string();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

/// Create a new process using fork()
///
/// Returns the child's pid in the parent, 0 in the child, and -1 with the
/// runtime error set if no process could be created.
///
/// # Safety
/// If the calling process has more than one thread, the child may only make
/// async-signal-safe calls until it execs or exits, as with `fork(2)` itself.
#[no_mangle]
pub unsafe extern "C" fn process_utils_fork() -> pid_t {
    match duplicate_process() {
        Ok(outcome) => outcome.as_raw(),
        Err(err) => {
            set_last_error(err);
            -1
        }
    }
}

/// Wait for a child process to terminate
///
/// On success writes the child's pid and exit code (-1 for any abnormal
/// termination) and returns 0. Returns -1 with the runtime error set if the
/// wait fails or an out-pointer is null; nothing is written in that case.
///
/// # Safety
/// `out_pid` and `out_exit_code` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn process_utils_wait(
    pid: pid_t,
    out_pid: *mut pid_t,
    out_exit_code: *mut c_int,
) -> c_int {
    if out_pid.is_null() || out_exit_code.is_null() {
        set_last_error("Wait failed: null output pointer");
        return -1;
    }

    match await_process(pid) {
        Ok(termination) => {
            let (pid, exit_code) = termination.into_pair();
            *out_pid = pid.as_raw();
            *out_exit_code = exit_code;
            0
        }
        Err(err) => {
            set_last_error(err);
            -1
        }
    }
}

/// Get current process ID
#[no_mangle]
pub extern "C" fn process_utils_getpid() -> pid_t {
    current_process_id().as_raw()
}

/// Copy the calling thread's last runtime error into `buf`
///
/// Writes at most `len - 1` bytes followed by a NUL. Returns the full
/// message length in bytes, or 0 when no error is set. With a null `buf` or
/// zero `len` only the length is returned.
///
/// # Safety
/// `buf` must be null or valid for `len` bytes of writes.
#[no_mangle]
pub unsafe extern "C" fn process_utils_last_error(buf: *mut c_char, len: usize) -> usize {
    let message = LAST_ERROR.with(|slot| slot.borrow().clone()).unwrap_or_default();

    if !buf.is_null() && len > 0 {
        let copied = message.len().min(len - 1);
        ptr::copy_nonoverlapping(message.as_ptr().cast::<c_char>(), buf, copied);
        *buf.add(copied) = 0;
    }
    message.len()
}

/// Forget the calling thread's last runtime error
#[no_mangle]
pub extern "C" fn process_utils_clear_error() {
    LAST_ERROR.with(|slot| slot.borrow_mut().take());
}
