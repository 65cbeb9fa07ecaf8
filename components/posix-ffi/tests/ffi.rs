//! Integration tests for the exported C functions

use std::ffi::CStr;
use std::ptr;

use libc::c_char;
use process_utils::*;

fn last_error() -> String {
    let mut buf = [0 as c_char; 256];
    unsafe { process_utils_last_error(buf.as_mut_ptr(), buf.len()) };
    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

#[test]
fn test_getpid_matches_std() {
    assert_eq!(process_utils_getpid() as u32, std::process::id());
}

#[test]
fn test_fork_then_wait_returns_exit_code() {
    // The child only calls async-signal-safe functions
    let pid = unsafe { process_utils_fork() };
    if pid == 0 {
        unsafe { libc::_exit(7) };
    }
    assert!(pid > 0, "fork failed: {}", last_error());

    let (mut out_pid, mut exit_code) = (0, 0);
    let rc = unsafe { process_utils_wait(pid, &mut out_pid, &mut exit_code) };
    assert_eq!(rc, 0);
    assert_eq!((out_pid, exit_code), (pid, 7));
}

#[test]
fn test_signaled_child_reports_minus_one() {
    // The child only calls async-signal-safe functions
    let pid = unsafe { process_utils_fork() };
    if pid == 0 {
        unsafe {
            libc::kill(libc::getpid(), libc::SIGKILL);
            libc::_exit(0);
        }
    }
    assert!(pid > 0, "fork failed: {}", last_error());

    let (mut out_pid, mut exit_code) = (0, 0);
    let rc = unsafe { process_utils_wait(pid, &mut out_pid, &mut exit_code) };
    assert_eq!(rc, 0);
    assert_eq!((out_pid, exit_code), (pid, -1));
}

#[test]
fn test_wait_on_non_child_sets_runtime_error() {
    process_utils_clear_error();
    let (mut out_pid, mut exit_code) = (-5, -5);
    let rc = unsafe { process_utils_wait(process_utils_getpid(), &mut out_pid, &mut exit_code) };

    assert_eq!(rc, -1);
    assert_eq!((out_pid, exit_code), (-5, -5));
    let message = last_error();
    assert!(message.starts_with("Wait failed"), "{message}");
    assert!(message.contains("ECHILD"), "{message}");

    process_utils_clear_error();
    assert_eq!(unsafe { process_utils_last_error(ptr::null_mut(), 0) }, 0);
}

#[test]
fn test_module_metadata() {
    assert_eq!(MODULE_NAME, "process_utils");
    assert!(!MODULE_DOC.is_empty());
}
