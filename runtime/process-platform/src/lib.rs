//! # Process Platform Abstraction Layer
//!
//! This crate provides a unified API over the calls that create, reap and
//! identify processes:
//! - **Native**: one POSIX call per operation (default)
//! - **Mock**: scripted results for unit tests (feature `mock`)
//!
//! ## Usage
//!
//! ```no_run
//! use procutils_platform::{ForkOutcome, NativePlatform, Platform};
//!
//! let platform = NativePlatform;
//! match unsafe { platform.fork() } {
//!     Ok(ForkOutcome::Child) => platform.exit(0),
//!     Ok(ForkOutcome::Parent { child }) => {
//!         let status = platform.wait(child).expect("wait");
//!         println!("{} -> {:?}", child, status);
//!     }
//!     Err(errno) => eprintln!("fork: {}", errno),
//! }
//! ```
//!
//! ## Build Modes
//!
//! ```bash
//! # Native only
//! cargo build
//!
//! # Native + scripted mock
//! cargo build --features mock
//! ```

/// Platform trait and the values it exchanges
///
/// This is the module procutils crates should use.
pub mod adapter;

/// Native backend (POSIX calls)
pub mod syscalls;

/// Scripted backend for tests
#[cfg(feature = "mock")]
pub mod mock;

pub use adapter::{ForkOutcome, Platform, ProcessId, WaitStatus};
pub use syscalls::{exit_immediately, NativePlatform};

#[cfg(feature = "mock")]
pub use mock::{MockCall, MockPlatform};

pub use nix::errno::Errno;
pub use nix::sys::signal::Signal;
