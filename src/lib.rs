//! Pulselock: monitor-style synchronization built from primitive parts.
//!
//! # Overview
//!
//! This crate rebuilds classic monitor semantics — mutual exclusion plus a
//! wait/notify condition variable keyed by a lock identity — from two
//! primitive building blocks: a mutex/condvar pair and a one-shot
//! auto-resetting signal constructed on top of it. It also provides an
//! independent closure-scoped lock that tracks ownership by thread identity
//! and hands control between threads with a pair of raw signals.
//!
//! # Core Guarantees
//!
//! - **Mutual exclusion**: at most one thread holds a key's lock (or a
//!   [`ClosureLock`]'s ownership) at any time
//! - **Unconditional reacquisition**: [`Monitor::wait`] always returns with
//!   the key's lock re-held, whether it was pulsed or timed out
//! - **FIFO pulse delivery**: [`Monitor::pulse`] wakes the oldest registered
//!   waiter; [`Monitor::pulse_all`] wakes a point-in-time snapshot and never
//!   touches waiters that register later
//! - **No lost pulses at the boundary**: waiters register before releasing
//!   the user lock, and a pulse consumed by a timed-out waiter is handed to
//!   the next one in line
//! - **Unconditional cleanup**: [`ClosureLock::run`] releases ownership even
//!   when the closure panics, and rethrows the panic afterwards
//!
//! # Module Structure
//!
//! - [`signal`]: one-shot auto-resetting wake primitive
//! - [`monitor`]: identity-keyed locks with wait/pulse condition signalling
//! - [`closure_lock`]: closure-scoped handoff lock built on two signals
//! - [`test_logging`]: typed-event logger for concurrency tests
//!
//! # Example
//!
//! ```
//! use pulselock::{Monitor, MonitorKey};
//! use std::time::Duration;
//!
//! let monitor = Monitor::new();
//! let key = MonitorKey::new();
//!
//! monitor.enter(&key);
//! // No pulse is coming: the wait times out and reacquires the lock.
//! let woken = monitor.wait_for(&key, Duration::from_millis(10)).unwrap();
//! assert!(!woken);
//! assert!(monitor.is_entered(&key));
//! monitor.exit(&key).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_inception)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]

pub mod closure_lock;
pub mod monitor;
pub mod signal;
pub mod test_logging;

#[cfg(test)]
pub(crate) mod test_utils;

pub use closure_lock::ClosureLock;
pub use monitor::{
    BackoffConfigError, BackoffPolicy, Monitor, MonitorError, MonitorGuard, MonitorKey,
};
pub use signal::Signal;
