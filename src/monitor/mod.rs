//! Identity-keyed locking with wait/pulse condition signalling.
//!
//! A [`Monitor`] associates each [`MonitorKey`] with a reentrant lock cell
//! and a FIFO queue of waiters, rebuilding the classic monitor shape —
//! enter/exit mutual exclusion plus wait/pulse/pulse-all signalling — from
//! a mutex/condvar pair and the one-shot [`Signal`](crate::signal::Signal)
//! primitive.
//!
//! # Structure
//!
//! - `key`: lock identity handles
//! - `lock_table`: per-identity reentrant lock cells (private)
//! - `waiters`: per-identity FIFO waiter queues (private)
//! - `backoff`: polling policy for the timed acquire
//! - `monitor`: the public [`Monitor`] surface
//!
//! # Locking discipline
//!
//! The lock-cell table and the waiter table are each guarded by their own
//! private mutex, never by any user key's lock. Waiters register in the
//! queue *before* releasing the user lock, so a pulse issued the instant
//! the lock is vacated cannot be lost.

mod backoff;
mod key;
mod lock_table;
mod monitor;
mod waiters;

pub use backoff::{BackoffConfigError, BackoffPolicy, BackoffState};
pub use key::MonitorKey;
pub use monitor::{Monitor, MonitorError, MonitorGuard};
