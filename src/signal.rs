//! One-shot auto-resetting signal.
//!
//! [`Signal`] is the leaf primitive the rest of the crate is built on: a
//! wake flag that, once set, releases exactly one blocked waiter (or
//! satisfies one later wait) and then automatically clears itself.
//!
//! Unlike a bare condvar, a set with no waiter present is not lost — it is
//! stored and consumed by the next wait. Unlike a semaphore, the stored
//! state never exceeds one: setting an already-set signal is a no-op.
//!
//! # Example
//!
//! ```
//! use pulselock::Signal;
//! use std::time::Duration;
//!
//! let signal = Signal::new();
//!
//! // Set before anyone waits: stored, satisfies the next wait.
//! signal.set();
//! assert!(signal.wait_for(Duration::from_millis(1)));
//!
//! // The flag auto-cleared; a second wait times out.
//! assert!(!signal.wait_for(Duration::from_millis(1)));
//! ```

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A one-shot, auto-resetting wake primitive.
///
/// `set` transitions the signal to the signalled state and wakes at most one
/// thread blocked in [`wait`](Self::wait)/[`wait_for`](Self::wait_for). The
/// waiter that observes the signalled state consumes it, returning the
/// signal to the unsignalled state. If no waiter is blocked, the signalled
/// state persists until the next wait (or [`try_consume`](Self::try_consume))
/// collects it.
#[derive(Debug, Default)]
pub struct Signal {
    /// Whether the signal is currently in the signalled state.
    set: Mutex<bool>,
    /// Wakes one waiter per `set`.
    cond: Condvar,
}

impl Signal {
    /// Creates a new signal in the unsignalled state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            set: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Sets the signal, waking at most one blocked waiter.
    ///
    /// If no waiter is blocked, the signalled state is stored and satisfies
    /// the next wait. Setting an already-set signal is a no-op.
    pub fn set(&self) {
        {
            let mut set = self.set.lock();
            *set = true;
        }
        // Wake outside the lock so the waiter can consume immediately.
        self.cond.notify_one();
    }

    /// Clears the signalled state without waking anyone.
    pub fn reset(&self) {
        *self.set.lock() = false;
    }

    /// Consumes the signalled state if present, without blocking.
    ///
    /// Returns whether the signal was set.
    pub fn try_consume(&self) -> bool {
        let mut set = self.set.lock();
        let was_set = *set;
        *set = false;
        was_set
    }

    /// Returns whether the signal is currently set.
    ///
    /// Diagnostic only: the answer can be stale by the time it is read.
    #[must_use]
    pub fn is_set(&self) -> bool {
        *self.set.lock()
    }

    /// Blocks until the signal is set, then consumes it.
    pub fn wait(&self) {
        let mut set = self.set.lock();
        while !*set {
            self.cond.wait(&mut set);
        }
        *set = false;
    }

    /// Blocks until the signal is set or `timeout` elapses.
    ///
    /// Returns `true` iff the signal was consumed rather than the timeout
    /// reached. A set that lands exactly as the deadline expires is still
    /// consumed and reported as a wake.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            // Unrepresentable deadline: treat as unbounded.
            self.wait();
            return true;
        };

        let mut set = self.set.lock();
        while !*set {
            if self.cond.wait_until(&mut set, deadline).timed_out() {
                // Re-check under the lock: the set may have raced the
                // deadline. If it did, consume it rather than dropping it.
                if *set {
                    break;
                }
                return false;
            }
        }
        *set = false;
        true
    }
}
