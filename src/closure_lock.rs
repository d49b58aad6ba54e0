//! Closure-scoped handoff lock.
//!
//! [`ClosureLock`] is a self-contained mutual-exclusion primitive that does
//! not touch the monitor's lock registry at all: ownership is a stored
//! thread identity compared against the caller, and blocking is a pair of
//! one-shot [`Signal`](crate::signal::Signal)s — one to hand the critical
//! section to the next contender, one to deliver pulses to a suspended
//! owner.
//!
//! Acquisition is deliberately not FIFO-fair: a release wakes one blocked
//! contender, but the wake is only an invitation to retry the ownership
//! compare-and-set, and a barging thread that never blocked can win the
//! race. Callers who need ordered handoff should use
//! [`Monitor`](crate::Monitor) instead.

use parking_lot::Mutex;
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::signal::Signal;

/// Runs closures under exclusive ownership tracked by thread identity.
///
/// [`run`](Self::run) executes a closure while the calling thread owns the
/// lock, releasing ownership afterwards even if the closure panics (the
/// panic is rethrown once the release has happened). While inside `run`,
/// the owning thread can suspend itself with [`wait`](Self::wait) /
/// [`wait_for`](Self::wait_for) until another thread calls
/// [`pulse`](Self::pulse).
///
/// Entry is reentrant by identity: a nested `run` on the owning thread
/// enters immediately. Ownership is a two-state machine with no hold
/// count, so the innermost exit releases the lock — nest only when the
/// outer level is done with its critical work.
///
/// # Example
///
/// ```
/// use pulselock::ClosureLock;
/// use std::sync::Arc;
/// use std::thread;
///
/// let lock = Arc::new(ClosureLock::new());
/// let total: i32 = {
///     let lock = Arc::clone(&lock);
///     thread::spawn(move || lock.run(|| 2 + 2)).join().unwrap()
/// };
/// assert_eq!(total, 4);
/// assert_eq!(lock.run(|| total * 10), 40);
/// ```
#[derive(Debug, Default)]
pub struct ClosureLock {
    /// The thread currently owning the critical section, if any.
    /// Identity only; never a handle to the thread itself.
    owner: Mutex<Option<ThreadId>>,
    /// Consumer → contenders: "critical section vacated, retry".
    closure_signal: Signal,
    /// Producer → suspended owner: "pulse delivered".
    wait_signal: Signal,
}

impl ClosureLock {
    /// Creates an unowned lock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            owner: Mutex::new(None),
            closure_signal: Signal::new(),
            wait_signal: Signal::new(),
        }
    }

    /// Runs `work` while owning the lock.
    ///
    /// Blocks until ownership is acquired. Ownership is released whether
    /// `work` returns or panics; a panic propagates to the caller after the
    /// release.
    pub fn run<T>(&self, work: impl FnOnce() -> T) -> T {
        self.enter_closure();
        let _release = ReleaseOnDrop { lock: self };
        work()
    }

    /// Releases ownership, blocks until pulsed, then reacquires ownership
    /// before returning.
    pub fn wait(&self) {
        self.release();
        self.wait_signal.wait();
        self.enter_closure();
    }

    /// As [`wait`](Self::wait), giving up on the pulse after `timeout`.
    ///
    /// Returns whether the wake was a pulse rather than the timeout.
    /// Ownership is reacquired before returning in either case.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.release();
        let pulsed = self.wait_signal.wait_for(timeout);
        self.enter_closure();
        pulsed
    }

    /// Wakes one thread suspended in [`wait`](Self::wait), or satisfies the
    /// next such wait if none is suspended yet.
    pub fn pulse(&self) {
        self.wait_signal.set();
    }

    /// Whether the calling thread currently owns the lock.
    ///
    /// Diagnostic only: for any thread but the caller's the answer can be
    /// stale by the time it is read.
    #[must_use]
    pub fn is_owned_by_current(&self) -> bool {
        *self.owner.lock() == Some(thread::current().id())
    }

    /// Blocks until the calling thread owns the lock.
    ///
    /// A wake from `closure_signal` is only an invitation to retry; the
    /// compare-and-set decides who actually enters.
    fn enter_closure(&self) {
        let me = thread::current().id();
        loop {
            {
                let mut owner = self.owner.lock();
                match *owner {
                    Some(current) if current == me => return,
                    None => {
                        *owner = Some(me);
                        return;
                    }
                    Some(_) => {}
                }
            }
            tracing::trace!("closure lock contended, parking");
            self.closure_signal.wait();
        }
    }

    /// Clears ownership if the caller holds it, then wakes one contender.
    fn release(&self) {
        let me = thread::current().id();
        {
            let mut owner = self.owner.lock();
            if *owner == Some(me) {
                *owner = None;
            }
        }
        self.closure_signal.set();
    }
}

/// Releases the lock when dropped, so `run` unwinds cleanly on panic.
struct ReleaseOnDrop<'a> {
    lock: &'a ClosureLock,
}

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
