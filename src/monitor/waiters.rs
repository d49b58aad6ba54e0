//! Identity-keyed FIFO waiter queues.
//!
//! One queue per lock identity actually waited upon, created lazily on
//! first registration and removed when it empties. The table's mutex is
//! private: queue bookkeeping never runs under any user lock, so it cannot
//! participate in a caller's lock ordering.
//!
//! A pulse marks the oldest not-yet-pulsed entry and sets its signal while
//! the table lock is held; marked entries are never selected again, so a
//! waiter cannot be signalled twice. The waiter removes its own entry on
//! every exit path ([`WaiterTable::settle`]); if it timed out after a pulse
//! had already chosen it, it hands the pulse to the next unmarked waiter so
//! the wakeup is not lost.

use parking_lot::Mutex;
use smallvec::SmallVec;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::signal::Signal;

#[derive(Debug)]
struct WaitEntry {
    signal: Arc<Signal>,
    /// Whether a pulse has already chosen this waiter.
    pulsed: bool,
}

/// Table of per-identity waiter queues.
#[derive(Debug, Default)]
pub(crate) struct WaiterTable {
    queues: Mutex<HashMap<usize, VecDeque<WaitEntry>>>,
}

impl WaiterTable {
    pub(crate) fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Appends a waiter's signal to the tail of `key`'s queue.
    pub(crate) fn register(&self, key: usize, signal: Arc<Signal>) {
        let mut queues = self.queues.lock();
        let queue = queues.entry(key).or_default();
        queue.push_back(WaitEntry {
            signal,
            pulsed: false,
        });
        tracing::trace!(key, waiters = queue.len(), "wait registered");
    }

    /// Wakes the oldest waiter not yet chosen by a pulse.
    ///
    /// Returns whether a waiter was signalled. A pulse with no eligible
    /// waiter is a no-op: pulses are not buffered.
    pub(crate) fn pulse(&self, key: usize) -> bool {
        let mut queues = self.queues.lock();
        let Some(queue) = queues.get_mut(&key) else {
            return false;
        };
        let Some(entry) = queue.iter_mut().find(|entry| !entry.pulsed) else {
            return false;
        };
        entry.pulsed = true;
        // Set under the table lock: once an entry is marked, its signal is
        // observably set by the time anyone else can see the mark.
        entry.signal.set();
        tracing::trace!(key, "pulse delivered");
        true
    }

    /// Wakes every waiter registered at the instant of the call.
    ///
    /// The queue is drained under the table lock (the point-in-time
    /// snapshot) and the signals are set after it is released, so waiters
    /// that register afterwards are unaffected.
    pub(crate) fn pulse_all(&self, key: usize) -> usize {
        let drained: SmallVec<[Arc<Signal>; 8]> = {
            let mut queues = self.queues.lock();
            let Some(queue) = queues.remove(&key) else {
                return 0;
            };
            queue.into_iter().map(|entry| entry.signal).collect()
        };
        for signal in &drained {
            signal.set();
        }
        tracing::trace!(key, woken = drained.len(), "pulse_all delivered");
        drained.len()
    }

    /// Removes a waiter's entry after its wait concluded, and resolves the
    /// final outcome.
    ///
    /// `signalled` is what the waiter observed on its own signal. Returns
    /// whether the wait counts as woken-by-pulse:
    ///
    /// - entry still queued, unmarked: plain timeout
    /// - entry still queued, marked: a pulse chose this waiter; if the
    ///   waiter observed it, it is woken — if it timed out first, the pulse
    ///   is handed to the next unmarked waiter and this wait reports
    ///   timeout
    /// - entry gone: a `pulse_all` drained it; any set that landed after
    ///   the timeout is still consumed and counted as a wake
    pub(crate) fn settle(&self, key: usize, signal: &Arc<Signal>, signalled: bool) -> bool {
        let mut queues = self.queues.lock();
        let Some(queue) = queues.get_mut(&key) else {
            return signalled || signal.try_consume();
        };

        let position = queue
            .iter()
            .position(|entry| Arc::ptr_eq(&entry.signal, signal));
        let woken = match position.and_then(|pos| queue.remove(pos)) {
            Some(entry) if signalled => {
                debug_assert!(entry.pulsed);
                true
            }
            Some(entry) if entry.pulsed => {
                // Timed out after a pulse chose us: take the stored set and
                // pass the pulse along rather than swallowing it.
                signal.try_consume();
                if let Some(next) = queue.iter_mut().find(|entry| !entry.pulsed) {
                    next.pulsed = true;
                    next.signal.set();
                    tracing::trace!(key, "pulse passed to next waiter");
                }
                false
            }
            Some(_) => false,
            None => signalled || signal.try_consume(),
        };

        if queue.is_empty() {
            queues.remove(&key);
        }
        woken
    }

    /// Number of registered waiters for `key`, including those already
    /// chosen by a pulse but not yet settled.
    pub(crate) fn waiter_count(&self, key: usize) -> usize {
        self.queues.lock().get(&key).map_or(0, VecDeque::len)
    }
}
