//! Per-identity lock cells.
//!
//! A [`LockCell`] is the mutual-exclusion half of the monitor: a reentrant
//! lock owned by at most one thread, identified by `ThreadId` comparison.
//! Cells live in a [`LockTable`] keyed by lock identity; they are created
//! lazily on first use and retained for the life of the table.
//!
//! The cell exposes the raw `enter`/`exit` shape (no guard required)
//! because `wait` must be able to release and reacquire across a suspension
//! that is not lexically scoped.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use super::key::MonitorKey;
use super::MonitorError;

#[derive(Debug)]
struct CellState {
    /// The thread currently holding the cell, if any. Identity only —
    /// never a handle to the thread itself.
    owner: Option<ThreadId>,
    /// Reentrant holds by the owner. Zero iff `owner` is `None`.
    hold_count: u32,
}

/// Reentrant mutual exclusion for one lock identity.
#[derive(Debug)]
pub(crate) struct LockCell {
    state: Mutex<CellState>,
    /// Wakes one blocked enterer when the cell is vacated.
    available: Condvar,
    /// Keeps the key's allocation (and thus its address) alive for as long
    /// as this cell exists, so identities are never reused under us.
    _key: MonitorKey,
}

impl LockCell {
    fn new(key: MonitorKey) -> Self {
        Self {
            state: Mutex::new(CellState {
                owner: None,
                hold_count: 0,
            }),
            available: Condvar::new(),
            _key: key,
        }
    }

    /// Blocks until the calling thread holds the cell.
    ///
    /// Reentrant: a thread that already holds the cell increments its hold
    /// count and returns immediately.
    pub(crate) fn enter(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner == Some(me) {
            state.hold_count += 1;
            return;
        }
        while state.owner.is_some() {
            self.available.wait(&mut state);
        }
        state.owner = Some(me);
        state.hold_count = 1;
    }

    /// Non-blocking acquire. Returns whether the calling thread now holds
    /// the cell (including reentrantly).
    pub(crate) fn try_enter(&self) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner == Some(me) {
            state.hold_count += 1;
            return true;
        }
        if state.owner.is_none() {
            state.owner = Some(me);
            state.hold_count = 1;
            return true;
        }
        false
    }

    /// Releases one hold. The cell is vacated (and one blocked enterer
    /// woken) when the last hold is released.
    pub(crate) fn exit(&self) -> Result<(), MonitorError> {
        let me = thread::current().id();
        let vacated = {
            let mut state = self.state.lock();
            if state.owner != Some(me) {
                return Err(MonitorError::NotOwner);
            }
            state.hold_count -= 1;
            if state.hold_count == 0 {
                state.owner = None;
                true
            } else {
                false
            }
        };
        // Wake outside the lock.
        if vacated {
            self.available.notify_one();
        }
        Ok(())
    }

    /// Whether the calling thread currently holds the cell.
    pub(crate) fn is_held_by_current(&self) -> bool {
        let me = thread::current().id();
        self.state.lock().owner == Some(me)
    }

    /// Releases the cell entirely, returning the hold count to restore on
    /// reacquisition. Used by `wait`, which must vacate the lock no matter
    /// how deeply the caller has re-entered it.
    pub(crate) fn release_all(&self) -> Result<u32, MonitorError> {
        let me = thread::current().id();
        let saved = {
            let mut state = self.state.lock();
            if state.owner != Some(me) {
                return Err(MonitorError::NotOwner);
            }
            let saved = state.hold_count;
            state.owner = None;
            state.hold_count = 0;
            saved
        };
        self.available.notify_one();
        Ok(saved)
    }

    /// Blocks until the cell is reacquired, restoring a saved hold count.
    pub(crate) fn reacquire(&self, hold_count: u32) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        while state.owner.is_some() {
            self.available.wait(&mut state);
        }
        state.owner = Some(me);
        state.hold_count = hold_count.max(1);
    }
}

/// Identity-keyed table of lock cells.
///
/// Guarded by its own mutex, never by any user lock, so cell lookup cannot
/// participate in a caller's lock ordering.
#[derive(Debug, Default)]
pub(crate) struct LockTable {
    cells: Mutex<HashMap<usize, Arc<LockCell>>>,
}

impl LockTable {
    pub(crate) fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cell for `key`, creating it on first use.
    pub(crate) fn cell(&self, key: &MonitorKey) -> Arc<LockCell> {
        let mut cells = self.cells.lock();
        Arc::clone(
            cells
                .entry(key.id())
                .or_insert_with(|| Arc::new(LockCell::new(key.clone()))),
        )
    }

    /// Returns the cell for `key` if one has ever been created.
    pub(crate) fn existing(&self, key: &MonitorKey) -> Option<Arc<LockCell>> {
        self.cells.lock().get(&key.id()).map(Arc::clone)
    }
}
