//! The monitor: identity-keyed locking with wait/pulse signalling.

use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use super::backoff::{BackoffConfigError, BackoffPolicy, BackoffState};
use super::key::MonitorKey;
use super::lock_table::LockTable;
use super::waiters::WaiterTable;
use crate::signal::Signal;

/// Error returned when a monitor operation is invoked from an invalid
/// state.
///
/// Validation fails fast at the call boundary, before any monitor state is
/// mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorError {
    /// The calling thread does not hold the key's lock.
    NotOwner,
    /// An output "lock taken" flag was already `true` on entry.
    FlagAlreadySet,
}

impl std::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOwner => write!(f, "calling thread does not own the lock"),
            Self::FlagAlreadySet => write!(f, "lock-taken flag already set on entry"),
        }
    }
}

impl std::error::Error for MonitorError {}

/// Mutual exclusion plus wait/pulse condition signalling, keyed by
/// [`MonitorKey`] identity.
///
/// Each monitor instance owns an isolated registry of lock cells and waiter
/// queues, so tests can build private monitors; [`Monitor::global`] returns
/// the process-wide instance application code normally shares.
///
/// # Example
///
/// ```
/// use pulselock::{Monitor, MonitorKey};
/// use std::sync::Arc;
/// use std::thread;
///
/// let monitor = Arc::new(Monitor::new());
/// let key = MonitorKey::new();
///
/// monitor.enter(&key);
/// let waker = {
///     let monitor = Arc::clone(&monitor);
///     let key = key.clone();
///     thread::spawn(move || {
///         // Runs while the main thread is suspended in wait().
///         monitor.enter(&key);
///         monitor.pulse(&key);
///         monitor.exit(&key).unwrap();
///     })
/// };
///
/// let woken = monitor.wait(&key).unwrap();
/// assert!(woken);
/// assert!(monitor.is_entered(&key));
/// monitor.exit(&key).unwrap();
/// waker.join().unwrap();
/// ```
#[derive(Debug)]
pub struct Monitor {
    locks: LockTable,
    waiters: WaiterTable,
    backoff: BackoffPolicy,
}

impl Monitor {
    /// Creates a monitor with an empty registry and the default backoff
    /// policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: LockTable::new(),
            waiters: WaiterTable::new(),
            backoff: BackoffPolicy::default(),
        }
    }

    /// Creates a monitor with a custom timed-acquire backoff policy.
    pub fn with_backoff(backoff: BackoffPolicy) -> Result<Self, BackoffConfigError> {
        backoff.validate()?;
        Ok(Self {
            locks: LockTable::new(),
            waiters: WaiterTable::new(),
            backoff,
        })
    }

    /// Returns the process-wide monitor.
    ///
    /// Initialized on first use, never torn down.
    pub fn global() -> &'static Monitor {
        static GLOBAL: OnceLock<Monitor> = OnceLock::new();
        GLOBAL.get_or_init(Monitor::new)
    }

    /// Blocks until the calling thread holds `key`'s lock.
    ///
    /// Reentrant: a thread that already holds the lock enters again and
    /// must balance every `enter` with an [`exit`](Self::exit).
    pub fn enter(&self, key: &MonitorKey) {
        self.locks.cell(key).enter();
    }

    /// As [`enter`](Self::enter), recording the acquisition in `lock_taken`.
    ///
    /// Fails fast with [`MonitorError::FlagAlreadySet`] if the flag is
    /// already `true`, without touching the lock.
    pub fn enter_tracked(&self, key: &MonitorKey, lock_taken: &mut bool) -> Result<(), MonitorError> {
        if *lock_taken {
            return Err(MonitorError::FlagAlreadySet);
        }
        self.enter(key);
        *lock_taken = true;
        Ok(())
    }

    /// Releases one hold on `key`'s lock.
    ///
    /// Fails with [`MonitorError::NotOwner`] if the calling thread does not
    /// hold it.
    pub fn exit(&self, key: &MonitorKey) -> Result<(), MonitorError> {
        let cell = self.locks.existing(key).ok_or(MonitorError::NotOwner)?;
        cell.exit()
    }

    /// Non-blocking acquire. Returns whether the lock was taken.
    pub fn try_enter(&self, key: &MonitorKey) -> bool {
        self.locks.cell(key).try_enter()
    }

    /// As [`try_enter`](Self::try_enter), recording the outcome in
    /// `lock_taken`.
    pub fn try_enter_tracked(
        &self,
        key: &MonitorKey,
        lock_taken: &mut bool,
    ) -> Result<(), MonitorError> {
        if *lock_taken {
            return Err(MonitorError::FlagAlreadySet);
        }
        *lock_taken = self.try_enter(key);
        Ok(())
    }

    /// Attempts to acquire `key`'s lock for up to `timeout`.
    ///
    /// Polls the non-blocking acquire, sleeping between attempts on the
    /// monitor's backoff schedule. Returns whether the lock was taken
    /// before the timeout elapsed. A zero timeout degenerates to a single
    /// [`try_enter`](Self::try_enter).
    pub fn try_enter_for(&self, key: &MonitorKey, timeout: Duration) -> bool {
        let cell = self.locks.cell(key);
        if cell.try_enter() {
            return true;
        }

        let start = Instant::now();
        let mut backoff = BackoffState::new(self.backoff);
        loop {
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return false;
            }
            let delay = backoff.delay_for(elapsed).min(timeout - elapsed);
            thread::sleep(delay);
            if cell.try_enter() {
                return true;
            }
        }
    }

    /// As [`try_enter_for`](Self::try_enter_for), recording the outcome in
    /// `lock_taken`.
    pub fn try_enter_for_tracked(
        &self,
        key: &MonitorKey,
        timeout: Duration,
        lock_taken: &mut bool,
    ) -> Result<(), MonitorError> {
        if *lock_taken {
            return Err(MonitorError::FlagAlreadySet);
        }
        *lock_taken = self.try_enter_for(key, timeout);
        Ok(())
    }

    /// Whether the calling thread currently holds `key`'s lock.
    #[must_use]
    pub fn is_entered(&self, key: &MonitorKey) -> bool {
        self.locks
            .existing(key)
            .is_some_and(|cell| cell.is_held_by_current())
    }

    /// Releases `key`'s lock, blocks until pulsed, then reacquires the lock
    /// before returning.
    ///
    /// Must be called while holding the lock; fails with
    /// [`MonitorError::NotOwner`] otherwise, before any state changes. On
    /// success the lock is re-held at its previous depth and the result is
    /// `Ok(true)` (an untimed wait only returns once pulsed).
    pub fn wait(&self, key: &MonitorKey) -> Result<bool, MonitorError> {
        self.wait_inner(key, None)
    }

    /// As [`wait`](Self::wait), giving up after `timeout`.
    ///
    /// Returns `Ok(true)` iff woken by a pulse rather than the timeout.
    /// The lock is reacquired before returning in either case.
    pub fn wait_for(&self, key: &MonitorKey, timeout: Duration) -> Result<bool, MonitorError> {
        self.wait_inner(key, Some(timeout))
    }

    fn wait_inner(
        &self,
        key: &MonitorKey,
        timeout: Option<Duration>,
    ) -> Result<bool, MonitorError> {
        let cell = self.locks.existing(key).ok_or(MonitorError::NotOwner)?;
        if !cell.is_held_by_current() {
            return Err(MonitorError::NotOwner);
        }

        // Register before releasing: a pulse issued the instant the lock is
        // vacated must find this waiter in the queue.
        let signal = Arc::new(Signal::new());
        self.waiters.register(key.id(), Arc::clone(&signal));

        let saved = match cell.release_all() {
            Ok(saved) => saved,
            Err(err) => {
                self.waiters.settle(key.id(), &signal, false);
                return Err(err);
            }
        };
        tracing::trace!(key = key.id(), holds = saved, "wait released lock");

        let signalled = match timeout {
            None => {
                signal.wait();
                true
            }
            Some(timeout) => signal.wait_for(timeout),
        };

        let woken = self.waiters.settle(key.id(), &signal, signalled);
        cell.reacquire(saved);
        tracing::trace!(key = key.id(), woken, "wait reacquired lock");
        Ok(woken)
    }

    /// Wakes the oldest thread waiting on `key`.
    ///
    /// A no-op if nobody is waiting: pulses are not buffered.
    pub fn pulse(&self, key: &MonitorKey) {
        self.waiters.pulse(key.id());
    }

    /// Wakes every thread waiting on `key` at the instant of the call.
    ///
    /// Threads that begin waiting after the snapshot is taken are not
    /// affected.
    pub fn pulse_all(&self, key: &MonitorKey) {
        self.waiters.pulse_all(key.id());
    }

    /// Number of threads currently waiting on `key`.
    ///
    /// Diagnostic only: the answer can be stale by the time it is read.
    #[must_use]
    pub fn waiter_count(&self, key: &MonitorKey) -> usize {
        self.waiters.waiter_count(key.id())
    }

    /// Acquires `key`'s lock and returns a guard that releases it on drop.
    pub fn lock<'a>(&'a self, key: &'a MonitorKey) -> MonitorGuard<'a> {
        self.enter(key);
        MonitorGuard { monitor: self, key }
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII hold on a monitor lock.
///
/// Created by [`Monitor::lock`]; releases one hold when dropped. Waiting
/// and pulsing through the guard operate on the guarded key.
#[must_use = "guard releases the lock immediately if not held"]
#[derive(Debug)]
pub struct MonitorGuard<'a> {
    monitor: &'a Monitor,
    key: &'a MonitorKey,
}

impl MonitorGuard<'_> {
    /// The key this guard holds.
    #[must_use]
    pub fn key(&self) -> &MonitorKey {
        self.key
    }

    /// See [`Monitor::wait`].
    pub fn wait(&self) -> Result<bool, MonitorError> {
        self.monitor.wait(self.key)
    }

    /// See [`Monitor::wait_for`].
    pub fn wait_for(&self, timeout: Duration) -> Result<bool, MonitorError> {
        self.monitor.wait_for(self.key, timeout)
    }

    /// See [`Monitor::pulse`].
    pub fn pulse(&self) {
        self.monitor.pulse(self.key);
    }

    /// See [`Monitor::pulse_all`].
    pub fn pulse_all(&self) {
        self.monitor.pulse_all(self.key);
    }
}

impl Drop for MonitorGuard<'_> {
    fn drop(&mut self) {
        // The guard was created by a successful enter and wait always
        // reacquires, so this release cannot fail.
        let _ = self.monitor.exit(self.key);
    }
}
