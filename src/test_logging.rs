//! Typed-event logging for concurrency tests.
//!
//! Concurrency failures are ordering failures, and orderings are hard to
//! reconstruct from interleaved stdout. [`TestLogger`] captures typed,
//! timestamped events for lock traffic — acquisitions, releases, waits,
//! pulses — so a failing test can print an exact timeline, and assertions
//! about *order* (not just final state) become one-liners.
//!
//! # Example
//!
//! ```
//! use pulselock::test_logging::{TestEvent, TestLogLevel, TestLogger};
//!
//! let logger = TestLogger::new(TestLogLevel::Debug);
//! logger.log(TestEvent::WaitStart { key: 1, thread: 0 });
//! logger.log(TestEvent::WaitEnd { key: 1, thread: 0, woken: true });
//!
//! assert_eq!(logger.wake_order(), vec![0]);
//! println!("{}", logger.report());
//! ```

use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::{Duration, Instant};

// ============================================================================
// TestLogLevel
// ============================================================================

/// Logging verbosity level for tests.
///
/// Levels are ordered from least to most verbose:
/// `Error < Warn < Info < Debug < Trace`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum TestLogLevel {
    /// Only errors and failures.
    Error,
    /// Warnings and above.
    Warn,
    /// General test progress.
    #[default]
    Info,
    /// Lock traffic.
    Debug,
    /// Everything, including per-attempt events.
    Trace,
}

impl TestLogLevel {
    /// Returns a human-readable name for the level.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    /// Returns the level from the `TEST_LOG_LEVEL` environment variable.
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var("TEST_LOG_LEVEL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for TestLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for TestLogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

// ============================================================================
// TestEvent
// ============================================================================

/// A typed event captured by the test logger.
///
/// `key` fields carry an opaque lock identity and `thread` fields carry a
/// test-assigned index (tests number their workers; OS thread ids are not
/// stable across runs and make reports unreadable).
#[derive(Debug, Clone)]
pub enum TestEvent {
    /// A lock was acquired.
    Acquire {
        /// Identity of the lock.
        key: usize,
        /// Test-assigned index of the acquiring thread.
        thread: usize,
    },

    /// A lock was released.
    Release {
        /// Identity of the lock.
        key: usize,
        /// Test-assigned index of the releasing thread.
        thread: usize,
    },

    /// A thread began waiting on a key.
    WaitStart {
        /// Identity of the lock.
        key: usize,
        /// Test-assigned index of the waiting thread.
        thread: usize,
    },

    /// A wait concluded.
    WaitEnd {
        /// Identity of the lock.
        key: usize,
        /// Test-assigned index of the waiting thread.
        thread: usize,
        /// Whether the wait was woken by a pulse rather than a timeout.
        woken: bool,
    },

    /// A single-waiter pulse was issued.
    Pulse {
        /// Identity of the lock.
        key: usize,
    },

    /// A broadcast pulse was issued.
    PulseAll {
        /// Identity of the lock.
        key: usize,
    },

    /// An acquire attempt failed (contention).
    AcquireBlocked {
        /// Identity of the lock.
        key: usize,
        /// Test-assigned index of the blocked thread.
        thread: usize,
    },

    /// Custom event for test-specific logging.
    Custom {
        /// Category for filtering.
        category: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// Error event.
    Error {
        /// Error category.
        category: &'static str,
        /// Error message.
        message: String,
    },

    /// Warning event.
    Warn {
        /// Warning category.
        category: &'static str,
        /// Warning message.
        message: String,
    },
}

impl TestEvent {
    /// Returns the minimum log level required to display this event.
    #[must_use]
    pub fn level(&self) -> TestLogLevel {
        match self {
            Self::Error { .. } => TestLogLevel::Error,
            Self::Warn { .. } => TestLogLevel::Warn,
            Self::Pulse { .. } | Self::PulseAll { .. } | Self::Custom { .. } => TestLogLevel::Info,
            Self::Acquire { .. }
            | Self::Release { .. }
            | Self::WaitStart { .. }
            | Self::WaitEnd { .. } => TestLogLevel::Debug,
            Self::AcquireBlocked { .. } => TestLogLevel::Trace,
        }
    }

    /// Returns a short category name for the event.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Acquire { .. } | Self::Release { .. } | Self::AcquireBlocked { .. } => "lock",
            Self::WaitStart { .. } | Self::WaitEnd { .. } => "wait",
            Self::Pulse { .. } | Self::PulseAll { .. } => "pulse",
            Self::Custom { category, .. }
            | Self::Error { category, .. }
            | Self::Warn { category, .. } => category,
        }
    }
}

impl std::fmt::Display for TestEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Acquire { key, thread } => write!(f, "acquire: key={key} thread={thread}"),
            Self::Release { key, thread } => write!(f, "release: key={key} thread={thread}"),
            Self::WaitStart { key, thread } => write!(f, "wait start: key={key} thread={thread}"),
            Self::WaitEnd { key, thread, woken } => {
                write!(f, "wait end: key={key} thread={thread} woken={woken}")
            }
            Self::Pulse { key } => write!(f, "pulse: key={key}"),
            Self::PulseAll { key } => write!(f, "pulse all: key={key}"),
            Self::AcquireBlocked { key, thread } => {
                write!(f, "acquire blocked: key={key} thread={thread}")
            }
            Self::Custom { category, message } => write!(f, "[{category}] {message}"),
            Self::Error { category, message } => write!(f, "ERROR [{category}] {message}"),
            Self::Warn { category, message } => write!(f, "WARN [{category}] {message}"),
        }
    }
}

// ============================================================================
// TestLogger
// ============================================================================

/// A timestamped event record.
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Time since logger creation.
    pub elapsed: Duration,
    /// The event that occurred.
    pub event: TestEvent,
}

/// Captures typed events with timestamps and renders timelines.
///
/// # Example
///
/// ```
/// use pulselock::test_logging::{TestEvent, TestLogLevel, TestLogger};
///
/// let logger = TestLogger::new(TestLogLevel::Debug);
/// logger.log(TestEvent::Acquire { key: 1, thread: 0 });
/// logger.log(TestEvent::Release { key: 1, thread: 0 });
///
/// logger.assert_no_errors();
/// println!("{}", logger.report());
/// ```
#[derive(Debug)]
pub struct TestLogger {
    /// Minimum level to capture.
    level: TestLogLevel,
    /// Captured events.
    events: Mutex<Vec<LogRecord>>,
    /// Start time for elapsed calculation.
    start_time: Instant,
    /// Whether to print events immediately.
    verbose: bool,
}

impl TestLogger {
    /// Creates a new logger with the specified level.
    #[must_use]
    pub fn new(level: TestLogLevel) -> Self {
        Self {
            level,
            events: Mutex::new(Vec::new()),
            start_time: Instant::now(),
            verbose: level >= TestLogLevel::Trace,
        }
    }

    /// Creates a logger using the `TEST_LOG_LEVEL` environment variable.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(TestLogLevel::from_env())
    }

    /// Sets whether to print events immediately.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Returns the configured log level.
    #[must_use]
    pub fn level(&self) -> TestLogLevel {
        self.level
    }

    /// Returns whether the logger captures events at the given level.
    #[must_use]
    pub fn should_log(&self, level: TestLogLevel) -> bool {
        level <= self.level
    }

    /// Logs an event if it meets the configured level.
    pub fn log(&self, event: TestEvent) {
        let event_level = event.level();
        if !self.should_log(event_level) {
            return;
        }

        let elapsed = self.start_time.elapsed();

        if self.verbose {
            eprintln!(
                "[{:>10.3}ms] [{:>5}] {}",
                elapsed.as_secs_f64() * 1000.0,
                event_level.name(),
                &event
            );
        }

        let record = LogRecord { elapsed, event };
        self.events.lock().expect("lock poisoned").push(record);
    }

    /// Logs a custom event.
    pub fn custom(&self, category: &'static str, message: impl Into<String>) {
        self.log(TestEvent::Custom {
            category,
            message: message.into(),
        });
    }

    /// Logs an error event.
    pub fn error(&self, category: &'static str, message: impl Into<String>) {
        self.log(TestEvent::Error {
            category,
            message: message.into(),
        });
    }

    /// Returns the number of captured events.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.lock().expect("lock poisoned").len()
    }

    /// Returns a snapshot of all captured events.
    #[must_use]
    pub fn events(&self) -> Vec<LogRecord> {
        self.events.lock().expect("lock poisoned").clone()
    }

    /// Returns the thread indices of pulse-woken waits, in completion
    /// order.
    ///
    /// This is the observable wake order: FIFO delivery means a single
    /// pulse after waits by threads 0, 1, 2 yields `[0]`, and pulsing the
    /// rest yields `[0, 1, 2]`.
    #[must_use]
    pub fn wake_order(&self) -> Vec<usize> {
        self.events
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter_map(|record| match record.event {
                TestEvent::WaitEnd {
                    thread,
                    woken: true,
                    ..
                } => Some(thread),
                _ => None,
            })
            .collect()
    }

    /// Generates a detailed report of all captured events.
    #[must_use]
    pub fn report(&self) -> String {
        let events = self.events.lock().expect("lock poisoned");
        let mut report = String::new();

        let _ = writeln!(report, "=== Test Event Log ({} events) ===", events.len());
        let _ = writeln!(report);

        for record in events.iter() {
            let _ = writeln!(
                report,
                "[{:>10.3}ms] [{:>5}] {:>6} | {}",
                record.elapsed.as_secs_f64() * 1000.0,
                record.event.level().name(),
                record.event.category(),
                record.event
            );
        }

        let _ = writeln!(report);
        let _ = writeln!(report, "=== Statistics ===");

        let acquires = events
            .iter()
            .filter(|r| matches!(r.event, TestEvent::Acquire { .. }))
            .count();
        let releases = events
            .iter()
            .filter(|r| matches!(r.event, TestEvent::Release { .. }))
            .count();
        let waits = events
            .iter()
            .filter(|r| matches!(r.event, TestEvent::WaitStart { .. }))
            .count();
        let pulses = events
            .iter()
            .filter(|r| {
                matches!(
                    r.event,
                    TestEvent::Pulse { .. } | TestEvent::PulseAll { .. }
                )
            })
            .count();
        let errors = events
            .iter()
            .filter(|r| matches!(r.event, TestEvent::Error { .. }))
            .count();

        let _ = writeln!(report, "Acquires: {acquires}");
        let _ = writeln!(report, "Releases: {releases}");
        let _ = writeln!(report, "Waits: {waits}");
        let _ = writeln!(report, "Pulses: {pulses}");
        let _ = writeln!(report, "Errors: {errors}");

        if let Some(last) = events.last() {
            let _ = writeln!(report, "Total duration: {:?}", last.elapsed);
        }

        report
    }

    /// Asserts that no errors were logged.
    ///
    /// # Panics
    ///
    /// Panics if any error events were logged.
    pub fn assert_no_errors(&self) {
        let error_messages: Vec<String> = {
            let events = self.events.lock().expect("lock poisoned");
            events
                .iter()
                .filter(|r| matches!(r.event, TestEvent::Error { .. }))
                .map(|r| format!("  - {}", r.event))
                .collect()
        };

        assert!(
            error_messages.is_empty(),
            "Test logged {} errors:\n{}\n\nFull log:\n{}",
            error_messages.len(),
            error_messages.join("\n"),
            self.report()
        );
    }

    /// Asserts that every lock acquisition was balanced by a release.
    ///
    /// # Panics
    ///
    /// Panics if acquire and release counts differ for any key.
    pub fn assert_balanced_locking(&self) {
        let mut balance: std::collections::HashMap<usize, i64> = std::collections::HashMap::new();
        {
            let events = self.events.lock().expect("lock poisoned");
            for record in events.iter() {
                match record.event {
                    TestEvent::Acquire { key, .. } => *balance.entry(key).or_default() += 1,
                    TestEvent::Release { key, .. } => *balance.entry(key).or_default() -= 1,
                    _ => {}
                }
            }
        }

        let unbalanced: Vec<(usize, i64)> = balance
            .into_iter()
            .filter(|(_, count)| *count != 0)
            .collect();
        assert!(
            unbalanced.is_empty(),
            "Unbalanced locking for keys {:?}\n\nFull log:\n{}",
            unbalanced,
            self.report()
        );
    }

    /// Clears all captured events.
    pub fn clear(&self) {
        self.events.lock().expect("lock poisoned").clear();
    }
}

impl Default for TestLogger {
    fn default() -> Self {
        Self::new(TestLogLevel::Info)
    }
}

// ============================================================================
// Macros
// ============================================================================

/// Log a custom event to a test logger.
///
/// # Example
///
/// ```ignore
/// test_log!(logger, "setup", "spawning {} workers", workers);
/// ```
#[macro_export]
macro_rules! test_log {
    ($logger:expr, $cat:literal, $($arg:tt)*) => {
        $logger.log($crate::test_logging::TestEvent::Custom {
            category: $cat,
            message: format!($($arg)*),
        });
    };
}

/// Log an error event to a test logger.
///
/// # Example
///
/// ```ignore
/// test_error!(logger, "wait", "unexpected timeout after {:?}", elapsed);
/// ```
#[macro_export]
macro_rules! test_error {
    ($logger:expr, $cat:literal, $($arg:tt)*) => {
        $logger.log($crate::test_logging::TestEvent::Error {
            category: $cat,
            message: format!($($arg)*),
        });
    };
}

/// Assert a condition, printing the full log on failure.
///
/// # Example
///
/// ```ignore
/// assert_log!(logger, order == [0, 1, 2], "wake order was {:?}", order);
/// ```
#[macro_export]
macro_rules! assert_log {
    ($logger:expr, $cond:expr) => {
        if !$cond {
            eprintln!("{}", $logger.report());
            panic!("assertion failed: {}", stringify!($cond));
        }
    };
    ($logger:expr, $cond:expr, $($arg:tt)*) => {
        if !$cond {
            eprintln!("{}", $logger.report());
            panic!($($arg)*);
        }
    };
}

// ============================================================================
// Tests
// ============================================================================
