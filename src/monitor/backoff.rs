//! Backoff policy for the timed-acquire polling loop.
//!
//! [`Monitor::try_enter_for`](super::Monitor::try_enter_for) does not rely
//! on a platform timed mutex; it polls the non-blocking acquire and sleeps
//! between attempts. The sleep starts small and grows geometrically as the
//! total elapsed wait crosses successive growth thresholds, bounding the
//! number of wakeups on long waits while keeping short waits responsive.
//!
//! The schedule is pure arithmetic over elapsed time, so it can be tested
//! without sleeping: feed [`BackoffState::delay_for`] synthetic elapsed
//! values and inspect the delays it hands back.

use std::fmt;
use std::time::Duration;

/// Tuning for the timed-acquire polling loop.
///
/// The delay starts at `initial_delay` and multiplies by `growth_factor`
/// each time another `growth_threshold` of total elapsed wait has passed,
/// clamped to `max_delay`.
///
/// # Example
///
/// ```
/// use pulselock::BackoffPolicy;
/// use std::time::Duration;
///
/// let policy = BackoffPolicy::default();
/// assert_eq!(policy.initial_delay, Duration::from_millis(1));
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Sleep between the first acquire attempts.
    pub initial_delay: Duration,
    /// Elapsed wait after which the delay grows again.
    pub growth_threshold: Duration,
    /// Multiplier applied to the delay at each growth step.
    pub growth_factor: u32,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    /// 1ms initial delay, doubling every 250ms of elapsed wait, capped at
    /// 256ms.
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1),
            growth_threshold: Duration::from_millis(250),
            growth_factor: 2,
            max_delay: Duration::from_millis(256),
        }
    }
}

impl BackoffPolicy {
    /// Validates the policy for basic sanity.
    pub fn validate(&self) -> Result<(), BackoffConfigError> {
        if self.initial_delay.is_zero() {
            return Err(BackoffConfigError::ZeroInitialDelay);
        }
        if self.growth_threshold.is_zero() {
            return Err(BackoffConfigError::ZeroGrowthThreshold);
        }
        if self.growth_factor == 0 {
            return Err(BackoffConfigError::ZeroGrowthFactor);
        }
        if self.max_delay < self.initial_delay {
            return Err(BackoffConfigError::CapBelowInitialDelay);
        }
        Ok(())
    }
}

/// Error returned when a [`BackoffPolicy`] fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffConfigError {
    /// `initial_delay` must be non-zero.
    ZeroInitialDelay,
    /// `growth_threshold` must be non-zero.
    ZeroGrowthThreshold,
    /// `growth_factor` must be at least 1.
    ZeroGrowthFactor,
    /// `max_delay` must be at least `initial_delay`.
    CapBelowInitialDelay,
}

impl fmt::Display for BackoffConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroInitialDelay => write!(f, "backoff initial delay must be non-zero"),
            Self::ZeroGrowthThreshold => write!(f, "backoff growth threshold must be non-zero"),
            Self::ZeroGrowthFactor => write!(f, "backoff growth factor must be at least 1"),
            Self::CapBelowInitialDelay => {
                write!(f, "backoff cap must be at least the initial delay")
            }
        }
    }
}

impl std::error::Error for BackoffConfigError {}

/// Running state of one polling loop.
#[derive(Debug, Clone)]
pub struct BackoffState {
    policy: BackoffPolicy,
    delay: Duration,
    next_growth: Duration,
}

impl BackoffState {
    /// Starts a schedule at the policy's initial delay.
    #[must_use]
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            delay: policy.initial_delay,
            next_growth: policy.growth_threshold,
            policy,
        }
    }

    /// Returns the delay to sleep given the total elapsed wait so far.
    ///
    /// Grows the delay once per crossed growth threshold; a long sleep that
    /// skips several thresholds grows the delay several times.
    pub fn delay_for(&mut self, elapsed: Duration) -> Duration {
        while elapsed >= self.next_growth {
            self.next_growth += self.policy.growth_threshold;
            self.delay = (self.delay * self.policy.growth_factor).min(self.policy.max_delay);
            tracing::trace!(
                delay_us = self.delay.as_micros() as u64,
                elapsed_us = elapsed.as_micros() as u64,
                "backoff delay grew"
            );
        }
        self.delay
    }
}
