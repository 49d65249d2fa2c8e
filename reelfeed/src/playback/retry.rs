//! Retry policy for failed media attaches.
//!
//! The policy is a pure mapping from attempt count to either a delay before
//! the next attempt or a decision to give up. Scheduling is represented by
//! [`RetrySchedule`], a cancellable deadline owned by the slot, so that
//! teardown can cancel a pending retry deterministically.
//!
//! # Example
//!
//! ```
//! use reelfeed::playback::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::default();
//! assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_secs(1)));
//! assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_secs(4)));
//! assert_eq!(policy.delay_for_attempt(3), None);
//! ```

use std::time::{Duration, Instant};

use super::engine::MediaErrorKind;

// =============================================================================
// Retry Policy Constants
// =============================================================================

/// Default base delay for exponential backoff (1 second).
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Default number of retries before a slot is exhausted.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Upper bound on any single backoff delay (30 seconds).
pub const DEFAULT_MAX_DELAY_SECS: u64 = 30;

/// Exponential backoff for recoverable media errors.
///
/// `delay(attempt) = base * 2^attempt`, for `attempt < max_attempts`.
/// `attempt` counts retries already scheduled, starting at 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Number of retries allowed before giving up.
    pub max_attempts: u32,

    /// Cap applied to computed delays.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given base delay and attempt limit.
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
            ..Self::default()
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, 0)
    }

    /// Whether another retry is allowed after `attempt` retries.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before retry number `attempt` (0-based), or `None` to give up.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if !self.should_retry(attempt) {
            return None;
        }

        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let delay = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay);
        Some(delay.min(self.max_delay))
    }

    /// Whether errors of this kind are worth retrying at all.
    ///
    /// Transport and format failures can clear up on their own; a corrupt
    /// stream will fail the same way every time.
    pub fn is_retryable(&self, kind: MediaErrorKind) -> bool {
        kind.is_recoverable()
    }
}

/// A pending retry: which attempt it is and when it fires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrySchedule {
    attempt: u32,
    fire_at: Instant,
    cancelled: bool,
}

impl RetrySchedule {
    /// Schedules retry `attempt` to fire `delay` after `now`.
    pub fn new(attempt: u32, now: Instant, delay: Duration) -> Self {
        Self {
            attempt,
            fire_at: now + delay,
            cancelled: false,
        }
    }

    /// Retry number (0-based).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// When the retry fires.
    pub fn next_fire_time(&self) -> Instant {
        self.fire_at
    }

    /// Delay between scheduling and firing, measured from `scheduled_at`.
    pub fn delay_from(&self, scheduled_at: Instant) -> Duration {
        self.fire_at.saturating_duration_since(scheduled_at)
    }

    /// Cancels the retry. A cancelled schedule never becomes due.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Whether `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Whether the retry should fire at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        !self.cancelled && now >= self.fire_at
    }
}
