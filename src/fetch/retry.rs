//! Exponential backoff with jitter between transport attempts.

use std::time::Duration;

use rand::Rng;

/// Retry budget for transient transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles for each further attempt.
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

    /// Create a policy. At least one attempt is always made.
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// Base wait after the given failed attempt (1-based), before jitter.
    pub fn base_delay(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(30);
        self.initial_backoff.saturating_mul(1u32 << exponent)
    }

    /// Wait after the given failed attempt: the base delay plus a uniform
    /// jitter in `[0, base]`.
    pub fn delay<R: Rng + ?Sized>(&self, rng: &mut R, failed_attempt: u32) -> Duration {
        let base = self.base_delay(failed_attempt);
        let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let extra = if base_ms == 0 {
            0
        } else {
            rng.gen_range(0..=base_ms)
        };
        base.saturating_add(Duration::from_millis(extra))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Duration::from_secs(1))
    }
}
