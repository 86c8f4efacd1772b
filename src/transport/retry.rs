//! Backoff schedule for transient gateway failures.

use std::time::Duration;

/// Exponential backoff policy.
///
/// `max_attempts` counts the first try: a budget of 3 dispatches at most
/// three requests. The delay after failed attempt `n` is
/// `base_delay * 2^(n-1)`, capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to sleep after `attempt` (1-based) failed, or `None` when the
    /// budget is spent and the failure should surface.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }

        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        let delay_ms = (self.base_delay.as_millis() as u64).saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis() as u64);
        Some(Duration::from_millis(capped))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(30))
    }
}
