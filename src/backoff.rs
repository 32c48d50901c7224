use std::time::Duration;

pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Exponential backoff schedule for reconnect attempts.
///
/// The policy itself is stateless; the session owns the attempt counter and
/// consults the policy on every disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given attempt: `base_delay * 2^attempt`, capped at
    /// `max_delay`. Saturates instead of overflowing for large counters.
    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether another attempt is permitted after `attempt` failures.
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base_ms: u64, max_ms: u64, attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
            max_attempts: attempts,
        }
    }

    #[test]
    fn first_delay_is_base_delay() {
        let p = policy(250, 10_000, 5);
        assert_eq!(p.next_delay(0), Duration::from_millis(250));
    }

    #[test]
    fn delays_double_until_capped() {
        let p = policy(1_000, 30_000, 5);
        assert_eq!(p.next_delay(1), Duration::from_millis(2_000));
        assert_eq!(p.next_delay(2), Duration::from_millis(4_000));
        assert_eq!(p.next_delay(4), Duration::from_millis(16_000));
        assert_eq!(p.next_delay(5), Duration::from_millis(30_000));
        assert_eq!(p.next_delay(6), Duration::from_millis(30_000));
    }

    #[test]
    fn delays_are_non_decreasing_and_bounded() {
        let p = policy(100, 5_000, 10);
        let mut previous = Duration::ZERO;
        for attempt in 0..64 {
            let delay = p.next_delay(attempt);
            assert!(delay >= previous);
            assert!(delay <= p.max_delay);
            previous = delay;
        }
    }

    #[test]
    fn huge_attempt_counters_saturate() {
        let p = policy(1_000, 30_000, 5);
        assert_eq!(p.next_delay(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn retry_cutoff_is_exclusive() {
        let p = policy(1_000, 30_000, 5);
        assert!(p.should_retry(0));
        assert!(p.should_retry(4));
        assert!(!p.should_retry(5));
        assert!(!p.should_retry(6));
    }

    #[test]
    fn zero_attempts_never_retries() {
        let p = policy(1_000, 30_000, 0);
        assert!(!p.should_retry(0));
    }
}
