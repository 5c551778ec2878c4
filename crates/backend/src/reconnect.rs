//! Exponential-backoff reconnection policy for job event streams.
//!
//! After the n-th consecutive close (no successful open in between) the
//! session waits `initial_delay * multiplier^n`, capped at `max_delay`.
//! Once `max_attempts` reconnects have failed the session gives up.

use std::time::Duration;

/// Default number of reconnects before a session reports failure.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Base delay; the first reconnect waits `initial_delay * multiplier`.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Reconnects allowed before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect number `attempt` (1-based), clamped to
    /// [`max_delay`](Self::max_delay).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let ms = self.initial_delay.as_millis() as f64 * factor;
        let max_ms = self.max_delay.as_millis() as f64;
        Duration::from_millis(ms.min(max_ms) as u64)
    }

    /// Delay before the next reconnect given how many reconnects already
    /// happened since the last successful open, or `None` once the budget
    /// is spent.
    pub fn next_delay(&self, attempts: u32) -> Option<Duration> {
        if attempts >= self.max_attempts {
            None
        } else {
            Some(self.delay_for_attempt(attempts + 1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reconnect_waits_two_seconds() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.next_delay(0), Some(Duration::from_millis(2000)));
    }

    #[test]
    fn delay_clamps_at_max() {
        let policy = ReconnectPolicy {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(10));
    }

    #[test]
    fn custom_multiplier() {
        let policy = ReconnectPolicy {
            multiplier: 3.0,
            max_delay: Duration::from_secs(60),
            ..Default::default()
        };
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(9));
    }

    #[test]
    fn full_backoff_sequence() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..)
            .map_while(|attempts| policy.next_delay(attempts))
            .map(|d| d.as_millis() as u64)
            .collect();

        assert_eq!(delays, vec![2000, 4000, 8000, 16000, 30000]);
    }

    #[test]
    fn budget_exhausted_after_max_attempts() {
        let policy = ReconnectPolicy::default();
        assert!(policy.next_delay(4).is_some());
        assert!(policy.next_delay(5).is_none());
        assert!(policy.next_delay(6).is_none());
    }

    #[test]
    fn zero_budget_never_reconnects() {
        let policy = ReconnectPolicy {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(policy.next_delay(0).is_none());
    }

    #[test]
    fn huge_attempt_counts_stay_clamped() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for_attempt(10_000), Duration::from_secs(30));
    }
}
