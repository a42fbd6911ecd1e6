// SPDX-License-Identifier: Apache-2.0
//! Retry policy and exponential backoff (§4.A, §7, §9 "retry budgets").

use std::time::Duration;

/// Exponential backoff policy, grounded on the `RuntimeRetryPolicy` shape
/// seen across the pack's persistence-adjacent crates (initial/base delay,
/// cap, attempt count).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial backoff delay.
    pub base_delay: Duration,
    /// Maximum backoff delay (the series is capped here).
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Per spec §9: "profile saves ... explicit values ... totals: 5
    /// retries with 0.5s base backoff." This constructor is for totals
    /// flush (§4.G).
    #[must_use]
    pub const fn totals_default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }

    /// Profile saves get a tighter attempt budget backed by the 4s
    /// `saveNowAndWait` wait budget (§9) rather than a long retry tail.
    #[must_use]
    pub const fn profile_save_default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        }
    }

    /// A longer-budget variant used only for the shutdown-time forced
    /// final write (§4.B "Shutdown").
    #[must_use]
    pub const fn shutdown_final_write() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
        }
    }

    /// The delay to use before attempt number `attempt` (0-indexed: the
    /// delay before the *second* attempt is `delay_for(0)`).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_then_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
        // Capped, not 1600ms.
        assert_eq!(policy.delay_for(4), Duration::from_millis(1000));
    }

    #[test]
    fn totals_and_profile_defaults_match_spec_budgets() {
        assert_eq!(RetryPolicy::totals_default().max_attempts, 5);
        assert_eq!(RetryPolicy::totals_default().base_delay, Duration::from_millis(500));
        assert_eq!(RetryPolicy::profile_save_default().max_attempts, 4);
    }
}
