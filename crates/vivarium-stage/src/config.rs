// SPDX-License-Identifier: Apache-2.0
//! Tunables for the Preserve/Stage Manager (§4.I).

use std::time::Duration;

/// Preserve/Stage Manager tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageConfig {
    /// How long a tool sits in server-owned holding before being reparented
    /// into the player's backpack.
    pub stage_time: Duration,
    /// Delay after the backpack reparent before preserve flags are
    /// eligible to clear.
    pub final_delay: Duration,
    /// Additional grace window added to `final_delay` before flags
    /// actually clear (§4.I "`finalDelay + graceSeconds`").
    pub grace_seconds: Duration,
    /// Maximum reparent attempts (including the first) before falling
    /// back to clone-and-destroy (§4.I, scenario S6).
    pub max_reparent_attempts: u32,
    /// Initial backoff delay between reparent attempts.
    pub retry_base_delay: Duration,
    /// Backoff cap for reparent retries.
    pub retry_max_delay: Duration,
    /// A staged tool left in server-owned holding longer than this is
    /// considered abandoned and destroyed by the periodic sweeper.
    pub abandoned_cleanup: Duration,
}

impl StageConfig {
    /// The delay before retry attempt number `attempt` (0-indexed).
    #[must_use]
    pub fn retry_delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.retry_base_delay.saturating_mul(factor).min(self.retry_max_delay)
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            stage_time: Duration::from_secs(2),
            final_delay: Duration::from_secs(5),
            grace_seconds: Duration::from_secs(10),
            max_reparent_attempts: 3,
            retry_base_delay: Duration::from_millis(200),
            retry_max_delay: Duration::from_secs(2),
            abandoned_cleanup: Duration::from_secs(300),
        }
    }
}
