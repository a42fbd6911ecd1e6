// SPDX-License-Identifier: Apache-2.0
//! Tunables for the Pre-Exit Sync barrier (§4.F).

use std::time::Duration;

/// Pre-Exit Sync tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreSyncConfig {
    /// How long to wait after requesting a growth flush for the dirty
    /// event to be picked up before resuming (§4.F step 3 "wait briefly").
    pub growth_flush_settle: Duration,
    /// Timeout given to the step-7 verified save.
    pub save_timeout: Duration,
}

impl Default for PreSyncConfig {
    fn default() -> Self {
        Self {
            growth_flush_settle: Duration::from_millis(150),
            save_timeout: Duration::from_secs(4),
        }
    }
}
