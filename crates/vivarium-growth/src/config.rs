// SPDX-License-Identifier: Apache-2.0
//! Tunables for the growth engine (§4.E, §9 "Offline growth cap").

use std::time::Duration;

/// Growth-engine tunables. Defaults match spec scenario S2 and the
/// `GROWTH_TIMESTAMP_UPDATE_INTERVAL` / micro-threshold language in §4.E.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthConfig {
    /// Ceiling on the offline delta replayed on rejoin, in seconds (§9).
    pub max_offline_seconds: i64,
    /// Periodic stamp interval per entity (§4.E "Periodic").
    pub timestamp_update_interval: Duration,
    /// Cumulative progress since the last stamp that triggers a
    /// micro-threshold stamp (§4.E "Micro-threshold").
    pub micro_stamp_threshold: f64,
    /// Per-user debounce applied to both stamp triggers (§4.E, §4.B).
    pub stamp_debounce: Duration,
    /// Window after offline replay during which the engine re-raises
    /// progress to the persisted floor on every tick (§4.E "Non-regression").
    pub second_pass_window: Duration,
    /// Scale at `progress=0.0` for the smoothstep easing (§4.E "Per-tick mutation").
    pub start_scale: f64,
    /// Scale at `progress=1.0` for the smoothstep easing.
    pub max_scale: f64,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            max_offline_seconds: 4 * 3600,
            timestamp_update_interval: Duration::from_secs(60),
            micro_stamp_threshold: 0.005,
            stamp_debounce: Duration::from_millis(750),
            second_pass_window: Duration::from_secs(30),
            start_scale: 0.1,
            max_scale: 1.0,
        }
    }
}
