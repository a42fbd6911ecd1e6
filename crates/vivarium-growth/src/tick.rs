// SPDX-License-Identifier: Apache-2.0
//! Pure growth arithmetic (§4.E "Offline replay", "Per-tick mutation",
//! "Non-regression"), isolated from `LiveAttrs`/`LiveWorldPort` so it can be
//! exercised directly in unit and property tests.

use crate::config::GrowthConfig;

/// The subset of a live slime's attribute bag the growth engine reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthInputs {
    /// Live, in-flight growth fraction in `[0, 1]`.
    pub growth_progress: f64,
    /// Last persisted (stamped) growth fraction, the non-regressing floor.
    pub persisted_growth_progress: f64,
    /// Unix timestamp of the last growth update (persisted or live).
    pub last_growth_update: i64,
    /// Remaining feed-buffer seconds (decremented while active).
    pub feed_buffer_seconds: f64,
    /// Feed-buffer speed multiplier (applied while the buffer is non-empty).
    pub feed_speed_multiplier: f64,
    /// Ambient hunger speed multiplier (applied regardless of buffer state).
    pub hunger_multiplier: f64,
    /// Seconds of continuous unfed growth needed to go from 0 to 1.
    pub unfed_growth_duration: f64,
    /// Cumulative age in seconds.
    pub age: f64,
}

/// The fields the growth engine writes back, derived from [`GrowthInputs`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthOutputs {
    /// Updated live growth fraction.
    pub growth_progress: f64,
    /// Updated persisted floor (`max(prev, progress)`, never decreases).
    pub persisted_growth_progress: f64,
    /// Updated `LastGrowthUpdate` timestamp.
    pub last_growth_update: i64,
    /// Updated remaining feed-buffer seconds.
    pub feed_buffer_seconds: f64,
    /// Updated cumulative age.
    pub age: f64,
    /// Recomputed visual scale from the smoothstep easing.
    pub size_scale: f64,
}

fn speed(feed_buffer_seconds: f64, feed_speed_multiplier: f64, hunger_multiplier: f64) -> f64 {
    if feed_buffer_seconds > 0.0 {
        feed_speed_multiplier * hunger_multiplier
    } else {
        hunger_multiplier
    }
}

fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn scale_for(progress: f64, cfg: &GrowthConfig) -> f64 {
    cfg.start_scale + (cfg.max_scale - cfg.start_scale) * smoothstep(0.0, 1.0, progress)
}

/// Replay an offline gap in two segments: a buffered segment at
/// `feedMult × hungerMult` followed by a normal segment at `hungerMult`,
/// each integrating `(segSeconds × speed) / unfedGrowthDuration` and
/// together capped so progress never exceeds `1.0` (§4.E "Offline replay",
/// scenario S2). `now − inputs.last_growth_update` is clamped to
/// `cfg.max_offline_seconds` before replay (§9 "Offline growth cap").
#[must_use]
pub fn replay_offline(inputs: &GrowthInputs, now: i64, cfg: &GrowthConfig) -> GrowthOutputs {
    let raw_delta = now.saturating_sub(inputs.last_growth_update).max(0);
    let delta = raw_delta.min(cfg.max_offline_seconds) as f64;
    let unfed = inputs.unfed_growth_duration.max(f64::EPSILON);

    let mut progress = inputs.growth_progress;
    let mut feed_buffer = inputs.feed_buffer_seconds;

    let buffered_seconds = feed_buffer.max(0.0).min(delta);
    if buffered_seconds > 0.0 {
        let buffered_speed = speed(feed_buffer, inputs.feed_speed_multiplier, inputs.hunger_multiplier);
        progress = (progress + buffered_seconds * buffered_speed / unfed).min(1.0);
        feed_buffer -= buffered_seconds;
    }

    let normal_seconds = delta - buffered_seconds;
    if normal_seconds > 0.0 {
        let headroom = (1.0 - progress).max(0.0);
        let raw = normal_seconds * inputs.hunger_multiplier / unfed;
        progress = (progress + raw.min(headroom)).min(1.0);
    }

    let persisted = inputs.persisted_growth_progress.max(progress);
    GrowthOutputs {
        growth_progress: progress,
        persisted_growth_progress: persisted,
        last_growth_update: now,
        feed_buffer_seconds: feed_buffer,
        age: inputs.age + delta,
        size_scale: scale_for(progress, cfg),
    }
}

/// Advance growth by one small, continuous tick (§4.E "Per-tick mutation").
/// When `reraise_floor` is `Some`, progress is re-raised to that floor if the
/// tick would otherwise leave it below it (§4.E "Non-regression", the
/// within-second-pass-window case).
#[must_use]
pub fn apply_tick(inputs: &GrowthInputs, dt_seconds: f64, cfg: &GrowthConfig, reraise_floor: Option<f64>) -> GrowthOutputs {
    let dt = dt_seconds.max(0.0);
    let unfed = inputs.unfed_growth_duration.max(f64::EPSILON);
    let tick_speed = speed(inputs.feed_buffer_seconds, inputs.feed_speed_multiplier, inputs.hunger_multiplier);

    let mut progress = (inputs.growth_progress + dt * tick_speed / unfed).min(1.0);
    if let Some(floor) = reraise_floor {
        progress = progress.max(floor.min(1.0));
    }

    let feed_buffer = if inputs.feed_buffer_seconds > 0.0 {
        (inputs.feed_buffer_seconds - dt).max(0.0)
    } else {
        inputs.feed_buffer_seconds
    };

    let persisted = inputs.persisted_growth_progress.max(progress);
    GrowthOutputs {
        growth_progress: progress,
        persisted_growth_progress: persisted,
        last_growth_update: inputs.last_growth_update,
        feed_buffer_seconds: feed_buffer,
        age: inputs.age + dt,
        size_scale: scale_for(progress, cfg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> GrowthInputs {
        GrowthInputs {
            growth_progress: 0.40,
            persisted_growth_progress: 0.40,
            last_growth_update: 0,
            feed_buffer_seconds: 60.0,
            feed_speed_multiplier: 2.0,
            hunger_multiplier: 1.0,
            unfed_growth_duration: 600.0,
            age: 0.0,
        }
    }

    #[test]
    fn scenario_s2_offline_replay() {
        let cfg = GrowthConfig::default();
        let out = replay_offline(&base(), 3600, &cfg);
        assert!((out.growth_progress - 1.0).abs() < 1e-9);
        assert!((out.persisted_growth_progress - 1.0).abs() < 1e-9);
        assert_eq!(out.feed_buffer_seconds, 0.0);
        assert_eq!(out.age, 3600.0);
        assert_eq!(out.last_growth_update, 3600);
    }

    #[test]
    fn offline_delta_is_capped() {
        let cfg = GrowthConfig { max_offline_seconds: 3600, ..GrowthConfig::default() };
        let inputs = base();
        let out = replay_offline(&inputs, 100_000, &cfg);
        // Age only accumulates the capped delta, not the full wall-clock gap.
        assert_eq!(out.age, 3600.0);
    }

    #[test]
    fn progress_never_exceeds_one() {
        let cfg = GrowthConfig::default();
        let mut inputs = base();
        inputs.growth_progress = 0.99;
        inputs.persisted_growth_progress = 0.99;
        let out = replay_offline(&inputs, 1_000_000, &cfg);
        assert!(out.growth_progress <= 1.0);
    }

    #[test]
    fn tick_reraises_to_floor_when_given() {
        let cfg = GrowthConfig::default();
        let mut inputs = base();
        inputs.growth_progress = 0.10; // regressed, e.g. by a stale restore
        let out = apply_tick(&inputs, 0.016, &cfg, Some(0.60));
        assert!(out.growth_progress >= 0.60);
    }

    #[test]
    fn persisted_floor_never_decreases() {
        let cfg = GrowthConfig::default();
        let mut inputs = base();
        inputs.growth_progress = 0.0;
        inputs.persisted_growth_progress = 0.70;
        let out = apply_tick(&inputs, 0.016, &cfg, None);
        assert!(out.persisted_growth_progress >= 0.70);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn inputs_strategy() -> impl Strategy<Value = GrowthInputs> {
        (0.0..=1.0_f64, 0.0..=1.0_f64, 0i64..=10_000, 0.0..=600.0_f64, 1.0..=5.0_f64, 0.1..=2.0_f64, 60.0..=3600.0_f64, 0.0..=100_000.0_f64).prop_map(
            |(growth_progress, persisted_growth_progress, last_growth_update, feed_buffer_seconds, feed_speed_multiplier, hunger_multiplier, unfed_growth_duration, age)| GrowthInputs {
                growth_progress,
                persisted_growth_progress: persisted_growth_progress.max(growth_progress),
                last_growth_update,
                feed_buffer_seconds,
                feed_speed_multiplier,
                hunger_multiplier,
                unfed_growth_duration,
                age,
            },
        )
    }

    proptest! {
        /// §3 invariant 5 / §4.E "Non-regression": no amount of offline
        /// replay or ticking ever lowers the persisted floor below its
        /// input value.
        #[test]
        fn persisted_floor_is_never_lowered(
            inputs in inputs_strategy(),
            now_delta in 0i64..200_000,
            dt in 0.0..120.0_f64,
        ) {
            let cfg = GrowthConfig::default();
            let floor = inputs.persisted_growth_progress;

            let replayed = replay_offline(&inputs, inputs.last_growth_update + now_delta, &cfg);
            prop_assert!(replayed.persisted_growth_progress >= floor - 1e-12);

            let ticked = apply_tick(&inputs, dt, &cfg, None);
            prop_assert!(ticked.persisted_growth_progress >= floor - 1e-12);
        }

        /// §9 "Offline growth cap": age only ever accumulates up to
        /// `max_offline_seconds`, regardless of how large the wall-clock
        /// gap actually was.
        #[test]
        fn offline_age_delta_is_capped(
            inputs in inputs_strategy(),
            now_delta in 0i64..10_000_000,
            max_offline_seconds in 60i64..86_400,
        ) {
            let cfg = GrowthConfig { max_offline_seconds, ..GrowthConfig::default() };
            let out = replay_offline(&inputs, inputs.last_growth_update + now_delta, &cfg);
            let age_delta = out.age - inputs.age;
            prop_assert!(age_delta <= max_offline_seconds as f64 + 1e-9);
            prop_assert!(age_delta >= 0.0);
        }

        /// Progress is always clamped to `[0, 1]` regardless of inputs.
        #[test]
        fn growth_progress_stays_in_unit_range(
            inputs in inputs_strategy(),
            now_delta in 0i64..1_000_000,
            dt in 0.0..3600.0_f64,
        ) {
            let cfg = GrowthConfig::default();
            let replayed = replay_offline(&inputs, inputs.last_growth_update + now_delta, &cfg);
            prop_assert!((0.0..=1.0).contains(&replayed.growth_progress));

            let ticked = apply_tick(&inputs, dt, &cfg, None);
            prop_assert!((0.0..=1.0).contains(&ticked.growth_progress));
        }
    }
}
