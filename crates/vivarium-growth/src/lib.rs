// SPDX-License-Identifier: Apache-2.0
//! Per-entity growth accrual engine (§4.E): offline-delta replay, per-tick
//! mutation, non-regressing floor stamping, and pre-leave flush.

mod config;
mod engine;
mod tick;

pub use config::GrowthConfig;
pub use engine::GrowthEngine;
pub use tick::{GrowthInputs, GrowthOutputs};
