// SPDX-License-Identifier: Apache-2.0
//! The Grand Serializer (§4.C): pure, stateless translation between live
//! attribute-bearing entities (reached through [`vivarium_core::LiveWorldPort`])
//! and the five persisted inventory fields, plus the inverse restore.
//!
//! Five sub-serializers, one per field, share the common behaviors
//! described in §4.C (short-key projection, color/spatial encoding,
//! dedup, per-field caps, last-snapshot fallback) via the [`common`]
//! module. [`serializer::GrandSerializer`] is the fixed-order orchestrator
//! `Serialize`/`Restore` call from above (`vivarium-inventory`).

mod captured_slime;
mod color;
mod common;
mod egg_tool;
mod food_tool;
mod keys;
mod serializer;
mod world_egg;
mod world_slime;

pub use captured_slime::CapturedSlimeSerializer;
pub use color::Rgb;
pub use common::StabilityTracker;
pub use egg_tool::EggToolSerializer;
pub use food_tool::FoodToolSerializer;
pub use serializer::{GrandSerializer, SerializeRequest};
pub use world_egg::{EggRestorePolicy, WorldEggSerializer};
pub use world_slime::WorldSlimeSerializer;
