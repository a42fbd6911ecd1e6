// SPDX-License-Identifier: Apache-2.0
//! Profile and inventory data model for the Vivarium persistence core.
//!
//! This crate owns the pure data model (§3) and the ports (§6) every other
//! `vivarium-*` crate builds on: [`Profile`], [`InventoryEntry`],
//! [`InventoryField`], the durable id newtypes, the live-world port, and
//! the local event bus port. It has no async runtime dependency and no
//! knowledge of any remote store — those live in `vivarium-store` and up.

pub mod entry;
pub mod error;
pub mod events;
pub mod ids;
pub mod inventory_field;
pub mod live;
pub mod profile;
pub mod wire;

pub use entry::{AttrValue, InventoryEntry};
pub use error::CoreError;
pub use events::{EventBus, LocalEvent, RemoteEventSink, RemoteRequest, RemoteResult};
pub use ids::{EggId, EntityId, SlimeId, ToolUniqueId, UserId};
pub use inventory_field::InventoryField;
pub use live::{EntityKind, LiveAttrs, LiveWorldPort, Pose};
pub use profile::{CoreStats, Inventory, Meta, Profile, Stats};
