// SPDX-License-Identifier: Apache-2.0
//! Inventory Service (§4.D): sits between `vivarium-serialize` and
//! `vivarium-cache`, mediating serialize/restore sweeps and providing the
//! `ensureEntryHasId` reconciliation primitive used by grant paths.

mod error;
mod service;

pub use error::InventoryError;
pub use service::{FinalizeOutcome, InventoryService};
