// SPDX-License-Identifier: Apache-2.0
//! Pre-Exit Sync (§4.F): the ordered at-disconnect barrier that reconciles
//! transient live-world state into a player's profile before the save that
//! precedes their removal.

mod config;
mod error;
mod merge;
mod sync;

pub use config::PreSyncConfig;
pub use error::PreSyncError;
pub use sync::PreExitSync;
