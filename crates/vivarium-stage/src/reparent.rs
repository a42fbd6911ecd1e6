// SPDX-License-Identifier: Apache-2.0
//! The reparent port: the one capability `LiveWorldPort` has no analogue
//! for (§4.I). Concrete engines model tool custody as an instance-parent
//! relationship with its own transient-failure mode; this port isolates
//! that from the rest of the crate family.

use async_trait::async_trait;
use thiserror::Error;
use vivarium_core::{EntityId, EntityKind, UserId};

/// Where a staged tool's container currently points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// A server-owned holding area, not visible in any player's backpack.
    ServerHolding,
    /// A specific player's backpack.
    Backpack(UserId),
}

/// Failure modes a reparent attempt can surface.
#[derive(Debug, Error)]
pub enum ReparentError {
    /// A transient engine error (e.g. instance-parent lock contention);
    /// worth retrying with backoff.
    #[error("transient reparent failure: {0}")]
    Transient(String),
    /// An unrecoverable error; retrying would not help.
    #[error("permanent reparent failure: {0}")]
    Permanent(String),
}

/// Moves a live entity between containers. The concrete engine adapter
/// (out of scope) implements this; `vivarium-testkit` provides a fake with
/// an injectable failure schedule for exercising the retry+clone path.
#[async_trait]
pub trait ReparentPort: Send + Sync {
    /// Attempt to move `id` into `target`.
    async fn reparent(&self, kind: EntityKind, id: EntityId, target: Container) -> Result<(), ReparentError>;
}
