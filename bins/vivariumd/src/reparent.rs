// SPDX-License-Identifier: Apache-2.0
//! Placeholder [`ReparentPort`] until a real engine adapter is wired in.

use async_trait::async_trait;
use vivarium_core::{EntityId, EntityKind};
use vivarium_stage::{Container, ReparentError, ReparentPort};

/// Always succeeds. The concrete instance-parent engine this wraps is out
/// of scope (§1); a real deployment supplies an adapter with an actual
/// transient-failure mode instead of this one.
pub struct NoopReparent;

#[async_trait]
impl ReparentPort for NoopReparent {
    async fn reparent(&self, _kind: EntityKind, _id: EntityId, _target: Container) -> Result<(), ReparentError> {
        Ok(())
    }
}
