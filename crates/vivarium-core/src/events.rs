// SPDX-License-Identifier: Apache-2.0
//! The local (in-process) event bus (§6) as a small typed trait, in the
//! spirit of `echo-app-core`'s port traits: collaborators are injected at
//! composition time rather than probed for at call time (§9 "Optional-module
//! probing").

use crate::ids::UserId;
use serde::{Deserialize, Serialize};

/// Local, bindable events named in §6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LocalEvent {
    /// Request a growth stamp + verified save for a user. Debounced per
    /// user by the receiver (`vivarium-growth`).
    GrowthStampDirty {
        /// The user to stamp.
        user_id: UserId,
        /// Human-readable reason, surfaced in logs.
        reason: String,
    },
    /// Fired after a restore completes; consumed by shop/inventory UI
    /// refresh (out of scope here, but the event still needs a producer).
    PersistInventoryRestored {
        /// The user whose inventory was just restored.
        user_id: UserId,
    },
    /// Fired once after the init sequence (§6) completes.
    GameServicesReady,
}

/// The local event bus port. A no-op implementation is provided by
/// `vivarium-testkit` for tests and degraded composition.
pub trait EventBus: Send + Sync {
    /// Publish an event to all local subscribers. Implementations are
    /// expected to be fire-and-forget / best effort.
    fn publish(&self, event: LocalEvent);
}

/// Inbound player-facing requests this service only consumes (§6); the
/// concrete transport (out of scope here) decodes wire messages into
/// these before handing them to `vivariumd`'s dispatch loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RemoteRequest {
    /// `SellSlimesRequest(player, faction, toolArray, requestToken)`.
    SellSlimes {
        /// The requesting player.
        user_id: UserId,
        /// The faction the sale is paid out under.
        faction: String,
        /// `ToolUniqueId`s of the captured slimes to sell.
        tool_ids: Vec<u64>,
        /// Opaque token echoed back in the reply.
        request_token: String,
    },
    /// `PurchaseEgg(player, type, itemKey, quantity)`.
    PurchaseEgg {
        /// The requesting player.
        user_id: UserId,
        /// Egg type/category.
        egg_type: String,
        /// Catalog item key.
        item_key: String,
        /// Quantity requested.
        quantity: u32,
        /// Opaque token echoed back in the reply.
        request_token: String,
    },
    /// `FeedSlime(player, slime, tool)`.
    FeedSlime {
        /// The requesting player.
        user_id: UserId,
        /// Durable id of the slime being fed.
        slime_id: u64,
        /// Durable id of the food tool consumed.
        tool_uid: u64,
        /// Opaque token echoed back in the reply.
        request_token: String,
    },
    /// `SlimePickupRequest(player, slime)`.
    SlimePickup {
        /// The requesting player.
        user_id: UserId,
        /// Durable id of the world slime being captured.
        slime_id: u64,
        /// Opaque token echoed back in the reply.
        request_token: String,
    },
}

/// Structured reply payload for a [`RemoteRequest`] (§7 "a result payload
/// is sent to the requester with `success` and `message` fields").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResult {
    /// The opaque token from the originating request.
    pub request_token: String,
    /// Whether the request succeeded.
    pub success: bool,
    /// Human-readable outcome, always present (empty on plain success).
    pub message: String,
}

/// The remote, player-facing transport port. The concrete transport
/// (out of scope, §1) decodes wire messages into [`RemoteRequest`] and
/// calls into `vivariumd`'s handlers; replies flow back out through
/// `send_result`.
pub trait RemoteEventSink: Send + Sync {
    /// Send a structured result/update back to the requesting player.
    fn send_result(&self, result: RemoteResult);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingBus(Arc<Mutex<Vec<LocalEvent>>>);
    impl EventBus for RecordingBus {
        fn publish(&self, event: LocalEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn publish_is_observed_by_subscriber() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bus = RecordingBus(log.clone());
        bus.publish(LocalEvent::GameServicesReady);
        bus.publish(LocalEvent::GrowthStampDirty {
            user_id: UserId::new(1),
            reason: "periodic".into(),
        });
        assert_eq!(log.lock().unwrap().len(), 2);
    }
}
