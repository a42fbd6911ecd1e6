// SPDX-License-Identifier: Apache-2.0
//! Local fan-out and cross-shard publish ports for faction payouts (§4.G
//! "Fan out local notification", §6 "Cross-shard bus"). Both are
//! consumed-only ports, in the spirit of [`vivarium_core::EventBus`]: the
//! concrete transport is out of scope and implemented by process wiring.

use vivarium_core::UserId;

/// A cross-shard faction-total update, matching the wire shape of topic
/// `FactionTotalsUpdateV1` (§6): `{faction, total, ts}`.
#[derive(Debug, Clone, PartialEq)]
pub struct FactionTotalUpdate {
    /// Faction name.
    pub faction: String,
    /// The publishing shard's total at the time of publish.
    pub total: u64,
    /// Unix timestamp of the publish.
    pub ts: i64,
}

/// Publishes faction-total updates for other shards to converge on
/// (§4.G "Publish cross-shard `{faction, total, ts}`").
pub trait CrossShardBus: Send + Sync {
    /// Publish `update` to the cross-shard bus.
    fn publish(&self, update: FactionTotalUpdate);
}

/// Null-object [`CrossShardBus`] for single-shard deployments and tests.
pub struct NoCrossShardBus;

impl CrossShardBus for NoCrossShardBus {
    fn publish(&self, _update: FactionTotalUpdate) {}
}

/// Fans a payout out to local clients (§4.G "Fan out local notification
/// (all local clients)"). The concrete transport (player-facing remote
/// events, §6) is out of scope; this is the seam process wiring hooks
/// into.
pub trait FactionNotifier: Send + Sync {
    /// Notify local subscribers that `amount` was paid into `faction`,
    /// bringing its locally-known total to `new_total`. `user_id` is the
    /// attributed payer, when one exists.
    fn notify_payout(&self, faction: &str, amount: u64, new_total: u64, user_id: Option<UserId>);
}

/// Null-object [`FactionNotifier`] for degraded composition (§9
/// "Optional-module probing").
pub struct NoFactionNotify;

impl FactionNotifier for NoFactionNotify {
    fn notify_payout(&self, _faction: &str, _amount: u64, _new_total: u64, _user_id: Option<UserId>) {}
}
