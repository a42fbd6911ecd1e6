// SPDX-License-Identifier: Apache-2.0
//! `SalePipeline`: the atomic sale primitive (§4.H).

use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::instrument;
use vivarium_core::{AttrValue, EntityId, EntityKind, InventoryField, LiveWorldPort, ToolUniqueId, UserId};
use vivarium_cache::ProfileCache;
use vivarium_factions::{FactionPayoutSink, NullFactionTotals};
use vivarium_store::ProfileStore;

use crate::apply::ApplySale;
use crate::config::SaleConfig;
use crate::error::SaleError;
use crate::pricing::price_tool;

/// Attribute keys `removeInventoryItem` is tried against defensively
/// (§4.H step 5 "all plausible key names").
const DEFENSIVE_REMOVE_KEYS: [&str; 4] = ["ToolUniqueId", "ToolUid", "uid", "id"];

/// Outcome of a [`SalePipeline::sell`] call. Input-validation and
/// no-sellable-tools failures surface here as `ok: false` with a `reason`,
/// never as a [`SaleError`] (§7 "input error ... returned as `(false,
/// reason)` tuples, never thrown").
#[derive(Debug, Clone, PartialEq)]
pub struct SaleOutcome {
    /// Whether the sale committed (or trivially succeeded with zero
    /// requested tools).
    pub ok: bool,
    /// Present when `ok` is `false`.
    pub reason: Option<String>,
    /// Sum of each sold tool's final payout.
    pub total_payout: u64,
    /// Sum of each sold tool's `baseGross`, pre-multiplier.
    pub total_base: f64,
    /// `SlimeId`s actually sold (after dropping non-positive payouts).
    pub sold_slime_ids: Vec<u64>,
    /// Standing before the sale's gain was applied.
    pub standing_before: f64,
    /// Standing after the sale's gain was applied.
    pub standing_after: f64,
}

impl SaleOutcome {
    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
            total_payout: 0,
            total_base: 0.0,
            sold_slime_ids: Vec::new(),
            standing_before: 0.0,
            standing_after: 0.0,
        }
    }

    fn trivial_ok() -> Self {
        Self {
            ok: true,
            reason: None,
            total_payout: 0,
            total_base: 0.0,
            sold_slime_ids: Vec::new(),
            standing_before: 0.0,
            standing_after: 0.0,
        }
    }
}

/// Composes the Profile Cache, an optional atomic `ApplySale` collaborator,
/// and an optional Faction Totals sink into the sale primitive described by
/// §4.H.
pub struct SalePipeline<S, W> {
    cache: Arc<ProfileCache<S>>,
    world: Arc<AsyncMutex<W>>,
    apply_sale: Option<Arc<dyn ApplySale>>,
    faction_sink: Arc<dyn FactionPayoutSink>,
    cfg: SaleConfig,
}

impl<S, W> SalePipeline<S, W>
where
    S: ProfileStore + 'static,
    W: LiveWorldPort,
{
    /// Compose over a cache and live-world port. No atomic `ApplySale`
    /// collaborator and no Faction Totals integration by default.
    #[must_use]
    pub fn new(cache: Arc<ProfileCache<S>>, world: Arc<AsyncMutex<W>>) -> Self {
        Self {
            cache,
            world,
            apply_sale: None,
            faction_sink: Arc::new(NullFactionTotals),
            cfg: SaleConfig::default(),
        }
    }

    /// Attach an atomic `ApplySale` collaborator (§4.H step 4).
    #[must_use]
    pub fn with_apply_sale(mut self, apply_sale: Arc<dyn ApplySale>) -> Self {
        self.apply_sale = Some(apply_sale);
        self
    }

    /// Report each sale's `totalPayout` into a Faction Totals sink.
    #[must_use]
    pub fn with_faction_sink(mut self, sink: Arc<dyn FactionPayoutSink>) -> Self {
        self.faction_sink = sink;
        self
    }

    /// Override the default tunables.
    #[must_use]
    pub fn with_config(mut self, cfg: SaleConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sell the captured slimes named by `tool_ids` (`ToolUniqueId`s) for
    /// `user_id`, paid out under `faction`'s standing multiplier (§4.H).
    #[instrument(skip(self))]
    pub async fn sell(&self, user_id: UserId, faction: &str, tool_ids: &[u64], reason: &str) -> Result<SaleOutcome, SaleError> {
        if faction.trim().is_empty() {
            return Ok(SaleOutcome::rejected("invalid faction"));
        }
        if tool_ids.is_empty() {
            return Ok(SaleOutcome::trivial_ok());
        }

        let profile = self.cache.get_profile(user_id).await;
        let standing_before = profile.stats.standing_for(faction);
        let stand_mult = self.cfg.stand_mult_min + (self.cfg.stand_mult_max - self.cfg.stand_mult_min) * standing_before;

        // Step 1-2: price every requested tool that resolves to a captured
        // slime entry and clears the positive-payout bar.
        let mut priced = Vec::new();
        for entry in &profile.inventory.captured_slimes {
            let Some(uid) = entry.get("uid").and_then(AttrValue::as_u64) else {
                continue;
            };
            if !tool_ids.contains(&uid) {
                continue;
            }
            if let Some(p) = price_tool(entry, stand_mult, &self.cfg) {
                // Step 3: drop tools with non-positive payout.
                if p.payout > 0 {
                    priced.push(p);
                }
            }
        }

        if priced.is_empty() {
            return Ok(SaleOutcome::rejected("no matching priced tools"));
        }

        let total_payout: u64 = priced.iter().map(|p| p.payout).sum();
        let total_base: f64 = priced.iter().map(|p| p.base_gross).sum();
        let sold_slime_ids: Vec<u64> = priced.iter().map(|p| p.slime_id).collect();
        let sold_tool_uids: Vec<u64> = priced.iter().filter_map(|p| p.tool_uid).collect();

        // Step 4: atomic apply if available, else manual credit + removal.
        if let Some(applier) = &self.apply_sale {
            applier
                .apply_sale(user_id, &sold_slime_ids, &sold_tool_uids, total_payout, reason)
                .await
                .map_err(SaleError::ApplyFailed)?;
        } else {
            self.cache.increment_coins(user_id, i64::try_from(total_payout).unwrap_or(i64::MAX)).await;
        }

        // Step 5: defensive idempotent removal across every plausible key
        // name, whether or not the atomic path ran.
        for id in sold_slime_ids.iter().chain(sold_tool_uids.iter()) {
            for key in DEFENSIVE_REMOVE_KEYS {
                self.cache.remove_inventory_item(user_id, InventoryField::CapturedSlimes, key, *id).await;
            }
        }

        // Step 6: verified save, then verify no sold id remains; retry
        // remove+save once more if some do.
        let mut outcome = self.cache.save_now_and_wait(user_id, self.cfg.save_timeout, true).await;
        if !outcome.done {
            return Err(SaleError::SaveDidNotComplete { reason: outcome.reason });
        }
        if self.any_sold_id_remains(user_id, &sold_slime_ids, &sold_tool_uids).await {
            for id in sold_slime_ids.iter().chain(sold_tool_uids.iter()) {
                for key in DEFENSIVE_REMOVE_KEYS {
                    self.cache.remove_inventory_item(user_id, InventoryField::CapturedSlimes, key, *id).await;
                }
            }
            outcome = self.cache.save_now_and_wait(user_id, self.cfg.save_timeout, true).await;
            if !outcome.done {
                return Err(SaleError::SaveDidNotComplete { reason: outcome.reason });
            }
        }

        // Step 7: destroy the live tool instances and any matching world
        // entity.
        {
            let mut world = self.world.lock().await;
            for &uid in &sold_tool_uids {
                world.destroy(EntityKind::CapturedSlime, EntityId::from(ToolUniqueId::new(uid)));
            }
            for &slime_id in &sold_slime_ids {
                if let Some(world_id) = find_world_slime_by_slime_id(&*world, user_id, slime_id) {
                    world.destroy(EntityKind::WorldSlime, world_id);
                }
            }
        }

        // Step 8: standing gain.
        let gain = (total_base * self.cfg.standing_gain_a + (total_payout as f64) * self.cfg.standing_gain_b)
            / (1.0 + standing_before * self.cfg.standing_gain_c)
            / self.cfg.standing_gain_d;
        let standing_after = self.cache.set_standing(user_id, faction, standing_before + gain.max(0.0)).await;
        self.cache.save_now(user_id, "sale_standing_gain").await;

        self.faction_sink.add_payout(faction, total_payout, Some(user_id)).await;

        Ok(SaleOutcome {
            ok: outcome.ok,
            reason: outcome.reason,
            total_payout,
            total_base,
            sold_slime_ids,
            standing_before,
            standing_after,
        })
    }

    async fn any_sold_id_remains(&self, user_id: UserId, slime_ids: &[u64], tool_uids: &[u64]) -> bool {
        let profile = self.cache.get_profile(user_id).await;
        profile.inventory.captured_slimes.iter().any(|e| {
            let id = e.resolve_id(InventoryField::CapturedSlimes.id_key_candidates());
            let uid = e.get("uid").and_then(AttrValue::as_u64);
            matches!(id, Some(id) if slime_ids.contains(&id)) || matches!(uid, Some(uid) if tool_uids.contains(&uid))
        })
    }
}

fn find_world_slime_by_slime_id(world: &dyn LiveWorldPort, owner: UserId, slime_id: u64) -> Option<EntityId> {
    world.entities_for_owner(EntityKind::WorldSlime, owner).into_iter().find(|&id| {
        world
            .read_attrs(EntityKind::WorldSlime, id)
            .and_then(|attrs| attrs.get("SlimeId").and_then(AttrValue::as_u64))
            == Some(slime_id)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vivarium_core::{InventoryEntry, Profile};
    use vivarium_testkit::{FakeLiveWorld, InMemoryProfileStore};

    fn harness(profile: Profile) -> (SalePipeline<InMemoryProfileStore, FakeLiveWorld>, UserId) {
        let user = profile.user_id;
        let store = InMemoryProfileStore::new();
        store.seed(profile);
        let cache = Arc::new(ProfileCache::new(Arc::new(store)).with_debounce(Duration::from_millis(1)));
        let pipeline = SalePipeline::new(cache, Arc::new(AsyncMutex::new(FakeLiveWorld::new())))
            .with_config(SaleConfig { save_timeout: Duration::from_secs(2), ..SaleConfig::default() });
        (pipeline, user)
    }

    fn captured(slime_id: u64, tool_uid: u64, value: f64) -> InventoryEntry {
        InventoryEntry::from_pairs([
            ("id", AttrValue::from(slime_id)),
            ("uid", AttrValue::from(tool_uid)),
            ("val", AttrValue::from(value)),
        ])
    }

    #[tokio::test]
    async fn sells_two_slimes_at_neutral_standing_and_credits_coins() {
        let mut profile = Profile::seeded(UserId::new(1), &[("slime_kin", 0.5)]);
        profile.inventory.captured_slimes = vec![captured(1, 101, 50.0), captured(2, 102, 30.0)];
        let (pipeline, user) = harness(profile);

        let outcome = pipeline.sell(user, "slime_kin", &[101, 102], "market").await.unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.total_payout, 80);
        assert_eq!(outcome.sold_slime_ids.len(), 2);

        let after = pipeline.cache.get_profile(user).await;
        assert_eq!(after.core.coins, 80);
        assert!(after.inventory.captured_slimes.is_empty());
        assert!(after.stats.standing_for("slime_kin") > 0.5);
    }

    #[tokio::test]
    async fn rejects_empty_faction_without_side_effects() {
        let profile = Profile::seeded(UserId::new(2), &[]);
        let (pipeline, user) = harness(profile);
        let outcome = pipeline.sell(user, "  ", &[1], "market").await.unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.total_payout, 0);
    }

    #[tokio::test]
    async fn empty_tool_list_is_a_trivial_success() {
        let profile = Profile::seeded(UserId::new(3), &[]);
        let (pipeline, user) = harness(profile);
        let outcome = pipeline.sell(user, "slime_kin", &[], "market").await.unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.total_payout, 0);
    }

    #[tokio::test]
    async fn unmatched_tool_ids_are_rejected_as_no_priced_tools() {
        let mut profile = Profile::seeded(UserId::new(4), &[]);
        profile.inventory.captured_slimes = vec![captured(1, 101, 50.0)];
        let (pipeline, user) = harness(profile);
        let outcome = pipeline.sell(user, "slime_kin", &[999], "market").await.unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.reason.as_deref(), Some("no matching priced tools"));
    }

    #[tokio::test]
    async fn destroys_live_captured_slime_tool_instance_on_sale() {
        let mut profile = Profile::seeded(UserId::new(5), &[]);
        profile.inventory.captured_slimes = vec![captured(1, 101, 50.0)];
        let (pipeline, user) = harness(profile);

        let entity_id = EntityId::from(ToolUniqueId::new(101));
        {
            let mut world = pipeline.world.lock().await;
            world.spawn(EntityKind::CapturedSlime, user, entity_id, "t", vivarium_core::LiveAttrs::new(), None);
        }

        pipeline.sell(user, "slime_kin", &[101], "market").await.unwrap();

        let world = pipeline.world.lock().await;
        assert!(world.read_attrs(EntityKind::CapturedSlime, entity_id).is_none());
    }
}
