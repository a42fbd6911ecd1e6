// SPDX-License-Identifier: Apache-2.0
//! `PreExitSync`: the 9-step at-disconnect barrier (§4.F).

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Duration;
use tracing::instrument;
use vivarium_cache::ProfileCache;
use vivarium_core::{EntityKind, Inventory, InventoryField, LiveWorldPort, UserId};
use vivarium_inventory::{FinalizeOutcome, GrowthFlusher, NoGrowthFlush};
use vivarium_serialize::{CapturedSlimeSerializer, EggToolSerializer, FoodToolSerializer, WorldEggSerializer, WorldSlimeSerializer};
use vivarium_store::ProfileStore;

use crate::config::PreSyncConfig;
use crate::error::PreSyncError;
use crate::merge::{merge_authoritative, merge_conservative};

/// Sweeps every live-only entry for `owner`, one per field, with
/// `is_final=false` and an empty last-snapshot so the sub-serializers
/// return exactly what is currently live — none of their own fallback
/// behavior, since the merge here is Pre-Exit Sync's job, not theirs.
fn live_only_sweep(world: &dyn LiveWorldPort, owner: UserId) -> Inventory {
    Inventory {
        world_slimes: WorldSlimeSerializer::serialize(world, owner, false, &[]),
        world_eggs: WorldEggSerializer::serialize(world, owner, false, &[]),
        egg_tools: EggToolSerializer::serialize(world, owner, false, &[]),
        food_tools: FoodToolSerializer::serialize(world, owner, false, &[]),
        captured_slimes: CapturedSlimeSerializer::serialize(world, owner, false, &[]),
    }
}

fn tag_recently_placed_saved(world: &mut dyn LiveWorldPort, user_id: UserId, now: i64) {
    const KINDS: [EntityKind; 5] = [
        EntityKind::WorldSlime,
        EntityKind::WorldEgg,
        EntityKind::FoodTool,
        EntityKind::EggTool,
        EntityKind::CapturedSlime,
    ];
    for kind in KINDS {
        for id in world.entities_for_owner(kind, user_id) {
            if let Some(mut attrs) = world.read_attrs(kind, id) {
                attrs.insert("RecentlyPlacedSaved".to_string(), vivarium_core::AttrValue::Int(now));
                world.write_attrs(kind, id, attrs);
            }
        }
    }
}

/// Implements the at-disconnect Pre-Exit Sync barrier (§4.F). Unlike
/// `InventoryService::finalize_player`, which re-serializes live-only
/// state, this performs its own field-by-field merge against the cached
/// profile (steps 5-6) before committing, then does the commit and
/// verified save itself (the part step 7 describes as the
/// `finalizePlayer`-absent fallback).
pub struct PreExitSync<S, W> {
    cache: Arc<ProfileCache<S>>,
    world: Arc<AsyncMutex<W>>,
    growth: Arc<dyn GrowthFlusher>,
    cfg: PreSyncConfig,
    active: AsyncMutex<HashSet<UserId>>,
}

impl<S, W> PreExitSync<S, W>
where
    S: ProfileStore + 'static,
    W: LiveWorldPort,
{
    /// Compose over a cache and live-world port, with no growth-flush
    /// collaborator by default.
    #[must_use]
    pub fn new(cache: Arc<ProfileCache<S>>, world: Arc<AsyncMutex<W>>) -> Self {
        Self {
            cache,
            world,
            growth: Arc::new(NoGrowthFlush),
            cfg: PreSyncConfig::default(),
            active: AsyncMutex::new(HashSet::new()),
        }
    }

    /// Attach the growth engine's flush collaborator.
    #[must_use]
    pub fn with_growth_flusher(mut self, growth: Arc<dyn GrowthFlusher>) -> Self {
        self.growth = growth;
        self
    }

    /// Override the default tunables.
    #[must_use]
    pub fn with_config(mut self, cfg: PreSyncConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Whether `user_id` currently has a sync in flight.
    pub async fn is_active(&self, user_id: UserId) -> bool {
        self.active.lock().await.contains(&user_id)
    }

    /// Run the full 9-step barrier for `user_id` on `PlayerRemoving`
    /// (§4.F).
    #[instrument(skip(self))]
    pub async fn run(&self, user_id: UserId, now: i64) -> Result<FinalizeOutcome, PreSyncError> {
        // Step 1: mark sync-active.
        self.active.lock().await.insert(user_id);

        // Step 2: drain the save queue.
        self.cache.await_save_queue(user_id, self.cfg.save_timeout).await;

        // Step 3: flush growth, wait briefly for the dirty event pickup.
        self.growth.flush_player_slimes(user_id).await;
        tokio::time::sleep(self.cfg.growth_flush_settle).await;

        // Step 4: enumerate live world state.
        let last_snapshot = self.cache.get_profile(user_id).await.inventory;
        let live = {
            let world = self.world.lock().await;
            live_only_sweep(&*world, user_id)
        };

        // Steps 5-6: authoritative merge for worldSlimes, conservative
        // merge for the other four fields.
        let merged = Inventory {
            world_slimes: merge_authoritative(
                &last_snapshot.world_slimes,
                &live.world_slimes,
                InventoryField::WorldSlimes.id_key_candidates(),
            ),
            world_eggs: merge_conservative(
                &last_snapshot.world_eggs,
                &live.world_eggs,
                InventoryField::WorldEggs.id_key_candidates(),
            ),
            egg_tools: merge_conservative(
                &last_snapshot.egg_tools,
                &live.egg_tools,
                InventoryField::EggTools.id_key_candidates(),
            ),
            food_tools: merge_conservative(
                &last_snapshot.food_tools,
                &live.food_tools,
                InventoryField::FoodTools.id_key_candidates(),
            ),
            captured_slimes: merge_conservative(
                &last_snapshot.captured_slimes,
                &live.captured_slimes,
                InventoryField::CapturedSlimes.id_key_candidates(),
            ),
        };

        // Step 7: commit and request a verified save.
        self.cache.set_inventory(user_id, merged, true).await;
        let outcome = self.cache.save_now_and_wait(user_id, self.cfg.save_timeout, true).await;
        tracing::debug!(%user_id, ok = outcome.ok, done = outcome.done, "pre-exit sync save completed");

        let result = if outcome.ok {
            // Step 8: tag recently-placed-saved for downstream cleanup.
            let mut world = self.world.lock().await;
            tag_recently_placed_saved(&mut *world, user_id, now);
            Ok(FinalizeOutcome { ok: true, reason: None })
        } else if outcome.done {
            Ok(FinalizeOutcome { ok: false, reason: outcome.reason })
        } else {
            Err(PreSyncError::SaveDidNotComplete { reason: outcome.reason })
        };

        // Step 9: unmark sync-active.
        self.active.lock().await.remove(&user_id);

        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use vivarium_core::{AttrValue, EntityId, InventoryEntry, SlimeId};
    use vivarium_testkit::{FakeLiveWorld, InMemoryProfileStore};

    fn harness() -> PreExitSync<InMemoryProfileStore, FakeLiveWorld> {
        let cache = Arc::new(ProfileCache::new(Arc::new(InMemoryProfileStore::new())).with_debounce(Duration::from_millis(1)));
        PreExitSync::new(cache, Arc::new(AsyncMutex::new(FakeLiveWorld::new())))
            .with_config(PreSyncConfig { growth_flush_settle: Duration::from_millis(1), save_timeout: Duration::from_secs(2) })
    }

    #[tokio::test]
    async fn run_commits_live_world_and_tags_recently_placed_saved() {
        let sync = harness();
        let user = UserId::new(1);
        let id = EntityId::from(SlimeId::new(1));
        {
            let mut world = sync.world.lock().await;
            let mut attrs = vivarium_core::LiveAttrs::new();
            attrs.insert("SlimeId".into(), AttrValue::Int(1));
            world.spawn(EntityKind::WorldSlime, user, id, "t", attrs, Some(vivarium_core::Pose::absolute_only([0.0, 0.0, 0.0])));
        }

        let outcome = sync.run(user, 500).await.unwrap();
        assert!(outcome.ok);

        let profile = sync.cache.get_profile(user).await;
        assert_eq!(profile.inventory.world_slimes.len(), 1);

        let world = sync.world.lock().await;
        let attrs = world.read_attrs(EntityKind::WorldSlime, id).unwrap();
        assert_eq!(attrs.get("RecentlyPlacedSaved").and_then(AttrValue::as_i64), Some(500));
    }

    #[tokio::test]
    async fn run_keeps_non_live_egg_tools_via_conservative_merge() {
        let sync = harness();
        let user = UserId::new(2);
        // Seed a cached snapshot with an egg tool that is not currently live
        // (e.g. mid-transit, being staged).
        sync.cache.add_inventory_item(user, InventoryField::EggTools, InventoryEntry::from_pairs([("uid", AttrValue::from(77_u64))])).await;
        sync.cache.await_save_queue(user, Duration::from_secs(1)).await;

        let outcome = sync.run(user, 10).await.unwrap();
        assert!(outcome.ok);
        let profile = sync.cache.get_profile(user).await;
        assert_eq!(profile.inventory.egg_tools.len(), 1);
    }

    #[tokio::test]
    async fn run_unmarks_active_after_completion() {
        let sync = harness();
        let user = UserId::new(3);
        assert!(!sync.is_active(user).await);
        sync.run(user, 0).await.unwrap();
        assert!(!sync.is_active(user).await);
    }

    #[tokio::test]
    async fn world_slime_overwrites_profile_entry_for_matching_id() {
        let sync = harness();
        let user = UserId::new(4);
        let id = EntityId::from(SlimeId::new(9));
        sync.cache
            .add_inventory_item(user, InventoryField::WorldSlimes, InventoryEntry::from_pairs([("id", AttrValue::from(9_u64)), ("gp", AttrValue::from(0.1))]))
            .await;
        sync.cache.await_save_queue(user, Duration::from_secs(1)).await;
        {
            let mut world = sync.world.lock().await;
            let mut attrs = vivarium_core::LiveAttrs::new();
            attrs.insert("SlimeId".into(), AttrValue::Int(9));
            attrs.insert("GrowthProgress".into(), AttrValue::Float(0.8));
            world.spawn(EntityKind::WorldSlime, user, id, "t", attrs, Some(vivarium_core::Pose::absolute_only([0.0, 0.0, 0.0])));
        }

        sync.run(user, 0).await.unwrap();
        let profile = sync.cache.get_profile(user).await;
        assert_eq!(profile.inventory.world_slimes.len(), 1);
        assert_eq!(profile.inventory.world_slimes[0].get("gp").and_then(AttrValue::as_f64), Some(0.8));
    }
}
