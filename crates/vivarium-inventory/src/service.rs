// SPDX-License-Identifier: Apache-2.0
//! `InventoryService` (§4.D): the runtime membership layer between the
//! Grand Serializer and the Profile Cache.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::instrument;
use vivarium_cache::ProfileCache;
use vivarium_core::{EntityKind, InventoryEntry, InventoryField, LiveWorldPort, UserId};
use vivarium_serialize::GrandSerializer;
use vivarium_store::ProfileStore;

use crate::error::InventoryError;

/// The timeout `finalizePlayer`'s verified save is given before giving up
/// and reporting failure (§4.F step 7, §9 "profile verified save: 4s
/// default with fail-fast").
pub const FINALIZE_SAVE_TIMEOUT: Duration = Duration::from_secs(4);

/// Injected collaborator for `finalizePlayer`'s growth-flush step
/// (§4.D step i, §4.E `FlushPlayerSlimes`). A null-object implementation
/// (`NoGrowthFlush`) is used when no growth engine is composed in (§9
/// "Optional-module probing").
#[async_trait]
pub trait GrowthFlusher: Send + Sync {
    /// Stamp all of `user_id`'s live entities and mark the profile dirty
    /// (§4.E "Pre-leave flush").
    async fn flush_player_slimes(&self, user_id: UserId);
}

/// Null-object [`GrowthFlusher`] for composition without a live growth
/// engine (tests, degraded deployments).
pub struct NoGrowthFlush;

#[async_trait]
impl GrowthFlusher for NoGrowthFlush {
    async fn flush_player_slimes(&self, _user_id: UserId) {}
}

/// Outcome of [`InventoryService::finalize_player`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeOutcome {
    /// Whether the verified save completed successfully.
    pub ok: bool,
    /// Failure reason, when `ok` is `false`.
    pub reason: Option<String>,
}

/// Mediates between a live-world port and the profile cache for a single
/// process (§4.D).
pub struct InventoryService<S, W> {
    cache: Arc<ProfileCache<S>>,
    world: Arc<AsyncMutex<W>>,
    growth: Arc<dyn GrowthFlusher>,
}

impl<S, W> InventoryService<S, W>
where
    S: ProfileStore + 'static,
    W: LiveWorldPort,
{
    /// Compose a service over a cache and a live-world port, with no
    /// growth-flush collaborator (uses [`NoGrowthFlush`]).
    #[must_use]
    pub fn new(cache: Arc<ProfileCache<S>>, world: Arc<AsyncMutex<W>>) -> Self {
        Self { cache, world, growth: Arc::new(NoGrowthFlush) }
    }

    /// Compose a service with an explicit growth-flush collaborator.
    #[must_use]
    pub fn with_growth_flusher(mut self, growth: Arc<dyn GrowthFlusher>) -> Self {
        self.growth = growth;
        self
    }

    /// Append `entry` to `field`, deduplicating by id (§4.D, delegates to
    /// `vivarium-cache`).
    pub async fn add_inventory_item(&self, user_id: UserId, field: InventoryField, entry: InventoryEntry) {
        self.cache.add_inventory_item(user_id, field, entry).await;
    }

    /// Remove every entry in `field` whose `key_name` attribute equals
    /// `key_value` (§4.D, delegates to `vivarium-cache`).
    pub async fn remove_inventory_item(&self, user_id: UserId, field: InventoryField, key_name: &str, key_value: u64) {
        self.cache.remove_inventory_item(user_id, field, key_name, key_value).await;
    }

    /// Idempotent grant-path reconciliation primitive (§4.D): if an entry
    /// with `payload`'s durable id is absent from `field`, add it; if
    /// present, merge only the keys `payload` carries that the existing
    /// entry lacks.
    #[instrument(skip(self, payload))]
    pub async fn ensure_entry_has_id(&self, user_id: UserId, field: InventoryField, payload: InventoryEntry) {
        let Some(id) = payload.resolve_id(field.id_key_candidates()) else {
            tracing::warn!(%user_id, field = %field, "ensure_entry_has_id called with an id-less payload, ignoring");
            return;
        };
        let profile = self.cache.get_profile(user_id).await;
        let existing = profile
            .inventory
            .field(field)
            .iter()
            .find(|e| e.resolve_id(field.id_key_candidates()) == Some(id))
            .cloned();

        let merged = match existing {
            Some(mut current) => {
                current.fill_missing_from(&payload);
                current
            }
            None => payload,
        };
        self.cache.add_inventory_item(user_id, field, merged).await;
    }

    /// Sweep `user_id`'s live entities into a fresh snapshot and commit it
    /// through the cache (§4.D). The empty-overwrite guard is honored
    /// unless `override_empty_guard` is set.
    #[instrument(skip(self))]
    pub async fn update_profile_inventory(&self, user_id: UserId, override_empty_guard: bool) {
        let last_snapshot = self.cache.get_profile(user_id).await.inventory;
        let snapshot = {
            let world = self.world.lock().await;
            GrandSerializer::serialize(&*world, user_id, false, &last_snapshot)
        };
        self.cache.set_inventory(user_id, snapshot, override_empty_guard).await;
    }

    /// End-to-end pre-exit finalization (§4.D, used by `vivarium-presync`):
    /// flush growth, serialize with the final/pre-exit snapshot semantics,
    /// commit with `overrideEmptyGuard=true`, then wait for a verified
    /// save. On success, tags every live entity the user owns with
    /// `RecentlyPlacedSaved=now` (§4.F step 8).
    #[instrument(skip(self))]
    pub async fn finalize_player(&self, user_id: UserId, reason: &str, now: i64) -> Result<FinalizeOutcome, InventoryError> {
        self.growth.flush_player_slimes(user_id).await;

        let last_snapshot = self.cache.get_profile(user_id).await.inventory;
        let snapshot = {
            let world = self.world.lock().await;
            GrandSerializer::serialize(&*world, user_id, true, &last_snapshot)
        };
        self.cache.set_inventory(user_id, snapshot, true).await;

        let outcome = self.cache.save_now_and_wait(user_id, FINALIZE_SAVE_TIMEOUT, true).await;
        tracing::debug!(%user_id, reason, ok = outcome.ok, "finalize_player save completed");

        if outcome.ok {
            let mut world = self.world.lock().await;
            tag_recently_placed_saved(&mut *world, user_id, now);
            Ok(FinalizeOutcome { ok: true, reason: None })
        } else if outcome.done {
            Ok(FinalizeOutcome { ok: false, reason: outcome.reason })
        } else {
            Err(InventoryError::FinalizeSaveFailed { reason: outcome.reason })
        }
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use vivarium_core::{AttrValue, EntityId, SlimeId, ToolUniqueId};
    use vivarium_testkit::{FakeLiveWorld, InMemoryProfileStore};

    fn service() -> InventoryService<InMemoryProfileStore, FakeLiveWorld> {
        let cache = Arc::new(ProfileCache::new(Arc::new(InMemoryProfileStore::new())).with_debounce(Duration::from_millis(1)));
        InventoryService::new(cache, Arc::new(AsyncMutex::new(FakeLiveWorld::new())))
    }

    #[tokio::test]
    async fn ensure_entry_has_id_adds_when_absent() {
        let svc = service();
        let user = UserId::new(1);
        let payload = InventoryEntry::from_pairs([("uid", AttrValue::from(1_u64)), ("fid", AttrValue::from(3_i64))]);
        svc.ensure_entry_has_id(user, InventoryField::FoodTools, payload).await;
        let profile = svc.cache.get_profile(user).await;
        assert_eq!(profile.inventory.food_tools.len(), 1);
    }

    #[tokio::test]
    async fn ensure_entry_has_id_merges_missing_keys_only_when_present() {
        let svc = service();
        let user = UserId::new(1);
        let first = InventoryEntry::from_pairs([("uid", AttrValue::from(1_u64)), ("fid", AttrValue::from(3_i64))]);
        svc.ensure_entry_has_id(user, InventoryField::FoodTools, first).await;

        let second = InventoryEntry::from_pairs([("uid", AttrValue::from(1_u64)), ("fid", AttrValue::from(99_i64)), ("chg", AttrValue::from(5_i64))]);
        svc.ensure_entry_has_id(user, InventoryField::FoodTools, second).await;

        let profile = svc.cache.get_profile(user).await;
        assert_eq!(profile.inventory.food_tools.len(), 1);
        // fid keeps its original value (3), chg is newly filled in.
        assert_eq!(profile.inventory.food_tools[0].get("fid").and_then(AttrValue::as_i64), Some(3));
        assert_eq!(profile.inventory.food_tools[0].get("chg").and_then(AttrValue::as_i64), Some(5));
    }

    #[tokio::test]
    async fn ensure_entry_has_id_is_idempotent() {
        let svc = service();
        let user = UserId::new(1);
        let payload = InventoryEntry::from_pairs([("uid", AttrValue::from(1_u64)), ("fid", AttrValue::from(3_i64))]);
        svc.ensure_entry_has_id(user, InventoryField::FoodTools, payload.clone()).await;
        svc.ensure_entry_has_id(user, InventoryField::FoodTools, payload.clone()).await;
        svc.ensure_entry_has_id(user, InventoryField::FoodTools, payload).await;
        let profile = svc.cache.get_profile(user).await;
        assert_eq!(profile.inventory.food_tools.len(), 1);
    }

    #[tokio::test]
    async fn update_profile_inventory_sweeps_live_world_into_cache() {
        let svc = service();
        let user = UserId::new(1);
        {
            let mut world = svc.world.lock().await;
            let id = EntityId::from(SlimeId::new(1));
            world.spawn(EntityKind::WorldSlime, user, id, "t", Default::default(), None);
        }
        svc.update_profile_inventory(user, false).await;
        let profile = svc.cache.get_profile(user).await;
        assert_eq!(profile.inventory.world_slimes.len(), 1);
    }

    #[tokio::test]
    async fn finalize_player_commits_and_tags_recently_placed_saved() {
        let svc = service();
        let user = UserId::new(1);
        let id = EntityId::from(ToolUniqueId::new(1));
        {
            let mut world = svc.world.lock().await;
            world.spawn(EntityKind::FoodTool, user, id, "t", Default::default(), None);
        }

        let outcome = svc.finalize_player(user, "player_removing", 1_000).await.unwrap();
        assert!(outcome.ok);

        let world = svc.world.lock().await;
        let attrs = world.read_attrs(EntityKind::FoodTool, id).unwrap();
        assert_eq!(attrs.get("RecentlyPlacedSaved").and_then(AttrValue::as_i64), Some(1_000));
    }
}
