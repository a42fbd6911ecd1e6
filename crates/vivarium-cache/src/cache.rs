// SPDX-License-Identifier: Apache-2.0
//! The profile cache and coalescing saver (§4.B).

use crate::slot::{SaveOutcome, SpendDenied, UserSlot};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout as tokio_timeout;
use tracing::{instrument, warn};
use vivarium_core::{EventBus, InventoryEntry, InventoryField, LocalEvent, Profile, UserId};
use vivarium_store::{ProfileStore, RetryPolicy};

/// Default debounce window between `markDirty` and the coalesced save it
/// schedules.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Global deadline the saver waits, at shutdown, for every user's save
/// queue to drain before forcing a final write per user (§4.B "Shutdown").
pub const SHUTDOWN_DRAIN_DEADLINE: Duration = Duration::from_secs(10);

/// Central hot state: one profile slot and save queue per online user.
pub struct ProfileCache<S> {
    slots: RwLock<HashMap<UserId, Arc<Mutex<UserSlot>>>>,
    store: Arc<S>,
    events: Option<Arc<dyn EventBus>>,
    debounce: Duration,
}

impl<S: ProfileStore + 'static> ProfileCache<S> {
    /// Build a cache over `store`, with the default debounce and no event
    /// bus (degrades gracefully per §9 "Optional-module probing").
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            store,
            events: None,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Attach a local event bus (e.g. to fire `GrowthStampDirty` reactions
    /// elsewhere in the system).
    #[must_use]
    pub fn with_event_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Override the debounce window (tests use a short one).
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    async fn slot_for(&self, user_id: UserId) -> Arc<Mutex<UserSlot>> {
        if let Some(slot) = self.slots.read().await.get(&user_id) {
            return slot.clone();
        }
        let mut w = self.slots.write().await;
        if let Some(slot) = w.get(&user_id) {
            return slot.clone();
        }
        let seed = Profile::seeded(user_id, &[]);
        let slot = Arc::new(Mutex::new(UserSlot::new(seed)));
        w.insert(user_id, slot.clone());
        slot
    }

    /// Returns the cached profile, loading it from the store on first
    /// access. A concurrent load for the same user blocks on the slot's
    /// lock rather than racing a second load.
    #[instrument(skip(self))]
    pub async fn get_profile(&self, user_id: UserId) -> Profile {
        let slot = self.slot_for(user_id).await;
        let mut guard = slot.lock().await;
        if !guard.loaded {
            if let Ok(Some(loaded)) = self.store.load_optional(user_id).await {
                guard.profile = loaded.clone();
                guard.prior_remote = Some(loaded);
            }
            guard.loaded = true;
        }
        guard.profile.clone()
    }

    /// Mark the slot dirty and schedule a coalesced save after the
    /// debounce window.
    #[instrument(skip(self))]
    pub async fn mark_dirty(&self, user_id: UserId, reason: &str) {
        let slot = self.slot_for(user_id).await;
        self.enqueue_save(user_id, slot, true, false).await;
        tracing::debug!(%user_id, reason, "profile marked dirty");
    }

    /// Enqueue a non-blocking, non-debounced save.
    #[instrument(skip(self))]
    pub async fn save_now(&self, user_id: UserId, reason: &str) {
        let slot = self.slot_for(user_id).await;
        self.enqueue_save(user_id, slot, false, false).await;
        tracing::debug!(%user_id, reason, "save requested");
    }

    /// Enqueue a save and block until it completes or `timeout` elapses.
    /// With `verified`, a real remote write is always performed (a clean
    /// slot does not short-circuit to a coalesced skip).
    #[instrument(skip(self))]
    pub async fn save_now_and_wait(
        &self,
        user_id: UserId,
        timeout: Duration,
        verified: bool,
    ) -> SaveOutcome {
        let slot = self.slot_for(user_id).await;

        if !verified {
            let guard = slot.lock().await;
            if !guard.dirty && !guard.saving {
                return SaveOutcome::skipped();
            }
        }

        let notify = slot.lock().await.notify.clone();
        let target_generation = self.enqueue_save(user_id, slot.clone(), false, verified).await;

        let wait = async {
            loop {
                let done = {
                    let guard = slot.lock().await;
                    if guard.completed_generation >= target_generation {
                        Some(SaveOutcome {
                            done: true,
                            ok: guard.last_save_ok,
                            reason: guard.last_save_reason.clone(),
                        })
                    } else {
                        None
                    }
                };
                if let Some(outcome) = done {
                    return outcome;
                }
                notify.notified().await;
            }
        };

        match tokio_timeout(timeout, wait).await {
            Ok(outcome) => outcome,
            Err(_) => SaveOutcome::timed_out(),
        }
    }

    /// Block until the user's save queue is empty (no dirty state, no save
    /// in flight) or `timeout` elapses.
    pub async fn await_save_queue(&self, user_id: UserId, timeout: Duration) -> bool {
        let slot = self.slot_for(user_id).await;
        let wait = async {
            loop {
                let (quiet, notify) = {
                    let guard = slot.lock().await;
                    (!guard.dirty && !guard.saving, guard.notify.clone())
                };
                if quiet {
                    return true;
                }
                notify.notified().await;
            }
        };
        tokio_timeout(timeout, wait).await.unwrap_or(false)
    }

    /// Append `entry` to `field`, deduplicating by id; marks the slot
    /// dirty.
    pub async fn add_inventory_item(&self, user_id: UserId, field: InventoryField, entry: InventoryEntry) {
        let slot = self.slot_for(user_id).await;
        {
            let mut guard = slot.lock().await;
            let incoming_id = entry.resolve_id(field.id_key_candidates());
            let entries = guard.profile.inventory.field_mut(field);
            if let Some(incoming_id) = incoming_id {
                entries.retain(|e| e.resolve_id(field.id_key_candidates()) != Some(incoming_id));
            }
            entries.push(entry);
        }
        self.enqueue_save(user_id, slot, true, false).await;
    }

    /// Remove every entry in `field` whose `key_name` attribute equals
    /// `key_value`; marks the slot dirty.
    pub async fn remove_inventory_item(
        &self,
        user_id: UserId,
        field: InventoryField,
        key_name: &str,
        key_value: u64,
    ) {
        let slot = self.slot_for(user_id).await;
        {
            let mut guard = slot.lock().await;
            let entries = guard.profile.inventory.field_mut(field);
            entries.retain(|e| e.get(key_name).and_then(vivarium_core::AttrValue::as_u64) != Some(key_value));
        }
        self.enqueue_save(user_id, slot, true, false).await;
    }

    /// Atomic coin delta under the slot lock; clamps at zero on underflow.
    pub async fn increment_coins(&self, user_id: UserId, delta: i64) -> u64 {
        let slot = self.slot_for(user_id).await;
        let new_balance = {
            let mut guard = slot.lock().await;
            let current = i128::from(guard.profile.core.coins);
            let next = (current + i128::from(delta)).max(0);
            let next = u64::try_from(next).unwrap_or(u64::MAX);
            guard.profile.core.coins = next;
            if delta < 0 {
                guard.coin_spent_since_load = true;
            }
            next
        };
        self.enqueue_save(user_id, slot, true, false).await;
        new_balance
    }

    /// Atomic check-and-debit with no partial effect on failure.
    pub async fn try_spend_coins(&self, user_id: UserId, amount: u64) -> Result<u64, SpendDenied> {
        let slot = self.slot_for(user_id).await;
        let result = {
            let mut guard = slot.lock().await;
            let have = guard.profile.core.coins;
            if have < amount {
                return Err(SpendDenied::InsufficientCoins { have, need: amount });
            }
            guard.profile.core.coins = have - amount;
            guard.coin_spent_since_load = true;
            guard.profile.core.coins
        };
        self.enqueue_save(user_id, slot, true, false).await;
        Ok(result)
    }

    /// Atomic faction-standing set, clamped into `[0, 1]` (§4.H step 8
    /// "update standing; save"). Returns the clamped value actually
    /// stored.
    pub async fn set_standing(&self, user_id: UserId, faction: &str, value: f64) -> f64 {
        let slot = self.slot_for(user_id).await;
        let clamped = {
            let mut guard = slot.lock().await;
            guard.profile.stats.set_standing(faction, value);
            guard.profile.stats.standing_for(faction)
        };
        self.enqueue_save(user_id, slot, true, false).await;
        clamped
    }

    /// Absolute coin set, clamped to `>= 0` (u64 is already non-negative;
    /// this simply assigns).
    pub async fn set_coins(&self, user_id: UserId, amount: u64) {
        let slot = self.slot_for(user_id).await;
        {
            let mut guard = slot.lock().await;
            guard.profile.core.coins = amount;
        }
        self.enqueue_save(user_id, slot, true, false).await;
    }

    /// Merge `patch`'s keys into the entry in `field` identified by `id`
    /// (resolved via the field's id-key candidates), overwriting only the
    /// keys `patch` carries and leaving the rest of the entry untouched. If
    /// no entry with `id` exists yet, `patch` is inserted as a new entry
    /// (it must therefore carry its own id key). Marks the slot dirty.
    ///
    /// This is the persisted-side half of a growth stamp (§4.E): the growth
    /// engine writes the live attribute bag directly via `LiveWorldPort`,
    /// then calls this to fold the same fields into the cached snapshot
    /// without clobbering the entry's other projected fields.
    #[instrument(skip(self, patch))]
    pub async fn patch_inventory_entry(&self, user_id: UserId, field: InventoryField, id: u64, patch: InventoryEntry) {
        let slot = self.slot_for(user_id).await;
        {
            let mut guard = slot.lock().await;
            let entries = guard.profile.inventory.field_mut(field);
            match entries.iter_mut().find(|e| e.resolve_id(field.id_key_candidates()) == Some(id)) {
                Some(existing) => {
                    for (key, value) in patch.iter() {
                        existing.set(key, value.clone());
                    }
                }
                None => entries.push(patch),
            }
        }
        self.enqueue_save(user_id, slot, true, false).await;
    }

    /// Replace all five inventory fields wholesale (the commit primitive
    /// behind `InventoryService::updateProfileInventory`, §4.D). When
    /// `override_empty_guard` is set, the next save skips the
    /// empty-overwrite guard for every field in this snapshot — used by
    /// `finalizePlayer` (§4.D), which has already reconciled live state
    /// into the outgoing inventory itself.
    pub async fn set_inventory(&self, user_id: UserId, inventory: vivarium_core::Inventory, override_empty_guard: bool) {
        let slot = self.slot_for(user_id).await;
        {
            let mut guard = slot.lock().await;
            guard.profile.inventory = inventory;
            if override_empty_guard {
                guard.override_empty_guard_pending = true;
            }
        }
        self.enqueue_save(user_id, slot, true, false).await;
    }

    /// Flush every known user's save queue, then force one final write per
    /// user with a longer retry budget (§4.B "Shutdown").
    pub async fn shutdown(&self) {
        let users: Vec<UserId> = self.slots.read().await.keys().copied().collect();
        for user_id in &users {
            self.await_save_queue(*user_id, SHUTDOWN_DRAIN_DEADLINE).await;
        }
        for user_id in users {
            let slot = self.slot_for(user_id).await;
            let snapshot = {
                let guard = slot.lock().await;
                guard.profile.clone()
            };
            let prior = {
                let guard = slot.lock().await;
                guard.prior_remote.clone()
            };
            let result = self
                .store
                .update(user_id, &RetryPolicy::shutdown_final_write(), &move |remote| {
                    Ok(merge_for_commit(snapshot.clone(), remote.or_else(|| prior.clone()), false, true))
                })
                .await;
            if let Err(err) = result {
                warn!(%user_id, %err, "final shutdown write failed");
            }
        }
    }

    async fn enqueue_save(
        &self,
        user_id: UserId,
        slot: Arc<Mutex<UserSlot>>,
        debounced: bool,
        verified: bool,
    ) -> u64 {
        let (should_spawn, generation) = {
            let mut guard = slot.lock().await;
            guard.dirty = true;
            guard.generation += 1;
            if verified {
                guard.force_verified_pending = true;
            }
            if guard.saving {
                (false, guard.generation)
            } else {
                guard.saving = true;
                (true, guard.generation)
            }
        };
        if !should_spawn {
            return generation;
        }

        let store = self.store.clone();
        let events = self.events.clone();
        let debounce = self.debounce;
        tokio::spawn(async move {
            if debounced {
                tokio::time::sleep(debounce).await;
            }
            loop {
                let (snapshot, prior, gen, coin_spent, force_verified, override_guard) = {
                    let guard = slot.lock().await;
                    (
                        guard.profile.clone(),
                        guard.prior_remote.clone(),
                        guard.generation,
                        guard.coin_spent_since_load,
                        guard.force_verified_pending,
                        guard.override_empty_guard_pending,
                    )
                };

                let result = store
                    .update(user_id, &RetryPolicy::profile_save_default(), &move |remote: Option<Profile>| {
                        let base = remote.or_else(|| prior.clone());
                        let mut merged = merge_for_commit(snapshot.clone(), base, override_guard, !coin_spent);
                        merged.bump_data_version();
                        Ok(merged)
                    })
                    .await;

                let mut guard = slot.lock().await;
                match result {
                    Ok(new_remote) => {
                        guard.prior_remote = Some(new_remote);
                        guard.coin_spent_since_load = false;
                        guard.completed_generation = gen;
                        guard.last_save_ok = true;
                        guard.last_save_reason = None;
                        if force_verified {
                            guard.force_verified_pending = false;
                        }
                        if override_guard {
                            guard.override_empty_guard_pending = false;
                        }
                        if let Some(bus) = &events {
                            bus.publish(LocalEvent::PersistInventoryRestored { user_id });
                        }
                    }
                    Err(err) => {
                        guard.completed_generation = gen;
                        guard.last_save_ok = false;
                        guard.last_save_reason = Some(err.to_string());
                        warn!(%user_id, %err, "profile save failed, leaving slot dirty for retry");
                    }
                }
                guard.notify.notify_waiters();

                if guard.generation == gen {
                    guard.dirty = false;
                    guard.saving = false;
                    break;
                }
            }
        });

        generation
    }
}

/// Apply the §4.B merge rules (empty-overwrite guard, coin-zero
/// protection) to `outgoing`, given the best-known prior remote value.
fn merge_for_commit(
    outgoing: Profile,
    prior: Option<Profile>,
    override_empty_guard: bool,
    no_spend_recorded_since_load: bool,
) -> Profile {
    let mut merged = outgoing;
    let Some(prior) = prior else {
        return merged;
    };

    for field in InventoryField::ALL {
        let incoming_empty = merged.inventory.field(field).is_empty();
        let remote_non_empty = !prior.inventory.field(field).is_empty();
        if incoming_empty && remote_non_empty && !override_empty_guard {
            warn!(field = %field, "empty-overwrite guard: restoring prior field contents");
            merged.inventory.set_field(field, prior.inventory.field(field).clone());
        }
    }

    if merged.core.coins == 0 && prior.core.coins > 0 && no_spend_recorded_since_load {
        warn!("coin-zero protection: restoring prior coin balance");
        merged.core.coins = prior.core.coins;
    }

    merged
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use vivarium_core::AttrValue;
    use vivarium_testkit::InMemoryProfileStore;

    fn cache() -> ProfileCache<InMemoryProfileStore> {
        ProfileCache::new(Arc::new(InMemoryProfileStore::new()))
            .with_debounce(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn get_profile_seeds_default_on_first_access() {
        let cache = cache();
        let profile = cache.get_profile(UserId::new(1)).await;
        assert_eq!(profile.core.coins, 0);
    }

    #[tokio::test]
    async fn add_inventory_item_dedupes_by_id() {
        let cache = cache();
        let user = UserId::new(1);
        let entry = InventoryEntry::from_pairs([("uid", AttrValue::from(7_u64))]);
        cache.add_inventory_item(user, InventoryField::FoodTools, entry.clone()).await;
        cache.add_inventory_item(user, InventoryField::FoodTools, entry).await;
        let profile = cache.get_profile(user).await;
        assert_eq!(profile.inventory.food_tools.len(), 1);
    }

    #[tokio::test]
    async fn remove_inventory_item_filters_by_key() {
        let cache = cache();
        let user = UserId::new(1);
        let entry = InventoryEntry::from_pairs([("uid", AttrValue::from(7_u64))]);
        cache.add_inventory_item(user, InventoryField::FoodTools, entry).await;
        cache.remove_inventory_item(user, InventoryField::FoodTools, "uid", 7).await;
        let profile = cache.get_profile(user).await;
        assert!(profile.inventory.food_tools.is_empty());
    }

    #[tokio::test]
    async fn patch_inventory_entry_merges_without_clobbering_other_keys() {
        let cache = cache();
        let user = UserId::new(1);
        let entry = InventoryEntry::from_pairs([("id", AttrValue::from(7_u64)), ("tpl", AttrValue::from("DefaultSlimeTemplate"))]);
        cache.add_inventory_item(user, InventoryField::WorldSlimes, entry).await;

        let patch = InventoryEntry::from_pairs([("pgp", AttrValue::from(0.5)), ("lgu", AttrValue::from(1_000_i64))]);
        cache.patch_inventory_entry(user, InventoryField::WorldSlimes, 7, patch).await;

        let profile = cache.get_profile(user).await;
        assert_eq!(profile.inventory.world_slimes.len(), 1);
        let stored = &profile.inventory.world_slimes[0];
        assert_eq!(stored.get("tpl").and_then(AttrValue::as_str), Some("DefaultSlimeTemplate"));
        assert_eq!(stored.get("pgp").and_then(AttrValue::as_f64), Some(0.5));
        assert_eq!(stored.get("lgu").and_then(AttrValue::as_i64), Some(1_000));
    }

    #[tokio::test]
    async fn patch_inventory_entry_inserts_when_absent() {
        let cache = cache();
        let user = UserId::new(1);
        let patch = InventoryEntry::from_pairs([("id", AttrValue::from(9_u64)), ("pgp", AttrValue::from(0.1))]);
        cache.patch_inventory_entry(user, InventoryField::WorldSlimes, 9, patch).await;
        let profile = cache.get_profile(user).await;
        assert_eq!(profile.inventory.world_slimes.len(), 1);
    }

    #[tokio::test]
    async fn increment_coins_clamps_at_zero_on_underflow() {
        let cache = cache();
        let user = UserId::new(1);
        cache.increment_coins(user, 10).await;
        let balance = cache.increment_coins(user, -50).await;
        assert_eq!(balance, 0);
    }

    #[tokio::test]
    async fn try_spend_coins_denies_without_partial_effect() {
        let cache = cache();
        let user = UserId::new(1);
        cache.set_coins(user, 5).await;
        let result = cache.try_spend_coins(user, 10).await;
        assert_eq!(result, Err(SpendDenied::InsufficientCoins { have: 5, need: 10 }));
        assert_eq!(cache.get_profile(user).await.core.coins, 5);
    }

    #[tokio::test]
    async fn try_spend_coins_debits_on_success() {
        let cache = cache();
        let user = UserId::new(1);
        cache.set_coins(user, 100).await;
        let result = cache.try_spend_coins(user, 40).await;
        assert_eq!(result, Ok(60));
    }

    #[tokio::test]
    async fn set_standing_clamps_into_unit_interval() {
        let cache = cache();
        let user = UserId::new(1);
        let clamped = cache.set_standing(user, "slime_kin", 1.4).await;
        assert_eq!(clamped, 1.0);
        assert_eq!(cache.get_profile(user).await.stats.standing_for("slime_kin"), 1.0);
    }

    #[tokio::test]
    async fn mark_dirty_eventually_persists_through_save_queue() {
        let cache = cache();
        let user = UserId::new(1);
        cache.set_coins(user, 42).await;
        let drained = cache.await_save_queue(user, Duration::from_secs(1)).await;
        assert!(drained);
    }

    #[tokio::test]
    async fn save_now_and_wait_skips_remote_write_when_clean() {
        let cache = cache();
        let user = UserId::new(1);
        cache.await_save_queue(user, Duration::from_secs(1)).await;
        let outcome = cache.save_now_and_wait(user, Duration::from_secs(1), false).await;
        assert_eq!(outcome, SaveOutcome { done: true, ok: true, reason: None });
    }

    #[tokio::test]
    async fn save_now_and_wait_verified_forces_a_real_write() {
        let cache = cache();
        let user = UserId::new(1);
        let outcome = cache.save_now_and_wait(user, Duration::from_secs(1), true).await;
        assert!(outcome.done);
        assert!(outcome.ok);
    }

    #[test]
    fn empty_overwrite_guard_restores_prior_field_contents() {
        let user = UserId::new(1);
        let mut prior = Profile::seeded(user, &[]);
        prior.inventory.food_tools = vec![InventoryEntry::from_pairs([("uid", AttrValue::from(1_u64))])];
        let outgoing = Profile::seeded(user, &[]);
        let merged = merge_for_commit(outgoing, Some(prior.clone()), false, true);
        assert_eq!(merged.inventory.food_tools, prior.inventory.food_tools);
    }

    #[test]
    fn empty_overwrite_guard_can_be_overridden() {
        let user = UserId::new(1);
        let mut prior = Profile::seeded(user, &[]);
        prior.inventory.food_tools = vec![InventoryEntry::from_pairs([("uid", AttrValue::from(1_u64))])];
        let outgoing = Profile::seeded(user, &[]);
        let merged = merge_for_commit(outgoing, Some(prior), true, true);
        assert!(merged.inventory.food_tools.is_empty());
    }

    #[test]
    fn coin_zero_protection_restores_prior_balance() {
        let user = UserId::new(1);
        let mut prior = Profile::seeded(user, &[]);
        prior.core.coins = 7;
        let outgoing = Profile::seeded(user, &[]);
        let merged = merge_for_commit(outgoing, Some(prior), false, true);
        assert_eq!(merged.core.coins, 7);
    }

    #[tokio::test]
    async fn set_inventory_with_override_guard_replaces_even_when_empty() {
        let cache = cache();
        let user = UserId::new(1);
        let entry = InventoryEntry::from_pairs([("uid", AttrValue::from(1_u64))]);
        cache.add_inventory_item(user, InventoryField::FoodTools, entry).await;
        cache.await_save_queue(user, Duration::from_secs(1)).await;

        let empty = vivarium_core::Inventory::default();
        cache.set_inventory(user, empty, true).await;
        cache.await_save_queue(user, Duration::from_secs(1)).await;
        assert!(cache.get_profile(user).await.inventory.food_tools.is_empty());
    }

    #[tokio::test]
    async fn set_inventory_without_override_guard_restores_prior_non_empty_field() {
        let cache = cache();
        let user = UserId::new(1);
        let entry = InventoryEntry::from_pairs([("uid", AttrValue::from(1_u64))]);
        cache.add_inventory_item(user, InventoryField::FoodTools, entry).await;
        cache.await_save_queue(user, Duration::from_secs(1)).await;

        let empty = vivarium_core::Inventory::default();
        cache.set_inventory(user, empty, false).await;
        cache.await_save_queue(user, Duration::from_secs(1)).await;
        assert_eq!(cache.get_profile(user).await.inventory.food_tools.len(), 1);
    }

    #[test]
    fn coin_zero_protection_does_not_apply_when_spend_was_recorded() {
        let user = UserId::new(1);
        let mut prior = Profile::seeded(user, &[]);
        prior.core.coins = 7;
        let outgoing = Profile::seeded(user, &[]);
        let merged = merge_for_commit(outgoing, Some(prior), false, false);
        assert_eq!(merged.core.coins, 0);
    }
}
