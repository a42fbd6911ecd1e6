// SPDX-License-Identifier: Apache-2.0
//! The stateful growth engine (§4.E): wires the pure arithmetic in
//! [`crate::tick`] to a [`LiveWorldPort`] and a [`ProfileCache`], with
//! per-entity offline/stamp bookkeeping and a per-user debounce.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tracing::instrument;
use vivarium_cache::ProfileCache;
use vivarium_core::{AttrValue, EntityId, EntityKind, EventBus, InventoryEntry, InventoryField, LiveAttrs, LiveWorldPort, LocalEvent, UserId};
use vivarium_inventory::GrowthFlusher;
use vivarium_store::ProfileStore;

use crate::config::GrowthConfig;
use crate::tick::{apply_tick, replay_offline, GrowthInputs, GrowthOutputs};

/// Interval the background tick loop (`spawn_loop`) sleeps between sweeps
/// of every registered user.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// A sentinel below any real progress value, so a never-stamped entity
/// always crosses the micro-stamp threshold on its first eligible tick.
const NEVER_STAMPED: f64 = -1.0;

#[derive(Debug, Clone, Copy)]
struct EntityTrack {
    offline_replay_at: i64,
    stamped_progress: f64,
    last_stamp_at: i64,
}

#[derive(Debug, Clone, Copy, Default)]
struct UserTrack {
    last_stamp_at: Option<i64>,
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn read_f64(attrs: &LiveAttrs, key: &str, default: f64) -> f64 {
    attrs.get(key).and_then(AttrValue::as_f64).unwrap_or(default)
}

fn read_i64(attrs: &LiveAttrs, key: &str, default: i64) -> i64 {
    attrs.get(key).and_then(AttrValue::as_i64).unwrap_or(default)
}

fn parse_inputs(attrs: &LiveAttrs, now: i64) -> GrowthInputs {
    GrowthInputs {
        growth_progress: read_f64(attrs, "GrowthProgress", 0.0),
        persisted_growth_progress: read_f64(attrs, "PersistedGrowthProgress", 0.0),
        last_growth_update: read_i64(attrs, "LastGrowthUpdate", now),
        feed_buffer_seconds: read_f64(attrs, "FeedBufferSeconds", 0.0),
        feed_speed_multiplier: read_f64(attrs, "FeedSpeedMultiplier", 1.0),
        hunger_multiplier: read_f64(attrs, "HungerMultiplier", 1.0),
        unfed_growth_duration: read_f64(attrs, "UnfedGrowthDuration", 600.0),
        age: read_f64(attrs, "Age", 0.0),
    }
}

fn apply_outputs(attrs: &mut LiveAttrs, out: &GrowthOutputs) {
    attrs.insert("GrowthProgress".to_string(), AttrValue::from(out.growth_progress));
    attrs.insert("PersistedGrowthProgress".to_string(), AttrValue::from(out.persisted_growth_progress));
    attrs.insert("LastGrowthUpdate".to_string(), AttrValue::from(out.last_growth_update));
    attrs.insert("FeedBufferSeconds".to_string(), AttrValue::from(out.feed_buffer_seconds));
    attrs.insert("Age".to_string(), AttrValue::from(out.age));
    attrs.insert("SizeScale".to_string(), AttrValue::from(out.size_scale));
}

fn stamp_patch(out: &GrowthOutputs) -> InventoryEntry {
    InventoryEntry::from_pairs([
        ("gp", AttrValue::from(out.growth_progress)),
        ("pgp", AttrValue::from(out.persisted_growth_progress)),
        ("lgu", AttrValue::from(out.last_growth_update)),
    ])
}

/// Tick-driven accrual engine for live `WorldSlime` entities (§4.E).
///
/// Composes a [`ProfileCache`] (the stamp target) and a [`LiveWorldPort`]
/// (the tick source), and implements [`GrowthFlusher`] so an
/// `InventoryService` can compose it in for `finalizePlayer`'s growth-flush
/// step without depending on this crate's concrete type.
pub struct GrowthEngine<S, W> {
    cache: Arc<ProfileCache<S>>,
    world: Arc<AsyncMutex<W>>,
    events: Option<Arc<dyn EventBus>>,
    cfg: GrowthConfig,
    entities: AsyncMutex<HashMap<(EntityKind, EntityId), EntityTrack>>,
    users: AsyncMutex<HashMap<UserId, UserTrack>>,
    roster: AsyncMutex<HashSet<UserId>>,
}

impl<S, W> GrowthEngine<S, W>
where
    S: ProfileStore + 'static,
    W: LiveWorldPort,
{
    /// Compose an engine over a cache and a live-world port, with default
    /// tunables and no event bus.
    #[must_use]
    pub fn new(cache: Arc<ProfileCache<S>>, world: Arc<AsyncMutex<W>>) -> Self {
        Self {
            cache,
            world,
            events: None,
            cfg: GrowthConfig::default(),
            entities: AsyncMutex::new(HashMap::new()),
            users: AsyncMutex::new(HashMap::new()),
            roster: AsyncMutex::new(HashSet::new()),
        }
    }

    /// Attach a local event bus so stamps fire `GrowthStampDirty` (§6).
    #[must_use]
    pub fn with_event_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Override the default tunables.
    #[must_use]
    pub fn with_config(mut self, cfg: GrowthConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Add a user to the background tick roster (called on join by the
    /// process wiring, §6).
    pub async fn register_user(&self, user_id: UserId) {
        self.roster.lock().await.insert(user_id);
    }

    /// Remove a user from the background tick roster (called on leave).
    pub async fn unregister_user(&self, user_id: UserId) {
        self.roster.lock().await.remove(&user_id);
    }

    /// Advance growth for every live `WorldSlime` entity `user_id` owns,
    /// at wall-clock `now`, and commit a stamp if any entity or the
    /// periodic/micro-threshold trigger warrants one and the per-user
    /// debounce allows it.
    #[instrument(skip(self))]
    pub async fn tick_user(&self, user_id: UserId, now: i64) {
        let owned = { self.world.lock().await.entities_for_owner(EntityKind::WorldSlime, user_id) };
        let mut due = Vec::new();

        for id in owned {
            if let Some((out, should_stamp)) = self.tick_entity(id, now).await {
                if should_stamp {
                    due.push((id, out));
                }
            }
        }

        if due.is_empty() {
            return;
        }
        if !self.debounce_ok(user_id, now).await {
            return;
        }
        self.commit_stamps(user_id, &due, now, "growth_tick").await;
    }

    async fn tick_entity(&self, id: EntityId, now: i64) -> Option<(GrowthOutputs, bool)> {
        let attrs = self.world.lock().await.read_attrs(EntityKind::WorldSlime, id)?;
        let inputs = parse_inputs(&attrs, now);

        let key = (EntityKind::WorldSlime, id);
        let mut tracks = self.entities.lock().await;
        let existing = tracks.get(&key).copied();

        let (out, offline_replay_at) = match existing {
            Some(track) => {
                let within_window = now.saturating_sub(track.offline_replay_at)
                    <= i64::try_from(self.cfg.second_pass_window.as_secs()).unwrap_or(i64::MAX);
                let floor = within_window.then_some(inputs.persisted_growth_progress);
                let dt = now.saturating_sub(inputs.last_growth_update).max(0) as f64;
                (apply_tick(&inputs, dt, &self.cfg, floor), track.offline_replay_at)
            }
            None => (replay_offline(&inputs, now, &self.cfg), now),
        };

        let stamped_progress = existing.map_or(NEVER_STAMPED, |t| t.stamped_progress);
        let last_stamp_at = existing.map_or(0, |t| t.last_stamp_at);
        let periodic_due = now.saturating_sub(last_stamp_at)
            >= i64::try_from(self.cfg.timestamp_update_interval.as_secs()).unwrap_or(i64::MAX);
        let micro_due = out.persisted_growth_progress - stamped_progress >= self.cfg.micro_stamp_threshold;
        let should_stamp = periodic_due || micro_due;

        tracks.insert(key, EntityTrack { offline_replay_at, stamped_progress, last_stamp_at });
        drop(tracks);

        let mut new_attrs = attrs;
        apply_outputs(&mut new_attrs, &out);
        self.world.lock().await.write_attrs(EntityKind::WorldSlime, id, new_attrs);

        Some((out, should_stamp))
    }

    async fn debounce_ok(&self, user_id: UserId, now: i64) -> bool {
        let users = self.users.lock().await;
        match users.get(&user_id).and_then(|t| t.last_stamp_at) {
            Some(last) => now.saturating_sub(last) >= i64::try_from(self.cfg.stamp_debounce.as_secs()).unwrap_or(i64::MAX),
            None => true,
        }
    }

    async fn commit_stamps(&self, user_id: UserId, due: &[(EntityId, GrowthOutputs)], now: i64, reason: &str) {
        for (id, out) in due {
            self.cache
                .patch_inventory_entry(user_id, InventoryField::WorldSlimes, id.value(), stamp_patch(out))
                .await;

            let mut tracks = self.entities.lock().await;
            if let Some(track) = tracks.get_mut(&(EntityKind::WorldSlime, *id)) {
                track.stamped_progress = out.persisted_growth_progress;
                track.last_stamp_at = now;
            }
        }

        self.users.lock().await.insert(user_id, UserTrack { last_stamp_at: Some(now) });

        if let Some(events) = &self.events {
            events.publish(LocalEvent::GrowthStampDirty { user_id, reason: reason.to_string() });
        }
        tracing::debug!(%user_id, reason, stamped = due.len(), "growth stamp committed");
    }

    /// Force a stamp for every one of `user_id`'s live entities, bypassing
    /// the per-entity periodic/micro-threshold checks but honoring the
    /// per-user debounce (§4.E "External trigger").
    #[instrument(skip(self))]
    pub async fn request_stamp(&self, user_id: UserId, reason: &str, now: i64) -> bool {
        if !self.debounce_ok(user_id, now).await {
            return false;
        }
        self.force_stamp(user_id, reason, now).await;
        true
    }

    /// Stamp every live entity `user_id` owns unconditionally, ignoring the
    /// per-user debounce (§4.E "Pre-leave flush").
    #[instrument(skip(self))]
    pub async fn flush_player_slimes_at(&self, user_id: UserId, now: i64) {
        self.force_stamp(user_id, "pre_leave_flush", now).await;
    }

    async fn force_stamp(&self, user_id: UserId, reason: &str, now: i64) {
        let owned = { self.world.lock().await.entities_for_owner(EntityKind::WorldSlime, user_id) };
        let mut due = Vec::with_capacity(owned.len());
        for id in owned {
            if let Some((out, _)) = self.tick_entity(id, now).await {
                due.push((id, out));
            }
        }
        if !due.is_empty() {
            self.commit_stamps(user_id, &due, now, reason).await;
        }
    }

    /// Run the background tick loop over the registered-user roster until
    /// `shutdown` is notified (§5 "Background loops").
    pub async fn run(self: Arc<Self>, shutdown: Arc<Notify>) {
        loop {
            tokio::select! {
                () = shutdown.notified() => break,
                () = tokio::time::sleep(TICK_INTERVAL) => {}
            }
            let users: Vec<UserId> = self.roster.lock().await.iter().copied().collect();
            let now = now_unix();
            for user_id in users {
                self.tick_user(user_id, now).await;
            }
        }
    }
}

#[async_trait]
impl<S, W> GrowthFlusher for GrowthEngine<S, W>
where
    S: ProfileStore + 'static,
    W: LiveWorldPort,
{
    async fn flush_player_slimes(&self, user_id: UserId) {
        self.flush_player_slimes_at(user_id, now_unix()).await;
    }
}
