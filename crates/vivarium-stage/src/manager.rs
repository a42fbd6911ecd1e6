// SPDX-License-Identifier: Apache-2.0
//! `StageManager`: the Preserve/Stage Manager (§4.I).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::time::Duration;
use tracing::instrument;
use vivarium_core::{AttrValue, EntityId, EntityKind, LiveWorldPort, UserId};

use crate::config::StageConfig;
use crate::reparent::{Container, ReparentError, ReparentPort};

fn now_unix() -> i64 {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    i64::try_from(secs).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, Copy)]
struct StagedEntry {
    owner: UserId,
    staged_at: i64,
}

fn tag_preserve(attrs: &mut vivarium_core::LiveAttrs, now: i64) {
    attrs.insert("PreserveOnServer".to_string(), AttrValue::Bool(true));
    attrs.insert("ServerRestore".to_string(), AttrValue::Bool(true));
    attrs.insert("RestoreStamp".to_string(), AttrValue::Int(now));
}

fn clear_preserve(attrs: &mut vivarium_core::LiveAttrs) {
    attrs.insert("PreserveOnServer".to_string(), AttrValue::Bool(false));
    attrs.insert("ServerRestore".to_string(), AttrValue::Bool(false));
}

/// Protects a restored tool during the hand-off from the restore path to
/// the player's backpack, per §4.I: stage in server-owned holding, tag
/// preserve flags, reparent to the backpack after `stageTime`, clear the
/// flags after `finalDelay + graceSeconds`. A background sweeper destroys
/// any tool left in holding past `abandonedCleanupSecs`.
pub struct StageManager<W> {
    world: Arc<AsyncMutex<W>>,
    reparenter: Arc<dyn ReparentPort>,
    cfg: StageConfig,
    staged: AsyncMutex<HashMap<(EntityKind, EntityId), StagedEntry>>,
}

impl<W: LiveWorldPort> StageManager<W> {
    /// Compose over a live-world port and a reparent collaborator.
    #[must_use]
    pub fn new(world: Arc<AsyncMutex<W>>, reparenter: Arc<dyn ReparentPort>) -> Self {
        Self {
            world,
            reparenter,
            cfg: StageConfig::default(),
            staged: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Override the default tunables.
    #[must_use]
    pub fn with_config(mut self, cfg: StageConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Number of tools currently sitting in server-owned holding.
    pub async fn staged_count(&self) -> usize {
        self.staged.lock().await.len()
    }

    /// Run the full hand-off for a newly restored tool: tag preserve
    /// flags, stage in server-owned holding, reparent into `owner`'s
    /// backpack after `stageTime`, then clear the flags after
    /// `finalDelay + graceSeconds`. Returns the tool's id in its final
    /// container (unchanged unless the clone fallback kicked in).
    #[instrument(skip(self))]
    pub async fn settle(&self, kind: EntityKind, id: EntityId, owner: UserId) -> EntityId {
        let now = now_unix();
        self.retag(kind, id, now).await;

        let staged_id = self.reparent_or_clone(kind, id, owner, Container::ServerHolding).await;
        self.staged.lock().await.insert((kind, staged_id), StagedEntry { owner, staged_at: now });

        tokio::time::sleep(self.cfg.stage_time).await;

        let final_id = self.reparent_or_clone(kind, staged_id, owner, Container::Backpack(owner)).await;
        self.staged.lock().await.remove(&(kind, staged_id));

        tokio::time::sleep(self.cfg.final_delay + self.cfg.grace_seconds).await;
        self.untag(kind, final_id).await;

        final_id
    }

    async fn retag(&self, kind: EntityKind, id: EntityId, now: i64) {
        let mut world = self.world.lock().await;
        if let Some(mut attrs) = world.read_attrs(kind, id) {
            tag_preserve(&mut attrs, now);
            world.write_attrs(kind, id, attrs);
        }
    }

    async fn untag(&self, kind: EntityKind, id: EntityId) {
        let mut world = self.world.lock().await;
        if let Some(mut attrs) = world.read_attrs(kind, id) {
            clear_preserve(&mut attrs);
            world.write_attrs(kind, id, attrs);
        }
    }

    /// Reparent with backoff; on repeated failure, clone the tool
    /// (preserving its durable id and attributes), parent the clone,
    /// destroy the original (§4.I, scenario S6).
    async fn reparent_or_clone(&self, kind: EntityKind, id: EntityId, owner: UserId, target: Container) -> EntityId {
        let mut attempt = 0;
        loop {
            match self.reparenter.reparent(kind, id, target).await {
                Ok(()) => return id,
                Err(ReparentError::Transient(reason)) if attempt + 1 < self.cfg.max_reparent_attempts => {
                    tracing::warn!(?kind, %id, attempt, reason, "transient reparent failure, retrying");
                    tokio::time::sleep(self.cfg.retry_delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::warn!(?kind, %id, ?err, "reparent failed repeatedly, cloning tool");
                    return self.clone_in_place(kind, id, owner).await;
                }
            }
        }
    }

    /// Destroy the live entity and respawn it under the same durable id
    /// and attributes, owned by `owner`. The profile's persisted entry
    /// still matches this id afterward (scenario S6).
    async fn clone_in_place(&self, kind: EntityKind, id: EntityId, owner: UserId) -> EntityId {
        let mut world = self.world.lock().await;
        let attrs = world.read_attrs(kind, id).unwrap_or_default();
        let pose = world.read_pose(kind, id);
        world.destroy(kind, id);
        world.spawn(kind, owner, id, "stage_clone", attrs, pose)
    }

    /// Destroy any tool that has sat in server-owned holding longer than
    /// `abandonedCleanupSecs`.
    pub async fn sweep_abandoned(&self, now: i64) {
        let expired: Vec<(EntityKind, EntityId)> = {
            let staged = self.staged.lock().await;
            let cutoff = i64::try_from(self.cfg.abandoned_cleanup.as_secs()).unwrap_or(i64::MAX);
            staged.iter().filter(|(_, e)| now - e.staged_at > cutoff).map(|(k, _)| *k).collect()
        };
        if expired.is_empty() {
            return;
        }
        {
            let mut staged = self.staged.lock().await;
            for key in &expired {
                staged.remove(key);
            }
        }
        let mut world = self.world.lock().await;
        for (kind, id) in expired {
            world.destroy(kind, id);
        }
    }

    /// Run the periodic abandoned-stage sweeper until `shutdown` fires.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, shutdown: Arc<Notify>) {
        loop {
            tokio::select! {
                () = shutdown.notified() => return,
                () = tokio::time::sleep(interval) => {
                    self.sweep_abandoned(now_unix()).await;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use vivarium_core::SlimeId;
    use vivarium_testkit::FakeLiveWorld;

    /// A reparent collaborator whose first `fail_count` calls return a
    /// transient error; everything after that succeeds.
    struct FlakyReparent {
        fail_count: u32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl ReparentPort for FlakyReparent {
        async fn reparent(&self, _kind: EntityKind, _id: EntityId, _target: Container) -> Result<(), ReparentError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_count {
                Err(ReparentError::Transient("parent locked".into()))
            } else {
                Ok(())
            }
        }
    }

    /// A reparent collaborator that always fails, forcing the clone path.
    struct AlwaysFailReparent;

    #[async_trait]
    impl ReparentPort for AlwaysFailReparent {
        async fn reparent(&self, _kind: EntityKind, _id: EntityId, _target: Container) -> Result<(), ReparentError> {
            Err(ReparentError::Permanent("instance locked forever".into()))
        }
    }

    fn fast_config() -> StageConfig {
        StageConfig {
            stage_time: Duration::from_millis(1),
            final_delay: Duration::from_millis(1),
            grace_seconds: Duration::from_millis(1),
            max_reparent_attempts: 3,
            retry_base_delay: Duration::from_millis(1),
            retry_max_delay: Duration::from_millis(5),
            abandoned_cleanup: Duration::from_secs(300),
        }
    }

    #[tokio::test]
    async fn settle_tags_and_clears_preserve_flags() {
        let owner = UserId::new(1);
        let id = EntityId::from(SlimeId::new(1));
        let world = Arc::new(AsyncMutex::new(FakeLiveWorld::new()));
        {
            let mut w = world.lock().await;
            w.spawn(EntityKind::CapturedSlime, owner, id, "t", vivarium_core::LiveAttrs::new(), None);
        }

        let manager = StageManager::new(world.clone(), Arc::new(FlakyReparent { fail_count: 0, attempts: AtomicU32::new(0) }))
            .with_config(fast_config());

        let final_id = manager.settle(EntityKind::CapturedSlime, id, owner).await;
        assert_eq!(final_id, id);

        let attrs = world.lock().await.read_attrs(EntityKind::CapturedSlime, id).unwrap();
        assert_eq!(attrs.get("PreserveOnServer"), Some(&AttrValue::Bool(false)));
        assert_eq!(attrs.get("ServerRestore"), Some(&AttrValue::Bool(false)));
        assert!(attrs.contains_key("RestoreStamp"));
        assert_eq!(manager.staged_count().await, 0);
    }

    #[tokio::test]
    async fn settle_retries_transient_failures_before_succeeding() {
        let owner = UserId::new(2);
        let id = EntityId::from(SlimeId::new(2));
        let world = Arc::new(AsyncMutex::new(FakeLiveWorld::new()));
        {
            let mut w = world.lock().await;
            w.spawn(EntityKind::CapturedSlime, owner, id, "t", vivarium_core::LiveAttrs::new(), None);
        }
        let manager = StageManager::new(world.clone(), Arc::new(FlakyReparent { fail_count: 1, attempts: AtomicU32::new(0) }))
            .with_config(fast_config());

        let final_id = manager.settle(EntityKind::CapturedSlime, id, owner).await;
        assert_eq!(final_id, id);
        assert!(world.lock().await.contains(EntityKind::CapturedSlime, id));
    }

    #[tokio::test]
    async fn settle_clones_in_place_after_repeated_reparent_failures() {
        let owner = UserId::new(3);
        let id = EntityId::from(SlimeId::new(3));
        let world = Arc::new(AsyncMutex::new(FakeLiveWorld::new()));
        {
            let mut w = world.lock().await;
            let mut attrs = vivarium_core::LiveAttrs::new();
            attrs.insert("ToolUniqueId".to_string(), AttrValue::Int(3));
            w.spawn(EntityKind::CapturedSlime, owner, id, "t", attrs, None);
        }
        let manager = StageManager::new(world.clone(), Arc::new(AlwaysFailReparent)).with_config(fast_config());

        let final_id = manager.settle(EntityKind::CapturedSlime, id, owner).await;
        // The durable id is unchanged even though the live instance was
        // destroyed and respawned underneath (scenario S6).
        assert_eq!(final_id, id);
        let attrs = world.lock().await.read_attrs(EntityKind::CapturedSlime, id).unwrap();
        assert_eq!(attrs.get("ToolUniqueId"), Some(&AttrValue::Int(3)));
    }

    #[tokio::test]
    async fn sweep_abandoned_destroys_tools_left_in_holding_too_long() {
        let owner = UserId::new(4);
        let id = EntityId::from(SlimeId::new(4));
        let world = Arc::new(AsyncMutex::new(FakeLiveWorld::new()));
        {
            let mut w = world.lock().await;
            w.spawn(EntityKind::CapturedSlime, owner, id, "t", vivarium_core::LiveAttrs::new(), None);
        }
        let manager = StageManager::new(world.clone(), Arc::new(AlwaysFailReparent))
            .with_config(StageConfig { abandoned_cleanup: Duration::from_secs(10), ..fast_config() });

        manager.staged.lock().await.insert((EntityKind::CapturedSlime, id), StagedEntry { owner, staged_at: 0 });
        manager.sweep_abandoned(100).await;

        assert!(!world.lock().await.contains(EntityKind::CapturedSlime, id));
        assert_eq!(manager.staged_count().await, 0);
    }
}
