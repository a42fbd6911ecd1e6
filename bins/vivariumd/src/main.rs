// SPDX-License-Identifier: Apache-2.0
//! Vivarium Daemon (vivariumd)
//!
//! Process wiring for the `vivarium-*` crate family: the §6 init sequence,
//! background loops, and a small operator HTTP surface.

mod api;
mod events;
mod reparent;
mod summary;

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vivarium_cache::ProfileCache;
use vivarium_config::{ConfigService, FsConfigStore};
use vivarium_core::{EventBus, LocalEvent, UserId};
use vivarium_factions::FactionTotals;
use vivarium_growth::GrowthEngine;
use vivarium_presync::PreExitSync;
use vivarium_sale::SalePipeline;
use vivarium_serialize::{EggRestorePolicy, GrandSerializer};
use vivarium_stage::StageManager;
use vivarium_store::RemoteProfileStore;
use vivarium_testkit::{FakeLiveWorld, InMemoryKv};

use crate::events::LoggingEventBus;
use crate::reparent::NoopReparent;

type Kv = InMemoryKv;
type Store = RemoteProfileStore<Kv>;
type World = FakeLiveWorld;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Port the operator HTTP surface listens on.
    #[clap(long, default_value_t = 8089)]
    api_port: u16,

    /// Override the bootstrapped periodic-summary interval.
    #[clap(long)]
    summary_interval_secs: Option<u64>,
}

/// Bootstrap preferences, loaded once and persisted if absent — modeled on
/// `echo-session-service`'s `HostPrefs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServicePrefs {
    summary_interval_secs: u64,
}

impl Default for ServicePrefs {
    fn default() -> Self {
        Self { summary_interval_secs: 120 }
    }
}

/// Shared daemon state, composed once at startup (§6 init sequence).
pub struct AppState {
    cache: Arc<ProfileCache<Store>>,
    world: Arc<AsyncMutex<World>>,
    growth: Arc<GrowthEngine<Store, World>>,
    presync: Arc<PreExitSync<Store, World>>,
    sale: Arc<SalePipeline<Store, World>>,
    stage: Arc<StageManager<World>>,
    factions: Arc<FactionTotals<Kv>>,
    events: Arc<dyn EventBus>,
    roster: AsyncMutex<HashSet<UserId>>,
}

impl AppState {
    /// Step (5)+(6): restore a joining player's live state and register
    /// them with the growth engine and local roster. The transport that
    /// would call this on an actual player-join event is out of scope
    /// (§1); this is the touch-point a real one wires into.
    pub async fn handle_player_added(&self, user_id: UserId) {
        let profile = self.cache.get_profile(user_id).await;
        {
            let mut world = self.world.lock().await;
            GrandSerializer::restore(&mut *world, user_id, &profile.inventory, EggRestorePolicy::PreserveOriginal, now_unix());
        }
        self.growth.register_user(user_id).await;
        self.roster.lock().await.insert(user_id);
        self.events.publish(LocalEvent::PersistInventoryRestored { user_id });
    }

    /// The at-disconnect barrier (§4.F), wired as the `PlayerRemoving`
    /// handler the out-of-scope transport would call.
    pub async fn handle_player_removing(&self, user_id: UserId) {
        self.growth.unregister_user(user_id).await;
        self.roster.lock().await.remove(&user_id);
        match self.presync.run(user_id, now_unix()).await {
            Ok(outcome) if outcome.ok => info!(%user_id, "pre-exit sync completed"),
            Ok(outcome) => warn!(%user_id, reason = ?outcome.reason, "pre-exit sync save did not succeed"),
            Err(err) => warn!(%user_id, ?err, "pre-exit sync failed"),
        }
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();

    // Bootstrap preferences (best-effort; a missing/unwritable config dir
    // degrades to defaults rather than failing startup).
    let config: Option<ConfigService<FsConfigStore>> = FsConfigStore::new().map(ConfigService::new).ok();
    let prefs: ServicePrefs = config.as_ref().and_then(|c| c.load::<ServicePrefs>("vivariumd_prefs").ok().flatten()).unwrap_or_default();
    if let Some(cfg) = &config {
        let _ = cfg.save("vivariumd_prefs", &prefs);
    }
    let summary_interval = Duration::from_secs(args.summary_interval_secs.unwrap_or(prefs.summary_interval_secs));

    info!("starting vivariumd");

    // Step (1): ensure remote event/folder topology — a no-op for the
    // in-memory stand-in store used here (§1, real cloud store out of scope).
    // Step (2): load persistence modules.
    let kv = Arc::new(InMemoryKv::new());
    let store: Arc<Store> = Arc::new(RemoteProfileStore::new(kv.clone()));
    let events: Arc<dyn EventBus> = Arc::new(LoggingEventBus);

    // Step (3): register serializer — `GrandSerializer` is stateless and
    // has no registration step; it is simply called from the join/leave
    // handlers below.

    // Step (4): initialize profile cache.
    let cache = Arc::new(ProfileCache::new(store).with_event_bus(events.clone()));

    // Step (5): initialize plot/world collaborators (out of scope; the
    // in-memory `FakeLiveWorld` stands in for the real engine adapter).
    let world: Arc<AsyncMutex<World>> = Arc::new(AsyncMutex::new(FakeLiveWorld::new()));

    // Step (6): wire growth, feed (out of scope arithmetic, touch-point
    // only), sale, and faction modules.
    let growth = Arc::new(GrowthEngine::new(cache.clone(), world.clone()).with_event_bus(events.clone()));
    let factions = Arc::new(FactionTotals::new(kv.clone()));
    let sale = Arc::new(SalePipeline::new(cache.clone(), world.clone()).with_faction_sink(factions.clone()));
    let presync = Arc::new(PreExitSync::new(cache.clone(), world.clone()).with_growth_flusher(growth.clone()));
    let stage = Arc::new(StageManager::new(world.clone(), Arc::new(NoopReparent)));

    let state = Arc::new(AppState {
        cache,
        world,
        growth: growth.clone(),
        presync,
        sale,
        stage: stage.clone(),
        factions: factions.clone(),
        events: events.clone(),
        roster: AsyncMutex::new(HashSet::new()),
    });

    let shutdown = Arc::new(Notify::new());
    tokio::spawn({
        let growth = growth.clone();
        let shutdown = shutdown.clone();
        async move { growth.run(shutdown).await }
    });
    tokio::spawn({
        let factions = factions.clone();
        let shutdown = shutdown.clone();
        async move { factions.run(shutdown).await }
    });
    tokio::spawn({
        let stage = stage.clone();
        let shutdown = shutdown.clone();
        async move { stage.run_sweeper(Duration::from_secs(60), shutdown).await }
    });
    tokio::spawn({
        let state = state.clone();
        let shutdown = shutdown.clone();
        async move { run_summary_loop(state, summary_interval, shutdown).await }
    });

    let addr: SocketAddr = format!("0.0.0.0:{}", args.api_port).parse().context("parse api bind address")?;
    let listener = TcpListener::bind(addr).await.context("bind operator api")?;
    info!(%addr, "operator api listening");
    let app = api::router(state.clone());
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            warn!(?err, "operator api server failed");
        }
    });

    // Step (7): fire `GameServicesReady`.
    state.events.publish(LocalEvent::GameServicesReady);
    info!("game services ready");

    tokio::signal::ctrl_c().await.context("install ctrl-c handler")?;
    info!("shutdown requested");
    shutdown.notify_waiters();
    state.cache.shutdown().await;
    state.factions.flush_all().await;
    let _ = &state.sale;
    Ok(())
}

async fn run_summary_loop(state: Arc<AppState>, interval: Duration, shutdown: Arc<Notify>) {
    loop {
        tokio::select! {
            () = shutdown.notified() => return,
            () = tokio::time::sleep(interval) => {}
        }
        let roster: Vec<UserId> = state.roster.lock().await.iter().copied().collect();
        let summaries = summary::build(&state.cache, &roster).await;
        summary::log(&summaries);
    }
}
