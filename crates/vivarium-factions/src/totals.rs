// SPDX-License-Identifier: Apache-2.0
//! Per-shard faction payout totals (§4.G).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex as AsyncMutex, Notify};
use vivarium_core::UserId;
use vivarium_store::{MutateAbort, RemoteError, RemoteKv, RetryPolicy};

use crate::coin::{CoinCreditor, NoCoinCredit};
use crate::config::FactionConfig;
use crate::error::FactionError;
use crate::notify::{CrossShardBus, FactionNotifier, FactionTotalUpdate, NoCrossShardBus, NoFactionNotify};

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, Default)]
struct FactionState {
    total: u64,
    dirty_delta: u64,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct FactionTotalRecord {
    total: u64,
}

fn remote_key(faction: &str) -> String {
    format!("FactionTotal_{faction}")
}

fn validate_faction(faction: &str) -> Result<(), FactionError> {
    if faction.trim().is_empty() {
        Err(FactionError::InvalidFaction(faction.to_string()))
    } else {
        Ok(())
    }
}

/// The operation any payout-attributing caller (e.g. the Sale Pipeline)
/// needs, abstracted so it can be composed with a real [`FactionTotals`]
/// or a [`NullFactionTotals`] when faction tracking is absent (§9
/// "Optional-module probing").
#[async_trait]
pub trait FactionPayoutSink: Send + Sync {
    /// Record a payout into `faction`'s total, best-effort: failures are
    /// logged, never propagated (mirrors `GrowthFlusher`'s fire-and-forget
    /// shape).
    async fn add_payout(&self, faction: &str, amount: u64, user_id: Option<UserId>);
}

/// Null-object [`FactionPayoutSink`].
pub struct NullFactionTotals;

#[async_trait]
impl FactionPayoutSink for NullFactionTotals {
    async fn add_payout(&self, _faction: &str, _amount: u64, _user_id: Option<UserId>) {}
}

/// Per-shard `total[faction]` / `dirtyDelta[faction]` tracker (§4.G),
/// backed by a [`RemoteKv`] for the batched flush.
pub struct FactionTotals<K> {
    kv: Arc<K>,
    state: AsyncMutex<HashMap<String, FactionState>>,
    cross_shard: Arc<dyn CrossShardBus>,
    notifier: Arc<dyn FactionNotifier>,
    coin: Arc<dyn CoinCreditor>,
    cfg: FactionConfig,
}

impl<K: RemoteKv> FactionTotals<K> {
    /// Build a tracker over a remote key-value backend, with null-object
    /// collaborators and default tunables.
    #[must_use]
    pub fn new(kv: Arc<K>) -> Self {
        Self {
            kv,
            state: AsyncMutex::new(HashMap::new()),
            cross_shard: Arc::new(NoCrossShardBus),
            notifier: Arc::new(NoFactionNotify),
            coin: Arc::new(NoCoinCredit),
            cfg: FactionConfig::default(),
        }
    }

    /// Attach a cross-shard publisher.
    #[must_use]
    pub fn with_cross_shard_bus(mut self, bus: Arc<dyn CrossShardBus>) -> Self {
        self.cross_shard = bus;
        self
    }

    /// Attach a local fan-out notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn FactionNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Attach a per-player coin attribution collaborator.
    #[must_use]
    pub fn with_coin_creditor(mut self, coin: Arc<dyn CoinCreditor>) -> Self {
        self.coin = coin;
        self
    }

    /// Override the default tunables.
    #[must_use]
    pub fn with_config(mut self, cfg: FactionConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// The locally-known total for `faction` (0 if never observed).
    pub async fn total_for(&self, faction: &str) -> u64 {
        self.state.lock().await.get(faction).map_or(0, |s| s.total)
    }

    /// Record a payout (§4.G "`addPayout`"): validates, accrues the local
    /// total and delta, fans out locally and cross-shard, optionally
    /// credits an attributed player, and flushes immediately if the
    /// unflushed delta crosses `maxUnflushedDelta`.
    pub async fn try_add_payout(&self, faction: &str, amount: u64, user_id: Option<UserId>) -> Result<(), FactionError> {
        validate_faction(faction)?;
        if amount == 0 {
            return Err(FactionError::NonPositiveAmount);
        }

        let (new_total, new_delta) = {
            let mut state = self.state.lock().await;
            let entry = state.entry(faction.to_string()).or_default();
            entry.total = entry.total.saturating_add(amount);
            entry.dirty_delta = entry.dirty_delta.saturating_add(amount);
            (entry.total, entry.dirty_delta)
        };

        self.notifier.notify_payout(faction, amount, new_total, user_id);
        self.cross_shard.publish(FactionTotalUpdate {
            faction: faction.to_string(),
            total: new_total,
            ts: now_unix(),
        });

        if let Some(uid) = user_id {
            self.coin.credit_and_save(uid, amount).await;
        }

        if new_delta >= self.cfg.max_unflushed_delta {
            self.flush(faction).await?;
        }
        Ok(())
    }

    /// Apply an incoming cross-shard update (§4.G "Subscribe"): raises the
    /// local total to match if the remote shard has seen more (monotonic
    /// max); never lowers it.
    pub async fn apply_remote_update(&self, update: &FactionTotalUpdate) {
        let mut state = self.state.lock().await;
        let entry = state.entry(update.faction.clone()).or_default();
        entry.total = entry.total.max(update.total);
    }

    /// Flush `faction`'s unflushed delta to the remote store via an
    /// optimistic update, then re-read to converge the local total with
    /// whatever every shard's accumulated writes produced (§4.G "Flush").
    pub async fn flush(&self, faction: &str) -> Result<(), FactionError> {
        let delta = { self.state.lock().await.get(faction).map_or(0, |s| s.dirty_delta) };
        if delta == 0 {
            return Ok(());
        }

        let key = remote_key(faction);
        let policy = RetryPolicy::totals_default();
        let mut last_err = String::new();

        for attempt in 0..policy.max_attempts {
            let transform = |old: Option<&[u8]>| -> Result<Vec<u8>, MutateAbort> {
                let prior = old
                    .and_then(|bytes| serde_json::from_slice::<FactionTotalRecord>(bytes).ok())
                    .map_or(0, |r| r.total);
                let updated = FactionTotalRecord { total: prior.saturating_add(delta) };
                serde_json::to_vec(&updated).map_err(|e| MutateAbort(e.to_string()))
            };

            match self.kv.update_raw(&key, &transform).await {
                Ok(bytes) => {
                    let record: FactionTotalRecord = serde_json::from_slice(&bytes).map_err(|e| FactionError::Decode(e.to_string()))?;
                    let mut state = self.state.lock().await;
                    let entry = state.entry(faction.to_string()).or_default();
                    entry.total = entry.total.max(record.total);
                    entry.dirty_delta = 0;
                    return Ok(());
                }
                Err(RemoteError::Permanent(msg)) => return Err(FactionError::Permanent(msg)),
                Err(RemoteError::Transient(msg)) => {
                    last_err = msg.clone();
                    tracing::warn!(faction, attempt, %msg, "transient faction flush error, retrying");
                    if attempt + 1 < policy.max_attempts {
                        tokio::time::sleep(policy.delay_for(attempt)).await;
                    }
                }
            }
        }

        Err(FactionError::RetriesExhausted { attempts: policy.max_attempts, last: last_err })
    }

    /// Flush every faction with a non-zero unflushed delta.
    pub async fn flush_all(&self) {
        let factions: Vec<String> = {
            self.state
                .lock()
                .await
                .iter()
                .filter(|(_, s)| s.dirty_delta > 0)
                .map(|(f, _)| f.clone())
                .collect()
        };
        for faction in factions {
            if let Err(err) = self.flush(&faction).await {
                tracing::warn!(faction, ?err, "faction flush failed, will retry on next loop tick");
            }
        }
    }

    /// Run the background flush loop until `shutdown` is notified (§4.G
    /// "A background loop flushes every `FLUSH_INTERVAL_SECONDS`").
    pub async fn run(self: Arc<Self>, shutdown: Arc<Notify>) {
        loop {
            tokio::select! {
                () = shutdown.notified() => break,
                () = tokio::time::sleep(self.cfg.flush_interval) => {}
            }
            self.flush_all().await;
        }
    }
}

#[async_trait]
impl<K: RemoteKv> FactionPayoutSink for FactionTotals<K> {
    async fn add_payout(&self, faction: &str, amount: u64, user_id: Option<UserId>) {
        if let Err(err) = self.try_add_payout(faction, amount, user_id).await {
            tracing::warn!(faction, amount, ?err, "faction payout rejected or failed");
        }
    }
}
