// SPDX-License-Identifier: Apache-2.0
//! Optional per-player coin attribution for faction payouts (§4.G "If the
//! user is attributed, credit them via `incrementCoins` and request a
//! verified save").

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use vivarium_cache::ProfileCache;
use vivarium_core::UserId;
use vivarium_store::ProfileStore;

/// The timeout given to the verified save `addPayout` requests after
/// crediting an attributed user (mirrors the profile verified-save budget,
/// §9).
const PAYOUT_SAVE_TIMEOUT: Duration = Duration::from_secs(4);

/// Credits a player's coin balance as part of a faction payout (§4.G).
/// A null-object (`NoCoinCredit`) is used when faction totals run without
/// per-player attribution (§7 "Missing collaborator").
#[async_trait]
pub trait CoinCreditor: Send + Sync {
    /// Credit `amount` coins to `user_id` and request a verified save.
    async fn credit_and_save(&self, user_id: UserId, amount: u64);
}

/// Null-object [`CoinCreditor`].
pub struct NoCoinCredit;

#[async_trait]
impl CoinCreditor for NoCoinCredit {
    async fn credit_and_save(&self, _user_id: UserId, _amount: u64) {}
}

/// [`CoinCreditor`] backed by a real [`ProfileCache`].
pub struct ProfileCacheCoinCreditor<S> {
    cache: Arc<ProfileCache<S>>,
}

impl<S> ProfileCacheCoinCreditor<S> {
    /// Wrap a cache so faction payouts can credit attributed players.
    #[must_use]
    pub fn new(cache: Arc<ProfileCache<S>>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl<S: ProfileStore + 'static> CoinCreditor for ProfileCacheCoinCreditor<S> {
    async fn credit_and_save(&self, user_id: UserId, amount: u64) {
        let delta = i64::try_from(amount).unwrap_or(i64::MAX);
        self.cache.increment_coins(user_id, delta).await;
        let outcome = self.cache.save_now_and_wait(user_id, PAYOUT_SAVE_TIMEOUT, true).await;
        if !outcome.ok {
            tracing::warn!(%user_id, amount, reason = ?outcome.reason, "faction payout coin credit save did not confirm");
        }
    }
}
