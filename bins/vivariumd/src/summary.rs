// SPDX-License-Identifier: Apache-2.0
//! Periodic per-user summary (§6 "A periodic summary logs per-user coin
//! and inventory counts for observability").

use serde::Serialize;
use std::sync::Arc;
use vivarium_cache::ProfileCache;
use vivarium_core::UserId;
use vivarium_store::ProfileStore;

/// One user's summary line.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    /// The user this summary describes.
    pub user_id: UserId,
    /// Current coin balance.
    pub coins: u64,
    /// Live world pet count.
    pub world_slimes: usize,
    /// Placed, unhatched egg count.
    pub world_eggs: usize,
    /// Unplaced egg tool count.
    pub egg_tools: usize,
    /// Feed tool count.
    pub food_tools: usize,
    /// Captured pet count.
    pub captured_slimes: usize,
}

/// Build a summary line for every `user_id` in `roster`.
pub async fn build<S: ProfileStore + 'static>(cache: &ProfileCache<S>, roster: &[UserId]) -> Vec<UserSummary> {
    let mut out = Vec::with_capacity(roster.len());
    for &user_id in roster {
        let profile = cache.get_profile(user_id).await;
        out.push(UserSummary {
            user_id,
            coins: profile.core.coins,
            world_slimes: profile.inventory.world_slimes.len(),
            world_eggs: profile.inventory.world_eggs.len(),
            egg_tools: profile.inventory.egg_tools.len(),
            food_tools: profile.inventory.food_tools.len(),
            captured_slimes: profile.inventory.captured_slimes.len(),
        });
    }
    out
}

/// Log one line per summary at INFO.
pub fn log(summaries: &[UserSummary]) {
    for s in summaries {
        tracing::info!(
            user_id = %s.user_id,
            coins = s.coins,
            world_slimes = s.world_slimes,
            world_eggs = s.world_eggs,
            egg_tools = s.egg_tools,
            food_tools = s.food_tools,
            captured_slimes = s.captured_slimes,
            "periodic summary"
        );
    }
}
