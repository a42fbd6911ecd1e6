// SPDX-License-Identifier: Apache-2.0
//! In-memory [`ProfileStore`] fake that skips the wire layer entirely —
//! useful for cache/growth/presync tests that don't care about encoding.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use vivarium_core::{Profile, UserId};
use vivarium_store::{ProfileMutator, ProfileStore, RetryPolicy, StoreError};

/// An in-memory profile store with no retry semantics of its own: `update`
/// always succeeds (or returns the mutator's error) on the first attempt.
pub struct InMemoryProfileStore {
    profiles: Mutex<HashMap<UserId, Profile>>,
}

impl InMemoryProfileStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { profiles: Mutex::new(HashMap::new()) }
    }

    /// Seed a profile directly, bypassing `update`.
    pub fn seed(&self, profile: Profile) {
        self.profiles.lock().unwrap_or_else(|e| e.into_inner()).insert(profile.user_id, profile);
    }
}

impl Default for InMemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn load_optional(&self, user_id: UserId) -> Result<Option<Profile>, StoreError> {
        Ok(self.profiles.lock().unwrap_or_else(|e| e.into_inner()).get(&user_id).cloned())
    }

    async fn update(
        &self,
        user_id: UserId,
        _policy: &RetryPolicy,
        mutator: &(dyn ProfileMutator),
    ) -> Result<Profile, StoreError> {
        let mut guard = self.profiles.lock().unwrap_or_else(|e| e.into_inner());
        let old = guard.get(&user_id).cloned();
        let new = mutator(old).map_err(StoreError::MutatorAborted)?;
        guard.insert(user_id, new.clone());
        Ok(new)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_optional_misses_until_seeded() {
        let store = InMemoryProfileStore::new();
        let user = UserId::new(1);
        assert!(store.load_optional(user).await.unwrap().is_none());
        store.seed(Profile::seeded(user, &[]));
        assert!(store.load_optional(user).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_applies_mutator_and_persists() {
        let store = InMemoryProfileStore::new();
        let user = UserId::new(2);
        let policy = RetryPolicy::profile_save_default();
        let result = store
            .update(user, &policy, &|old: Option<Profile>| {
                let mut p = old.unwrap_or_else(|| Profile::seeded(user, &[]));
                p.core.coins = 5;
                Ok(p)
            })
            .await
            .unwrap();
        assert_eq!(result.core.coins, 5);
        let reloaded = store.load_optional(user).await.unwrap().unwrap();
        assert_eq!(reloaded.core.coins, 5);
    }
}
