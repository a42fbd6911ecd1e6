// SPDX-License-Identifier: Apache-2.0
//! The Profile Store Adapter (§4.A): the only component that talks to the
//! remote key-value store.

use crate::error::{RemoteError, StoreError};
use crate::kv::{profile_key, MutateAbort, RemoteKv};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;
use vivarium_core::wire::{canonical_bytes, from_canonical_bytes};
use vivarium_core::{Profile, UserId};

/// A mutator that the adapter applies to the latest remote profile value.
/// Returning `Err` aborts the update without writing anything (the
/// underlying remote call is never attempted in that case).
pub trait ProfileMutator: Fn(Option<Profile>) -> Result<Profile, String> + Send + Sync {}
impl<T> ProfileMutator for T where T: Fn(Option<Profile>) -> Result<Profile, String> + Send + Sync {}

/// `load`/`update` over profiles (§4.A).
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Load a profile. `Ok(None)` means the key is absent (first join).
    async fn load(&self, user_id: UserId) -> Result<Profile, StoreError>
    where
        Self: Sized,
    {
        Ok(self.load_optional(user_id).await?.unwrap_or_else(|| Profile::seeded(user_id, &[])))
    }

    /// Load a profile without seeding a default on miss.
    async fn load_optional(&self, user_id: UserId) -> Result<Option<Profile>, StoreError>;

    /// Optimistically update a profile, retrying transient remote errors
    /// per `policy`.
    async fn update(
        &self,
        user_id: UserId,
        policy: &RetryPolicy,
        mutator: &(dyn ProfileMutator),
    ) -> Result<Profile, StoreError>;
}

/// [`ProfileStore`] implemented over any [`RemoteKv`] backend.
pub struct RemoteProfileStore<K> {
    kv: Arc<K>,
}

impl<K> RemoteProfileStore<K> {
    /// Wrap a raw remote key-value client.
    pub fn new(kv: Arc<K>) -> Self {
        Self { kv }
    }
}

#[async_trait]
impl<K: RemoteKv> ProfileStore for RemoteProfileStore<K> {
    async fn load_optional(&self, user_id: UserId) -> Result<Option<Profile>, StoreError> {
        let key = profile_key(user_id);
        let raw = self.kv.get_raw(&key).await.map_err(|e| match e {
            RemoteError::Transient(msg) => StoreError::RetriesExhausted { attempts: 1, last: msg },
            RemoteError::Permanent(msg) => StoreError::Permanent(msg),
        })?;
        match raw {
            None => Ok(None),
            Some(bytes) => Ok(Some(from_canonical_bytes(&bytes)?)),
        }
    }

    async fn update(
        &self,
        user_id: UserId,
        policy: &RetryPolicy,
        mutator: &(dyn ProfileMutator),
    ) -> Result<Profile, StoreError> {
        let key = profile_key(user_id);
        let mut last_err = String::new();

        for attempt in 0..policy.max_attempts {
            let decode_err: std::cell::RefCell<Option<StoreError>> = std::cell::RefCell::new(None);
            let transform = |old_raw: Option<&[u8]>| -> Result<Vec<u8>, MutateAbort> {
                let old_profile = match old_raw {
                    None => None,
                    Some(bytes) => match from_canonical_bytes(bytes) {
                        Ok(p) => Some(p),
                        Err(e) => {
                            *decode_err.borrow_mut() = Some(StoreError::Decode(e));
                            return Err(MutateAbort("decode failure".into()));
                        }
                    },
                };
                let new_profile = mutator(old_profile).map_err(MutateAbort)?;
                canonical_bytes(&new_profile).map_err(|e| MutateAbort(e.to_string()))
            };

            match self.kv.update_raw(&key, &transform).await {
                Ok(new_bytes) => {
                    if let Some(err) = decode_err.into_inner() {
                        return Err(err);
                    }
                    return Ok(from_canonical_bytes(&new_bytes)?);
                }
                Err(RemoteError::Permanent(msg)) => {
                    return Err(StoreError::Permanent(msg));
                }
                Err(RemoteError::Transient(msg)) => {
                    if let Some(err) = decode_err.into_inner() {
                        return Err(err);
                    }
                    last_err = msg.clone();
                    warn!(user_id = %user_id, attempt, %msg, "transient store error, retrying");
                    if attempt + 1 < policy.max_attempts {
                        tokio::time::sleep(policy.delay_for(attempt)).await;
                    }
                }
            }
        }

        Err(StoreError::RetriesExhausted {
            attempts: policy.max_attempts,
            last: last_err,
        })
    }
}
