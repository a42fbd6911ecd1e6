// SPDX-License-Identifier: Apache-2.0
//! The raw remote key-value primitive (§6): "Required primitive: atomic
//! `update(key, fn(old) → new)`." This trait models the underlying store
//! (e.g. a cloud data-store service); [`crate::RemoteProfileStore`] layers
//! profile encoding and retry/backoff on top of it.

use crate::error::RemoteError;
use async_trait::async_trait;

/// Raised by a mutator function passed to [`RemoteKv::update_raw`] when it
/// cannot produce a new value from the old one (a logic-level abort, not a
/// store failure).
#[derive(Debug, Clone)]
pub struct MutateAbort(pub String);

/// Atomic key-value primitive. One remote call per logical attempt: the
/// implementation is responsible for reading the latest value and invoking
/// `mutate` against it exactly once, server-side-atomically.
#[async_trait]
pub trait RemoteKv: Send + Sync {
    /// Read the current raw value for `key`, or `None` if absent.
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteError>;

    /// Atomically transform the value at `key`: `mutate` receives the
    /// latest stored bytes (`None` if absent) and returns the new bytes to
    /// commit, or aborts the update.
    async fn update_raw(
        &self,
        key: &str,
        mutate: &(dyn Fn(Option<&[u8]>) -> Result<Vec<u8>, MutateAbort> + Send + Sync),
    ) -> Result<Vec<u8>, RemoteError>;
}

/// The canonical remote key for a user's profile (§6: `inventory/{userId}`).
#[must_use]
pub fn profile_key(user_id: vivarium_core::UserId) -> String {
    format!("inventory/{}", user_id.value())
}
