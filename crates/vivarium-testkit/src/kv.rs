// SPDX-License-Identifier: Apache-2.0
//! In-memory [`RemoteKv`] fake, modeled on `echo-cas::MemoryTier`: a plain
//! `HashMap` guarded by a `Mutex`, with hooks to simulate transient failures
//! in tests that exercise retry/backoff.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use vivarium_store::{MutateAbort, RemoteError, RemoteKv};

/// In-memory remote store. `fail_next_n` lets a test inject a run of
/// transient failures before the store starts serving requests normally.
pub struct InMemoryKv {
    data: Mutex<HashMap<String, Vec<u8>>>,
    fail_next_n: AtomicU32,
}

impl InMemoryKv {
    /// An empty store that never fails.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            fail_next_n: AtomicU32::new(0),
        }
    }

    /// Arrange for the next `n` `update_raw` calls to return a transient
    /// error before any further call succeeds.
    pub fn fail_next(&self, n: u32) {
        self.fail_next_n.store(n, Ordering::SeqCst);
    }

    /// Snapshot the raw bytes stored for `key`, for test assertions.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned()
    }
}

impl Default for InMemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteKv for InMemoryKv {
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteError> {
        Ok(self.data.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned())
    }

    async fn update_raw(
        &self,
        key: &str,
        mutate: &(dyn Fn(Option<&[u8]>) -> Result<Vec<u8>, MutateAbort> + Send + Sync),
    ) -> Result<Vec<u8>, RemoteError> {
        if self.fail_next_n.load(Ordering::SeqCst) > 0 {
            self.fail_next_n.fetch_sub(1, Ordering::SeqCst);
            return Err(RemoteError::Transient("injected failure".into()));
        }
        let mut guard = self.data.lock().unwrap_or_else(|e| e.into_inner());
        let old = guard.get(key).map(Vec::as_slice);
        let new = mutate(old).map_err(|e| RemoteError::Permanent(e.0))?;
        guard.insert(key.to_string(), new.clone());
        Ok(new)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_raw_returns_none_for_missing_key() {
        let kv = InMemoryKv::new();
        assert!(kv.get_raw("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_raw_writes_value_returned_by_mutator() {
        let kv = InMemoryKv::new();
        let got = kv
            .update_raw("k", &|_old| Ok(b"v1".to_vec()))
            .await
            .unwrap();
        assert_eq!(got, b"v1");
        assert_eq!(kv.peek("k"), Some(b"v1".to_vec()));
    }

    #[tokio::test]
    async fn fail_next_injects_transient_errors_then_recovers() {
        let kv = InMemoryKv::new();
        kv.fail_next(2);
        assert!(kv.update_raw("k", &|_| Ok(b"x".to_vec())).await.is_err());
        assert!(kv.update_raw("k", &|_| Ok(b"x".to_vec())).await.is_err());
        assert!(kv.update_raw("k", &|_| Ok(b"x".to_vec())).await.is_ok());
    }
}
