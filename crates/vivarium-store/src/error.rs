// SPDX-License-Identifier: Apache-2.0
//! Store error kinds (§7): the transient/permanent distinction is load
//! bearing — retrying a permanent failure wastes the backoff budget, and
//! giving up on a transient one loses data that a retry would have saved.
//! Modeled on the `StoreError::Conflict` / `StoreError::Backend` split in
//! the `mntogether` persistence module, generalized to transient/permanent
//! rather than conflict/backend since this adapter's remote primitive is
//! already conflict-free (server-side optimistic update).

use thiserror::Error;

/// Error raised by the underlying remote key-value client, prior to any
/// retry handling by this crate.
#[derive(Debug, Error, Clone)]
pub enum RemoteError {
    /// Timeout, connection reset, throttling — worth retrying.
    #[error("transient remote error: {0}")]
    Transient(String),
    /// Malformed response, quota exhausted, auth failure — retrying will
    /// not help.
    #[error("permanent remote error: {0}")]
    Permanent(String),
}

/// Error surfaced to callers of [`crate::ProfileStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Every retry attempt hit a transient error; the retry budget was
    /// exhausted.
    #[error("transient remote error persisted across {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made before giving up.
        attempts: u32,
        /// The last transient error observed.
        last: String,
    },
    /// The remote call failed with a non-retryable error.
    #[error("permanent remote error: {0}")]
    Permanent(String),
    /// The caller-supplied mutator rejected the old value (e.g. an
    /// invariant it could not reconcile). Not a store failure.
    #[error("mutator aborted: {0}")]
    MutatorAborted(String),
    /// The profile payload failed to decode from its stored bytes.
    #[error("decode failure: {0}")]
    Decode(#[from] vivarium_core::wire::WireError),
}

impl StoreError {
    /// Whether this failure is recoverable by a later save attempt
    /// (§7 "keep cache dirty so a later save will retry").
    #[must_use]
    pub const fn is_retryable_later(&self) -> bool {
        matches!(self, StoreError::RetriesExhausted { .. } | StoreError::Permanent(_))
    }
}
