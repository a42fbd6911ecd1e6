// SPDX-License-Identifier: Apache-2.0
//! Error kinds for faction payout handling (§4.G, §7).

use thiserror::Error;
use vivarium_store::RemoteError;

/// Errors raised by [`crate::FactionTotals`] operations.
#[derive(Debug, Error)]
pub enum FactionError {
    /// The faction name was empty or otherwise not a valid identifier
    /// (§4.G "Validate faction name").
    #[error("invalid faction name: {0:?}")]
    InvalidFaction(String),
    /// `addPayout` was called with a non-positive amount (§4.G "reject
    /// non-positive amounts").
    #[error("payout amount must be positive")]
    NonPositiveAmount,
    /// Every retry attempt hit a transient remote error.
    #[error("flush retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made before giving up.
        attempts: u32,
        /// The last transient error observed.
        last: String,
    },
    /// The remote call failed with a non-retryable error.
    #[error("permanent remote error: {0}")]
    Permanent(String),
    /// The stored faction total record failed to decode.
    #[error("faction total decode failure: {0}")]
    Decode(String),
}

impl From<RemoteError> for FactionError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Transient(msg) => FactionError::RetriesExhausted { attempts: 1, last: msg },
            RemoteError::Permanent(msg) => FactionError::Permanent(msg),
        }
    }
}
