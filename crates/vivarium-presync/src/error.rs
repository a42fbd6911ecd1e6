// SPDX-License-Identifier: Apache-2.0
//! Error kinds for Pre-Exit Sync (§4.F, §7).

use thiserror::Error;

/// Errors raised by [`crate::PreExitSync::run`].
#[derive(Debug, Error)]
pub enum PreSyncError {
    /// The step-7 verified save neither confirmed nor definitively failed
    /// within its timeout (§7 "a failed pre-exit save leaves the last
    /// successful save intact").
    #[error("pre-exit save did not complete: {reason:?}")]
    SaveDidNotComplete {
        /// Failure reason, when one was surfaced.
        reason: Option<String>,
    },
}
