// SPDX-License-Identifier: Apache-2.0
//! Error kinds for the Inventory Service (§4.D, §7).

use thiserror::Error;

/// Errors raised by [`crate::InventoryService`] operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// `finalizePlayer`'s verified save did not complete within its
    /// timeout or failed remotely (§7 "permanent remote" / timeout).
    #[error("finalize save did not complete: {reason:?}")]
    FinalizeSaveFailed {
        /// The underlying save failure reason, if one was reported.
        reason: Option<String>,
    },
}
