// SPDX-License-Identifier: Apache-2.0
//! Error kinds for the Sale Pipeline (§4.H, §7).

use thiserror::Error;

/// Errors raised by [`crate::SalePipeline::sell`].
///
/// Ordinary input problems (unknown faction, no sellable tools resolved)
/// are *not* modeled here: per §7 they surface as a non-`ok` `SaleOutcome`
/// with a `reason`, never as an error. This type is reserved for the one
/// case the pipeline cannot resume from on its own: the closing verified
/// save neither confirmed nor definitively failed.
#[derive(Debug, Error)]
pub enum SaleError {
    /// The atomic `ApplySale` collaborator rejected the sale outright.
    #[error("sale application failed: {0}")]
    ApplyFailed(String),
    /// The step-6 verified save (and its single retry) neither confirmed
    /// nor definitively failed within its timeout.
    #[error("sale save did not complete: {reason:?}")]
    SaveDidNotComplete {
        /// Failure reason, when one was surfaced.
        reason: Option<String>,
    },
}
