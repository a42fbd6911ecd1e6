// SPDX-License-Identifier: Apache-2.0
//! The optional atomic sale-application collaborator (§4.H step 4).

use async_trait::async_trait;
use vivarium_core::UserId;

/// Applies a priced sale atomically: coin credit plus inventory removal in
/// one commit, when the host offers such a primitive.
///
/// Unlike the null-object collaborators used elsewhere in this family
/// (`NoGrowthFlush`, `NoCoinCredit`, ...), this one has no no-op
/// implementation: §4.H step 4 reads "if available ... Otherwise", a
/// structurally different fallback path (non-atomic `incrementCoins` +
/// per-id `removeInventoryItem`), not a behaviorally-equivalent no-op.
/// [`crate::SalePipeline`] therefore holds this as `Option<Arc<dyn
/// ApplySale>>` and branches on it directly.
#[async_trait]
pub trait ApplySale: Send + Sync {
    /// Commit the sale atomically: credit `total_payout` coins and remove
    /// every entry named by `sold_slime_ids`/`sold_tool_uids` from the
    /// user's captured-slimes field.
    async fn apply_sale(
        &self,
        user_id: UserId,
        sold_slime_ids: &[u64],
        sold_tool_uids: &[u64],
        total_payout: u64,
        reason: &str,
    ) -> Result<(), String>;
}
