// SPDX-License-Identifier: Apache-2.0
//! Per-user cache slot state (§4.B).

use std::sync::Arc;
use tokio::sync::Notify;
use vivarium_core::Profile;

/// Outcome of a `saveNow`/`saveNowAndWait` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Whether the wait resolved before its deadline (`false` means timeout).
    pub done: bool,
    /// Whether the save that resolved the wait succeeded.
    pub ok: bool,
    /// Failure reason, set only when `ok` is `false`.
    pub reason: Option<String>,
}

impl SaveOutcome {
    pub(crate) const fn timed_out() -> Self {
        Self { done: false, ok: false, reason: None }
    }

    pub(crate) const fn skipped() -> Self {
        Self { done: true, ok: true, reason: None }
    }
}

/// Why `trySpendCoins` denied a debit (§4.B, §7 "input error").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpendDenied {
    /// `amount` exceeds the current balance (`have`).
    InsufficientCoins {
        /// Balance at the time of the attempt.
        have: u64,
        /// Amount requested.
        need: u64,
    },
}

pub(crate) struct UserSlot {
    pub profile: Profile,
    pub prior_remote: Option<Profile>,
    /// Whether `get_profile` has attempted its one-time load from the
    /// store yet. Seeded slots (not yet loaded) still hold a valid
    /// placeholder profile so other operations can proceed immediately.
    pub loaded: bool,
    pub dirty: bool,
    pub coin_spent_since_load: bool,
    pub saving: bool,
    pub generation: u64,
    pub completed_generation: u64,
    pub force_verified_pending: bool,
    /// Set by [`crate::ProfileCache::set_inventory`] when the caller
    /// already ran the empty-overwrite guard itself (e.g.
    /// `InventoryService::finalize_player`, §4.D) and wants the next save
    /// to skip re-applying it.
    pub override_empty_guard_pending: bool,
    pub last_save_ok: bool,
    pub last_save_reason: Option<String>,
    pub notify: Arc<Notify>,
}

impl UserSlot {
    pub fn new(profile: Profile) -> Self {
        Self {
            prior_remote: Some(profile.clone()),
            profile,
            loaded: false,
            dirty: false,
            coin_spent_since_load: false,
            saving: false,
            generation: 0,
            completed_generation: 0,
            force_verified_pending: false,
            override_empty_guard_pending: false,
            last_save_ok: true,
            last_save_reason: None,
            notify: Arc::new(Notify::new()),
        }
    }
}
