// SPDX-License-Identifier: Apache-2.0
//! Profile Cache & Saver (§4.B): central hot state for online users, with a
//! coalescing per-user save queue in front of `vivarium-store`.

mod cache;
mod slot;

pub use cache::{ProfileCache, DEFAULT_DEBOUNCE, SHUTDOWN_DRAIN_DEADLINE};
pub use slot::{SaveOutcome, SpendDenied};
