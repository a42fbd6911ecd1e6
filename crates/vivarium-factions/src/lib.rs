// SPDX-License-Identifier: Apache-2.0
//! Per-shard faction payout totals (§4.G): `addPayout`, batched remote
//! flush with monotonic-max cross-shard convergence, and a background
//! flush loop.

mod coin;
mod config;
mod error;
mod notify;
mod totals;

pub use coin::{CoinCreditor, NoCoinCredit, ProfileCacheCoinCreditor};
pub use config::FactionConfig;
pub use error::FactionError;
pub use notify::{CrossShardBus, FactionNotifier, FactionTotalUpdate, NoCrossShardBus, NoFactionNotify};
pub use totals::{FactionTotals, NullFactionTotals};
