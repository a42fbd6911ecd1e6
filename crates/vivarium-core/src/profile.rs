// SPDX-License-Identifier: Apache-2.0
//! The `Profile` aggregate (§3): one per user, keyed by [`UserId`].

use crate::entry::InventoryEntry;
use crate::ids::UserId;
use crate::inventory_field::InventoryField;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Currency and other scalar account state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoreStats {
    /// Non-negative coin balance (invariant 2, §3).
    pub coins: u64,
}

impl Default for CoreStats {
    fn default() -> Self {
        Self { coins: 0 }
    }
}

/// Per-faction standing, `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Stats {
    /// Faction name -> standing in `[0, 1]`.
    pub standing: BTreeMap<String, f64>,
}

impl Stats {
    /// Current standing for `faction`, defaulting to `0.0` if never set.
    #[must_use]
    pub fn standing_for(&self, faction: &str) -> f64 {
        self.standing.get(faction).copied().unwrap_or(0.0)
    }

    /// Set standing for `faction`, clamped into `[0, 1]` (invariant 2, §3).
    pub fn set_standing(&mut self, faction: impl Into<String>, value: f64) {
        self.standing.insert(faction.into(), value.clamp(0.0, 1.0));
    }
}

/// The five persisted inventory sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Inventory {
    /// Live world pets.
    pub world_slimes: Vec<InventoryEntry>,
    /// Placed, unhatched eggs.
    pub world_eggs: Vec<InventoryEntry>,
    /// Unplaced egg tools.
    pub egg_tools: Vec<InventoryEntry>,
    /// Feed tools.
    pub food_tools: Vec<InventoryEntry>,
    /// Captured pets represented as tools.
    pub captured_slimes: Vec<InventoryEntry>,
}

impl Inventory {
    /// Borrow one of the five fields by [`InventoryField`] selector.
    #[must_use]
    pub fn field(&self, field: InventoryField) -> &Vec<InventoryEntry> {
        match field {
            InventoryField::WorldSlimes => &self.world_slimes,
            InventoryField::WorldEggs => &self.world_eggs,
            InventoryField::EggTools => &self.egg_tools,
            InventoryField::FoodTools => &self.food_tools,
            InventoryField::CapturedSlimes => &self.captured_slimes,
        }
    }

    /// Mutably borrow one of the five fields by [`InventoryField`] selector.
    pub fn field_mut(&mut self, field: InventoryField) -> &mut Vec<InventoryEntry> {
        match field {
            InventoryField::WorldSlimes => &mut self.world_slimes,
            InventoryField::WorldEggs => &mut self.world_eggs,
            InventoryField::EggTools => &mut self.egg_tools,
            InventoryField::FoodTools => &mut self.food_tools,
            InventoryField::CapturedSlimes => &mut self.captured_slimes,
        }
    }

    /// Replace one of the five fields wholesale (used by the cache's merge
    /// commit after the empty-overwrite guard has already run, §4.B).
    pub fn set_field(&mut self, field: InventoryField, entries: Vec<InventoryEntry>) {
        *self.field_mut(field) = entries;
    }
}

/// Write-tracking and bookkeeping fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Meta {
    /// Monotonic non-decreasing write counter (invariant 3, §3).
    pub data_version: u64,
    /// Unix timestamp of the last pre-exit serialize.
    pub last_pre_exit_snapshot: Option<i64>,
    /// Unix timestamp of the last pre-exit sync/save.
    pub last_pre_exit_sync: Option<i64>,
}

/// One user's complete persistent record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// The user this profile belongs to.
    pub user_id: UserId,
    /// Currency and scalar account state.
    pub core: CoreStats,
    /// Faction standings.
    pub stats: Stats,
    /// The five inventory sequences.
    pub inventory: Inventory,
    /// Bookkeeping metadata.
    pub meta: Meta,
}

impl Profile {
    /// Build a freshly-seeded profile for a user's first join (§3
    /// Lifecycle): zero coins, empty inventories, the given default
    /// faction standings (commonly all `0.0`, spelled out for callers that
    /// seed a non-zero starting value per faction).
    #[must_use]
    pub fn seeded(user_id: UserId, default_standings: &[(&str, f64)]) -> Self {
        let mut stats = Stats::default();
        for (faction, value) in default_standings {
            stats.set_standing(*faction, *value);
        }
        Self {
            user_id,
            core: CoreStats::default(),
            stats,
            inventory: Inventory::default(),
            meta: Meta::default(),
        }
    }

    /// Advance `meta.data_version` by one. Called exactly once per
    /// successful write (invariant 3, §3).
    pub fn bump_data_version(&mut self) {
        self.meta.data_version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_profile_has_zero_coins_and_empty_inventory() {
        let p = Profile::seeded(UserId::new(1), &[("slime_kin", 0.5)]);
        assert_eq!(p.core.coins, 0);
        assert!(p.inventory.world_slimes.is_empty());
        assert_eq!(p.stats.standing_for("slime_kin"), 0.5);
        assert_eq!(p.stats.standing_for("unknown_faction"), 0.0);
    }

    #[test]
    fn standing_clamps_to_unit_interval() {
        let mut stats = Stats::default();
        stats.set_standing("f", 1.7);
        assert_eq!(stats.standing_for("f"), 1.0);
        stats.set_standing("f", -0.3);
        assert_eq!(stats.standing_for("f"), 0.0);
    }

    #[test]
    fn data_version_strictly_increases() {
        let mut p = Profile::seeded(UserId::new(1), &[]);
        assert_eq!(p.meta.data_version, 0);
        p.bump_data_version();
        p.bump_data_version();
        assert_eq!(p.meta.data_version, 2);
    }

    #[test]
    fn field_accessors_round_trip() {
        let mut p = Profile::seeded(UserId::new(1), &[]);
        p.inventory
            .set_field(InventoryField::FoodTools, vec![InventoryEntry::default()]);
        assert_eq!(p.inventory.field(InventoryField::FoodTools).len(), 1);
        assert!(p.inventory.field(InventoryField::WorldEggs).is_empty());
    }
}
