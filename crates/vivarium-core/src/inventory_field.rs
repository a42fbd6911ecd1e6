// SPDX-License-Identifier: Apache-2.0
//! The five persisted inventory fields (§3) and the id-key candidates used
//! to look up an entry's durable id within each.

use crate::entry::{KEY_EGG_ID, KEY_ENTRY_ID, KEY_SLIME_ID, KEY_TOOL_UID, KEY_TOOL_UID_ALT};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the five top-level persisted inventory sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InventoryField {
    /// Live world pets.
    WorldSlimes,
    /// Placed, unhatched eggs.
    WorldEggs,
    /// Unplaced egg tools sitting in a backpack.
    EggTools,
    /// Feed tools.
    FoodTools,
    /// Captured pets represented as tools.
    CapturedSlimes,
}

impl InventoryField {
    /// All five fields, in the fixed order §4.C's `Restore` calls the
    /// sub-restores (world slimes, world eggs, food tools, egg tools,
    /// captured slimes is the *serialize* order; restore order is the
    /// same fixed order used throughout this crate family).
    pub const ALL: [InventoryField; 5] = [
        InventoryField::WorldSlimes,
        InventoryField::WorldEggs,
        InventoryField::EggTools,
        InventoryField::FoodTools,
        InventoryField::CapturedSlimes,
    ];

    /// The attribute keys under which an entry in this field might carry
    /// its durable id, tried in order. Persisted entries carry the
    /// short wire key (`"id"`/`"uid"`); the long-form name is kept as a
    /// fallback for entries built directly from live attrs (not yet
    /// projected). Sale Pipeline's defensive removal (§4.H step 5) walks
    /// this same list across "all plausible key names."
    #[must_use]
    pub const fn id_key_candidates(self) -> &'static [&'static str] {
        match self {
            InventoryField::WorldSlimes | InventoryField::CapturedSlimes => {
                &[KEY_ENTRY_ID, KEY_SLIME_ID]
            }
            InventoryField::WorldEggs => &[KEY_ENTRY_ID, KEY_EGG_ID],
            InventoryField::EggTools | InventoryField::FoodTools => {
                &[KEY_TOOL_UID, KEY_TOOL_UID_ALT]
            }
        }
    }

    /// Per-field maximum entry count (§4.C "Caps"). Excess entries during
    /// serialize or restore are truncated with a warning by the caller.
    #[must_use]
    pub const fn cap(self) -> usize {
        match self {
            InventoryField::WorldSlimes | InventoryField::CapturedSlimes => 500,
            InventoryField::WorldEggs => 200,
            InventoryField::EggTools | InventoryField::FoodTools => 300,
        }
    }
}

impl fmt::Display for InventoryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InventoryField::WorldSlimes => "worldSlimes",
            InventoryField::WorldEggs => "worldEggs",
            InventoryField::EggTools => "eggTools",
            InventoryField::FoodTools => "foodTools",
            InventoryField::CapturedSlimes => "capturedSlimes",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_field_has_at_least_one_id_key() {
        for field in InventoryField::ALL {
            assert!(!field.id_key_candidates().is_empty());
        }
    }

    #[test]
    fn display_matches_wire_field_name() {
        assert_eq!(InventoryField::WorldSlimes.to_string(), "worldSlimes");
        assert_eq!(InventoryField::CapturedSlimes.to_string(), "capturedSlimes");
    }
}
