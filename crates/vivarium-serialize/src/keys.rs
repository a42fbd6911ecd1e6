// SPDX-License-Identifier: Apache-2.0
//! Short-key projection tables (§4.C "Short-key projection"): each live
//! attribute name maps to a fixed wire key. Tables are additive-only across
//! versions — removing a row requires a version bump, never a plain edit.

use vivarium_core::{AttrValue, InventoryEntry, LiveAttrs};

/// A `(live attribute name, wire key)` table, tried in order.
pub(crate) type KeyTable = &'static [(&'static str, &'static str)];

pub(crate) const WORLD_SLIME_KEYS: KeyTable = &[
    ("SlimeId", "id"),
    ("GrowthProgress", "gp"),
    ("PersistedGrowthProgress", "pgp"),
    ("SizeScale", "sz"),
    ("Hunger", "hu"),
    ("ColorPrimary", "c1"),
    ("ColorSecondary", "c2"),
    ("Tier", "tier"),
    ("Rarity", "rar"),
    ("Value", "val"),
    ("LastGrowthUpdate", "lgu"),
    ("Template", "tpl"),
];

pub(crate) const WORLD_EGG_KEYS: KeyTable = &[
    ("EggId", "id"),
    ("HatchDuration", "hd"),
    ("HatchAt", "ha"),
    ("TimeRemaining", "tr"),
    ("PlacedAt", "pa"),
    ("Rarity", "rar"),
    ("Value", "val"),
    ("Template", "tpl"),
];

pub(crate) const FOOD_TOOL_KEYS: KeyTable = &[
    ("ToolUniqueId", "uid"),
    ("FoodId", "fid"),
    ("RestoreFraction", "rf"),
    ("BufferBonus", "bb"),
    ("Consumable", "cons"),
    ("Charges", "chg"),
    ("CooldownOverride", "cdo"),
    ("OwnerId", "own"),
    ("Template", "tpl"),
];

pub(crate) const EGG_TOOL_KEYS: KeyTable = &[
    ("ToolUniqueId", "uid"),
    ("EggId", "id"),
    ("HatchDuration", "hd"),
    ("Rarity", "rar"),
    ("Value", "val"),
    ("Template", "tpl"),
];

pub(crate) const CAPTURED_SLIME_KEYS: KeyTable = &[
    ("ToolUniqueId", "uid"),
    ("SlimeId", "id"),
    ("GrowthProgress", "gp"),
    ("SizeScale", "sz"),
    ("Hunger", "hu"),
    ("ColorPrimary", "c1"),
    ("ColorSecondary", "c2"),
    ("Tier", "tier"),
    ("Rarity", "rar"),
    ("Value", "val"),
    ("Template", "tpl"),
];

fn short_for(table: KeyTable, live_key: &str) -> Option<&'static str> {
    table.iter().find(|(lk, _)| *lk == live_key).map(|(_, sk)| *sk)
}

fn live_for(table: KeyTable, short_key: &str) -> Option<&'static str> {
    table.iter().find(|(_, sk)| *sk == short_key).map(|(lk, _)| *lk)
}

/// Project a live attribute bag down to the entry's short-key shape,
/// dropping any attribute not in `table`.
pub(crate) fn project_to_entry(table: KeyTable, attrs: &LiveAttrs) -> InventoryEntry {
    let mut entry = InventoryEntry::default();
    for (live_key, value) in attrs {
        if let Some(short) = short_for(table, live_key) {
            entry.set(short, value.clone());
        }
    }
    entry
}

/// Expand a persisted entry back to a live attribute bag, dropping any wire
/// key not in `table` (forward-compatible with additive-only table growth).
pub(crate) fn expand_to_attrs(table: KeyTable, entry: &InventoryEntry) -> LiveAttrs {
    let mut attrs = LiveAttrs::new();
    for (short_key, value) in entry.iter() {
        if let Some(live_key) = live_for(table, short_key) {
            attrs.insert(live_key.to_string(), value.clone());
        }
    }
    attrs
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_short_keys() {
        let mut attrs = LiveAttrs::new();
        attrs.insert("GrowthProgress".to_string(), AttrValue::from(0.5));
        attrs.insert("Unmapped".to_string(), AttrValue::from(1_i64));

        let entry = project_to_entry(WORLD_SLIME_KEYS, &attrs);
        assert_eq!(entry.get("gp").and_then(AttrValue::as_f64), Some(0.5));
        assert!(entry.get("Unmapped").is_none());

        let back = expand_to_attrs(WORLD_SLIME_KEYS, &entry);
        assert_eq!(back.get("GrowthProgress").and_then(AttrValue::as_f64), Some(0.5));
        assert!(!back.contains_key("Unmapped"));
    }

    #[test]
    fn every_table_maps_its_id_key() {
        assert!(short_for(WORLD_SLIME_KEYS, "SlimeId").is_some());
        assert!(short_for(WORLD_EGG_KEYS, "EggId").is_some());
        assert!(short_for(FOOD_TOOL_KEYS, "ToolUniqueId").is_some());
        assert!(short_for(EGG_TOOL_KEYS, "ToolUniqueId").is_some());
        assert!(short_for(CAPTURED_SLIME_KEYS, "SlimeId").is_some());
    }
}
