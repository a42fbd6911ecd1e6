// SPDX-License-Identifier: Apache-2.0
//! `FoodTool` sub-serializer (§4.C): feed tools sitting in a backpack.

use crate::common::{dedupe_by_id, truncate_to_cap, StabilityTracker};
use crate::keys::{expand_to_attrs, project_to_entry, FOOD_TOOL_KEYS};
use vivarium_core::{AttrValue, EntityId, EntityKind, InventoryEntry, InventoryField, LiveWorldPort, ToolUniqueId, UserId};

const DEFAULT_TEMPLATE: &str = "DefaultFoodToolTemplate";
/// Consecutive frames a restored tool must go unchanged before it is
/// considered settled (§4.C "a stability counter that must cross a
/// threshold of successive frames").
pub const SETTLE_THRESHOLD_FRAMES: u32 = 3;

/// Translates feed tools between [`LiveWorldPort`] and persisted entries.
pub struct FoodToolSerializer;

impl FoodToolSerializer {
    /// Build the persisted `foodTools` field for `owner` (§4.C).
    #[must_use]
    pub fn serialize(world: &dyn LiveWorldPort, owner: UserId, is_final: bool, last_snapshot: &[InventoryEntry]) -> Vec<InventoryEntry> {
        let live = world.entities_for_owner(EntityKind::FoodTool, owner);
        let mut entries: Vec<InventoryEntry> = live
            .into_iter()
            .filter_map(|id| world.read_attrs(EntityKind::FoodTool, id).map(|attrs| project_to_entry(FOOD_TOOL_KEYS, &attrs)))
            .collect();
        if is_final && entries.is_empty() && !last_snapshot.is_empty() {
            entries = last_snapshot.to_vec();
        }
        let entries = dedupe_by_id(entries, InventoryField::FoodTools.id_key_candidates());
        truncate_to_cap(entries, InventoryField::FoodTools)
    }

    /// Rehydrate `owner`'s feed tools from persisted `entries`. Per §4.C,
    /// builds from the named template when present, else a minimal
    /// fallback, and begins the stability countdown via
    /// [`StabilityTracker`] (the caller ticks it on subsequent frames).
    pub fn restore(world: &mut dyn LiveWorldPort, owner: UserId, entries: &[InventoryEntry]) {
        for entry in entries {
            let Some(raw_id) = entry.resolve_id(InventoryField::FoodTools.id_key_candidates()) else {
                continue;
            };
            let id = EntityId::from(ToolUniqueId::new(raw_id));
            let attrs = expand_to_attrs(FOOD_TOOL_KEYS, entry);
            let template = entry.get("tpl").and_then(AttrValue::as_str).unwrap_or(DEFAULT_TEMPLATE);

            if world.read_attrs(EntityKind::FoodTool, id).is_some() {
                world.write_attrs(EntityKind::FoodTool, id, attrs);
            } else {
                world.spawn(EntityKind::FoodTool, owner, id, template, attrs, None);
            }
        }
    }

    /// Advance the settling countdown for a just-restored tool. Returns
    /// `true` once it has crossed [`SETTLE_THRESHOLD_FRAMES`].
    pub fn tick_settle(world: &mut dyn LiveWorldPort, id: EntityId) -> bool {
        StabilityTracker::tick(world, EntityKind::FoodTool, id, SETTLE_THRESHOLD_FRAMES)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use vivarium_testkit::FakeLiveWorld;

    #[test]
    fn restore_builds_from_template_and_settles_after_threshold() {
        let mut world = FakeLiveWorld::new();
        let entry = InventoryEntry::from_pairs([("uid", AttrValue::Int(5)), ("fid", AttrValue::Int(2))]);
        FoodToolSerializer::restore(&mut world, UserId::new(1), &[entry]);
        let id = EntityId::from(ToolUniqueId::new(5));
        assert!(world.contains(EntityKind::FoodTool, id));

        assert!(!FoodToolSerializer::tick_settle(&mut world, id));
        assert!(!FoodToolSerializer::tick_settle(&mut world, id));
        assert!(FoodToolSerializer::tick_settle(&mut world, id));
    }

    #[test]
    fn serialize_dedupes_by_tool_uid() {
        let mut world = FakeLiveWorld::new();
        let owner = UserId::new(1);
        let id = EntityId::from(ToolUniqueId::new(1));
        world.spawn(EntityKind::FoodTool, owner, id, "t", Default::default(), None);
        let entries = FoodToolSerializer::serialize(&world, owner, false, &[]);
        assert_eq!(entries.len(), 1);
    }
}
