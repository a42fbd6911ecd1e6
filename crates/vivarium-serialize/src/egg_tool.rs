// SPDX-License-Identifier: Apache-2.0
//! `EggTool` sub-serializer (§4.C): unplaced egg tools sitting in a
//! backpack. Similar to `FoodTool`, but tolerates and repairs "placeholder"
//! tools left behind by a failed restore attempt.

use crate::common::{dedupe_by_id, truncate_to_cap, StabilityTracker};
use crate::food_tool::SETTLE_THRESHOLD_FRAMES;
use crate::keys::{expand_to_attrs, project_to_entry, EGG_TOOL_KEYS};
use vivarium_core::{AttrValue, EntityId, EntityKind, InventoryEntry, InventoryField, LiveWorldPort, ToolUniqueId, UserId};

const DEFAULT_TEMPLATE: &str = "DefaultEggToolTemplate";
/// Attribute key marking a constructed tool as a content-free placeholder
/// (§4.C "a single unit-size part with no content") pending repair.
const PLACEHOLDER_KEY: &str = "__placeholder";

/// Translates unplaced egg tools between [`LiveWorldPort`] and persisted
/// entries.
pub struct EggToolSerializer;

impl EggToolSerializer {
    /// Build the persisted `eggTools` field for `owner` (§4.C).
    #[must_use]
    pub fn serialize(world: &dyn LiveWorldPort, owner: UserId, is_final: bool, last_snapshot: &[InventoryEntry]) -> Vec<InventoryEntry> {
        let live = world.entities_for_owner(EntityKind::EggTool, owner);
        let mut entries: Vec<InventoryEntry> = live
            .into_iter()
            .filter_map(|id| world.read_attrs(EntityKind::EggTool, id).map(|attrs| project_to_entry(EGG_TOOL_KEYS, &attrs)))
            .collect();
        if is_final && entries.is_empty() && !last_snapshot.is_empty() {
            entries = last_snapshot.to_vec();
        }
        let entries = dedupe_by_id(entries, InventoryField::EggTools.id_key_candidates());
        truncate_to_cap(entries, InventoryField::EggTools)
    }

    /// Rehydrate `owner`'s egg tools. If a live instance already exists
    /// but is a bare placeholder (no `EggId`/`HatchDuration` content), it
    /// is rebuilt from the template rather than merely updated in place
    /// (§4.C "tolerates and repairs placeholder tools").
    pub fn restore(world: &mut dyn LiveWorldPort, owner: UserId, entries: &[InventoryEntry]) {
        for entry in entries {
            let Some(raw_id) = entry.resolve_id(InventoryField::EggTools.id_key_candidates()) else {
                continue;
            };
            let id = EntityId::from(ToolUniqueId::new(raw_id));
            let attrs = expand_to_attrs(EGG_TOOL_KEYS, entry);
            let template = entry.get("tpl").and_then(AttrValue::as_str).unwrap_or(DEFAULT_TEMPLATE);

            let needs_rebuild = match world.read_attrs(EntityKind::EggTool, id) {
                Some(existing) => is_placeholder(&existing),
                None => false,
            };

            if needs_rebuild {
                world.destroy(EntityKind::EggTool, id);
            }

            if needs_rebuild || world.read_attrs(EntityKind::EggTool, id).is_none() {
                world.spawn(EntityKind::EggTool, owner, id, template, attrs, None);
            } else {
                world.write_attrs(EntityKind::EggTool, id, attrs);
            }
        }
    }

    /// Advance the settling countdown for a just-restored/repaired tool.
    pub fn tick_settle(world: &mut dyn LiveWorldPort, id: EntityId) -> bool {
        StabilityTracker::tick(world, EntityKind::EggTool, id, SETTLE_THRESHOLD_FRAMES)
    }
}

/// A placeholder is a constructed tool with no hatch-relevant content:
/// either explicitly tagged, or missing both `EggId` and `HatchDuration`.
fn is_placeholder(attrs: &vivarium_core::LiveAttrs) -> bool {
    if attrs.get(PLACEHOLDER_KEY).and_then(AttrValue::as_bool) == Some(true) {
        return true;
    }
    !attrs.contains_key("EggId") && !attrs.contains_key("HatchDuration")
}
