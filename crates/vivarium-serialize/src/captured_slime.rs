// SPDX-License-Identifier: Apache-2.0
//! `CapturedSlime` sub-serializer (§4.C): captured live pets represented as
//! tools, deduped by `SlimeId` rather than `ToolUniqueId`.

use crate::common::{dedupe_by_id, truncate_to_cap, StabilityTracker};
use crate::food_tool::SETTLE_THRESHOLD_FRAMES;
use crate::keys::{expand_to_attrs, project_to_entry, CAPTURED_SLIME_KEYS};
use vivarium_core::{AttrValue, EntityId, EntityKind, InventoryEntry, InventoryField, LiveWorldPort, SlimeId, UserId};

const DEFAULT_TEMPLATE: &str = "DefaultCapturedSlimeTemplate";

/// Translates captured pets between [`LiveWorldPort`] and persisted
/// entries.
pub struct CapturedSlimeSerializer;

impl CapturedSlimeSerializer {
    /// Build the persisted `capturedSlimes` field for `owner` (§4.C).
    #[must_use]
    pub fn serialize(world: &dyn LiveWorldPort, owner: UserId, is_final: bool, last_snapshot: &[InventoryEntry]) -> Vec<InventoryEntry> {
        let live = world.entities_for_owner(EntityKind::CapturedSlime, owner);
        let mut entries: Vec<InventoryEntry> = live
            .into_iter()
            .filter_map(|id| world.read_attrs(EntityKind::CapturedSlime, id).map(|attrs| project_to_entry(CAPTURED_SLIME_KEYS, &attrs)))
            .collect();
        if is_final && entries.is_empty() && !last_snapshot.is_empty() {
            entries = last_snapshot.to_vec();
        }
        // Captured slimes dedupe by SlimeId specifically (§4.C), not the
        // field's full id-key candidate list (which also carries ToolUniqueId).
        let entries = dedupe_by_id(entries, &["id"]);
        truncate_to_cap(entries, InventoryField::CapturedSlimes)
    }

    /// Rehydrate `owner`'s captured pets, keyed by `SlimeId`.
    pub fn restore(world: &mut dyn LiveWorldPort, owner: UserId, entries: &[InventoryEntry]) {
        for entry in entries {
            let Some(raw_id) = entry.get("id").and_then(AttrValue::as_u64) else {
                continue;
            };
            let id = EntityId::from(SlimeId::new(raw_id));
            let attrs = expand_to_attrs(CAPTURED_SLIME_KEYS, entry);
            let template = entry.get("tpl").and_then(AttrValue::as_str).unwrap_or(DEFAULT_TEMPLATE);

            if world.read_attrs(EntityKind::CapturedSlime, id).is_some() {
                world.write_attrs(EntityKind::CapturedSlime, id, attrs);
            } else {
                world.spawn(EntityKind::CapturedSlime, owner, id, template, attrs, None);
            }
        }
    }

    /// Advance the settling countdown for a just-restored tool (§4.C
    /// "the stability heartbeat requirement applies").
    pub fn tick_settle(world: &mut dyn LiveWorldPort, id: EntityId) -> bool {
        StabilityTracker::tick(world, EntityKind::CapturedSlime, id, SETTLE_THRESHOLD_FRAMES)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use vivarium_testkit::FakeLiveWorld;

    #[test]
    fn serialize_dedupes_by_slime_id_not_tool_uid() {
        let mut world = FakeLiveWorld::new();
        let owner = UserId::new(1);
        let id_a = EntityId::from(SlimeId::new(7));
        world.spawn(EntityKind::CapturedSlime, owner, id_a, "t", Default::default(), None);
        let entries = CapturedSlimeSerializer::serialize(&world, owner, false, &[]);
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn restore_builds_new_entity_from_template_when_absent() {
        let mut world = FakeLiveWorld::new();
        let owner = UserId::new(1);
        let entry = InventoryEntry::from_pairs([("id", AttrValue::Int(11)), ("gp", AttrValue::Float(0.3))]);
        CapturedSlimeSerializer::restore(&mut world, owner, &[entry]);
        let id = EntityId::from(SlimeId::new(11));
        assert!(world.contains(EntityKind::CapturedSlime, id));
    }
}
