// SPDX-License-Identifier: Apache-2.0
//! `WorldSlime` sub-serializer (§4.C): live world pets, the field whose
//! growth/hunger/pose fields Pre-Exit Sync treats as volatile/authoritative
//! over the cached profile copy (§4.F step 5).

use crate::common::{apply_last_snapshot_fallback, dedupe_by_id, pose_from_entry_fields, pose_to_entry_fields, truncate_to_cap};
use crate::keys::{expand_to_attrs, project_to_entry, WORLD_SLIME_KEYS};
use vivarium_core::{EntityId, EntityKind, InventoryEntry, InventoryField, LiveWorldPort, SlimeId, UserId};

const DEFAULT_TEMPLATE: &str = "DefaultSlimeTemplate";

/// Translates world pets between [`LiveWorldPort`] and persisted entries.
pub struct WorldSlimeSerializer;

impl WorldSlimeSerializer {
    /// Build the persisted `worldSlimes` field for `owner` (§4.C).
    #[must_use]
    pub fn serialize(
        world: &dyn LiveWorldPort,
        owner: UserId,
        is_final: bool,
        last_snapshot: &[InventoryEntry],
    ) -> Vec<InventoryEntry> {
        let live = world.entities_for_owner(EntityKind::WorldSlime, owner);
        let mut entries = Vec::with_capacity(live.len());
        for id in live {
            let Some(attrs) = world.read_attrs(EntityKind::WorldSlime, id) else {
                continue;
            };
            let mut entry = project_to_entry(WORLD_SLIME_KEYS, &attrs);
            if let Some(pose) = world.read_pose(EntityKind::WorldSlime, id) {
                pose_to_entry_fields(&mut entry, pose);
            }
            entries.push(entry);
        }
        let entries = apply_last_snapshot_fallback(entries, last_snapshot, is_final);
        let entries = dedupe_by_id(entries, InventoryField::WorldSlimes.id_key_candidates());
        truncate_to_cap(entries, InventoryField::WorldSlimes)
    }

    /// Rehydrate `owner`'s live world pets from persisted `entries`
    /// (§4.C: "if a live instance with the same id exists, its pose and
    /// colors are refreshed; otherwise a new model is constructed").
    pub fn restore(world: &mut dyn LiveWorldPort, owner: UserId, entries: &[InventoryEntry]) {
        for entry in entries {
            let Some(raw_id) = entry.get("id").and_then(vivarium_core::AttrValue::as_u64) else {
                continue;
            };
            let id = EntityId::from(SlimeId::new(raw_id));
            let attrs = expand_to_attrs(WORLD_SLIME_KEYS, entry);
            let pose = pose_from_entry_fields(entry);
            let template = entry
                .get("tpl")
                .and_then(vivarium_core::AttrValue::as_str)
                .unwrap_or(DEFAULT_TEMPLATE);

            if world.read_attrs(EntityKind::WorldSlime, id).is_some() {
                world.write_attrs(EntityKind::WorldSlime, id, attrs);
                if let Some(pose) = pose {
                    world.write_pose(EntityKind::WorldSlime, id, pose);
                }
            } else {
                world.spawn(EntityKind::WorldSlime, owner, id, template, attrs, pose);
            }
        }
    }
}
