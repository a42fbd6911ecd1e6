// SPDX-License-Identifier: Apache-2.0
//! `WorldEgg` sub-serializer (§4.C): placed, unhatched eggs.

use crate::common::{apply_last_snapshot_fallback, dedupe_by_id, pose_from_entry_fields, pose_to_entry_fields, truncate_to_cap};
use crate::keys::{expand_to_attrs, project_to_entry, WORLD_EGG_KEYS};
use vivarium_core::{AttrValue, EggId, EntityId, EntityKind, InventoryEntry, InventoryField, LiveWorldPort, UserId};

const DEFAULT_TEMPLATE: &str = "DefaultEggTemplate";

/// How a restored egg's hatch-at timestamp is chosen (§4.C "WorldEgg").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EggRestorePolicy {
    /// Preserve the original `hatchAt` (offline progress toward hatching
    /// continues to apply; a rejoin does not reset the timer).
    PreserveOriginal,
    /// Recompute `hatchAt` from the snapshot's `timeRemaining` as of now
    /// (the egg effectively "pauses" while the owner was offline).
    ResetByTimeRemaining,
    /// Mark the egg as immediately ready to hatch.
    MarkReadyImmediately,
}

/// Translates placed eggs between [`LiveWorldPort`] and persisted entries.
pub struct WorldEggSerializer;

impl WorldEggSerializer {
    /// Build the persisted `worldEggs` field for `owner` (§4.C).
    #[must_use]
    pub fn serialize(
        world: &dyn LiveWorldPort,
        owner: UserId,
        is_final: bool,
        last_snapshot: &[InventoryEntry],
    ) -> Vec<InventoryEntry> {
        let live = world.entities_for_owner(EntityKind::WorldEgg, owner);
        let mut entries = Vec::with_capacity(live.len());
        for id in live {
            let Some(attrs) = world.read_attrs(EntityKind::WorldEgg, id) else {
                continue;
            };
            let mut entry = project_to_entry(WORLD_EGG_KEYS, &attrs);
            if let Some(pose) = world.read_pose(EntityKind::WorldEgg, id) {
                pose_to_entry_fields(&mut entry, pose);
            }
            entries.push(entry);
        }
        let entries = apply_last_snapshot_fallback(entries, last_snapshot, is_final);
        let entries = dedupe_by_id(entries, InventoryField::WorldEggs.id_key_candidates());
        truncate_to_cap(entries, InventoryField::WorldEggs)
    }

    /// Rehydrate `owner`'s placed eggs, applying `policy` to the hatch-at
    /// timestamp (§4.C "WorldEgg", "restore hatch-at is chosen by a policy
    /// flag").
    pub fn restore(world: &mut dyn LiveWorldPort, owner: UserId, entries: &[InventoryEntry], policy: EggRestorePolicy, now: i64) {
        for entry in entries {
            let Some(raw_id) = entry.get("id").and_then(AttrValue::as_u64) else {
                continue;
            };
            let id = EntityId::from(EggId::new(raw_id));
            let mut attrs = expand_to_attrs(WORLD_EGG_KEYS, entry);
            let pose = pose_from_entry_fields(entry);
            let template = entry.get("tpl").and_then(AttrValue::as_str).unwrap_or(DEFAULT_TEMPLATE);

            let hatch_at = resolve_hatch_at(entry, policy, now);
            attrs.insert("HatchAt".to_string(), AttrValue::Int(hatch_at));

            if world.read_attrs(EntityKind::WorldEgg, id).is_some() {
                world.write_attrs(EntityKind::WorldEgg, id, attrs);
                if let Some(pose) = pose {
                    world.write_pose(EntityKind::WorldEgg, id, pose);
                }
            } else {
                world.spawn(EntityKind::WorldEgg, owner, id, template, attrs, pose);
            }
        }
    }
}

fn resolve_hatch_at(entry: &InventoryEntry, policy: EggRestorePolicy, now: i64) -> i64 {
    match policy {
        EggRestorePolicy::PreserveOriginal => entry.get("ha").and_then(AttrValue::as_i64).unwrap_or(now),
        EggRestorePolicy::ResetByTimeRemaining => {
            let remaining = entry.get("tr").and_then(AttrValue::as_i64).unwrap_or(0).max(0);
            now + remaining
        }
        EggRestorePolicy::MarkReadyImmediately => now,
    }
}
