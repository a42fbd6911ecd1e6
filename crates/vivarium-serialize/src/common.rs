// SPDX-License-Identifier: Apache-2.0
//! Behaviors shared by all five sub-serializers (§4.C "Common behaviors").

use tracing::warn;
use vivarium_core::{AttrValue, EntityId, EntityKind, InventoryEntry, InventoryField, LiveWorldPort, Pose};

/// Live attribute key a restored tool's stability counter is tracked
/// under, shared by the `FoodTool`/`EggTool`/`CapturedSlime` sub-serializers
/// (§4.C: "attaches a stability counter that must cross a threshold of
/// successive frames before the tool is considered settled").
const STABLE_FRAMES_KEY: &str = "__stable_frames";

/// Advances a restored entity's per-frame stability counter and reports
/// whether it has crossed `threshold` consecutive frames (i.e. is now
/// "settled"). A no-op (returns `false`) if the entity is not live.
pub struct StabilityTracker;

impl StabilityTracker {
    /// Advance the counter by one frame, returning `true` once `threshold`
    /// has been reached or exceeded.
    pub fn tick(world: &mut dyn LiveWorldPort, kind: EntityKind, id: EntityId, threshold: u32) -> bool {
        let Some(mut attrs) = world.read_attrs(kind, id) else {
            return false;
        };
        let frames = attrs
            .get(STABLE_FRAMES_KEY)
            .and_then(AttrValue::as_i64)
            .unwrap_or(0)
            .saturating_add(1);
        attrs.insert(STABLE_FRAMES_KEY.to_string(), AttrValue::Int(frames));
        world.write_attrs(kind, id, attrs);
        u64::try_from(frames).is_ok_and(|frames| frames >= u64::from(threshold))
    }
}

/// Drop entries past the first occurrence of each id (§4.C "Deduplication,
/// on serialize").
pub(crate) fn dedupe_by_id(entries: Vec<InventoryEntry>, id_keys: &[&str]) -> Vec<InventoryEntry> {
    let mut seen = std::collections::HashSet::new();
    entries
        .into_iter()
        .filter(|e| match e.resolve_id(id_keys) {
            Some(id) => seen.insert(id),
            None => true,
        })
        .collect()
}

/// Truncate `entries` to `field`'s cap, logging a warning if anything was
/// dropped (§4.C "Caps").
pub(crate) fn truncate_to_cap(mut entries: Vec<InventoryEntry>, field: InventoryField) -> Vec<InventoryEntry> {
    let cap = field.cap();
    if entries.len() > cap {
        warn!(field = %field, dropped = entries.len() - cap, cap, "truncating entries past field cap");
        entries.truncate(cap);
    }
    entries
}

/// On final serialize, fall back to `last_snapshot` if live enumeration
/// produced nothing (§4.C "Last-snapshot fallback").
pub(crate) fn apply_last_snapshot_fallback(
    live_entries: Vec<InventoryEntry>,
    last_snapshot: &[InventoryEntry],
    is_final: bool,
) -> Vec<InventoryEntry> {
    if is_final && live_entries.is_empty() && !last_snapshot.is_empty() {
        last_snapshot.to_vec()
    } else {
        live_entries
    }
}

/// Write a pose's absolute (and, when present, plot-local) coordinates into
/// an entry under the shared `px/py/pz`/`lx/ly/lz` wire keys (§4.C "Spatial
/// encoding").
pub(crate) fn pose_to_entry_fields(entry: &mut InventoryEntry, pose: Pose) {
    entry.set("px", pose.absolute[0]);
    entry.set("py", pose.absolute[1]);
    entry.set("pz", pose.absolute[2]);
    if let Some(local) = pose.local {
        entry.set("lx", local[0]);
        entry.set("ly", local[1]);
        entry.set("lz", local[2]);
    }
}

/// Read a pose back out of an entry. Prefers plot-local coordinates when
/// all three are present, falling back to absolute.
pub(crate) fn pose_from_entry_fields(entry: &InventoryEntry) -> Option<Pose> {
    let ax = entry.get("px").and_then(AttrValue::as_f64)?;
    let ay = entry.get("py").and_then(AttrValue::as_f64)?;
    let az = entry.get("pz").and_then(AttrValue::as_f64)?;
    let local = match (
        entry.get("lx").and_then(AttrValue::as_f64),
        entry.get("ly").and_then(AttrValue::as_f64),
        entry.get("lz").and_then(AttrValue::as_f64),
    ) {
        (Some(x), Some(y), Some(z)) => Some([x, y, z]),
        _ => None,
    };
    Some(match local {
        Some(l) => Pose::with_local([ax, ay, az], l),
        None => Pose::absolute_only([ax, ay, az]),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use vivarium_core::UserId;
    use vivarium_testkit::FakeLiveWorld;

    #[test]
    fn stability_tracker_settles_after_threshold_frames() {
        let mut world = FakeLiveWorld::new();
        let id = EntityId::from(vivarium_core::ToolUniqueId::new(1));
        world.seed(EntityKind::FoodTool, UserId::new(1), id, Default::default(), None);

        assert!(!StabilityTracker::tick(&mut world, EntityKind::FoodTool, id, 3));
        assert!(!StabilityTracker::tick(&mut world, EntityKind::FoodTool, id, 3));
        assert!(StabilityTracker::tick(&mut world, EntityKind::FoodTool, id, 3));
    }

    #[test]
    fn stability_tracker_is_noop_for_absent_entity() {
        let mut world = FakeLiveWorld::new();
        let id = EntityId::from(vivarium_core::ToolUniqueId::new(1));
        assert!(!StabilityTracker::tick(&mut world, EntityKind::FoodTool, id, 1));
    }

    fn entry_with_id(id: u64) -> InventoryEntry {
        InventoryEntry::from_pairs([("SlimeId", AttrValue::from(id))])
    }

    #[test]
    fn dedupe_keeps_first_occurrence_only() {
        let entries = vec![entry_with_id(1), entry_with_id(2), entry_with_id(1)];
        let deduped = dedupe_by_id(entries, &["SlimeId"]);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn truncate_to_cap_drops_excess_and_warns() {
        let entries: Vec<_> = (0..600).map(entry_with_id).collect();
        let truncated = truncate_to_cap(entries, InventoryField::WorldSlimes);
        assert_eq!(truncated.len(), 500);
    }

    #[test]
    fn last_snapshot_fallback_only_applies_on_final_empty_live() {
        let snapshot = vec![entry_with_id(9)];
        assert_eq!(apply_last_snapshot_fallback(vec![], &snapshot, true), snapshot);
        assert!(apply_last_snapshot_fallback(vec![], &snapshot, false).is_empty());
        assert_eq!(apply_last_snapshot_fallback(vec![entry_with_id(1)], &snapshot, true).len(), 1);
    }
}
