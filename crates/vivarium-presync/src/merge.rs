// SPDX-License-Identifier: Apache-2.0
//! The two per-field merge strategies Pre-Exit Sync applies between a
//! cached profile field and a fresh live-only sweep (§4.F steps 5-6).

use vivarium_core::InventoryEntry;
use std::collections::HashSet;

/// `worldSlimes` merge (§4.F step 5): live entries are authoritative for
/// any id they carry (growth/hunger/pose are continuously mutating and the
/// live value always wins); profile entries for ids no longer live are
/// kept as-is, since the world simply hasn't resampled them this pass.
#[must_use]
pub fn merge_authoritative(profile: &[InventoryEntry], live: &[InventoryEntry], id_keys: &[&str]) -> Vec<InventoryEntry> {
    let live_ids: HashSet<u64> = live.iter().filter_map(|e| e.resolve_id(id_keys)).collect();
    let mut merged: Vec<InventoryEntry> = live.to_vec();
    merged.extend(
        profile
            .iter()
            .filter(|e| !matches!(e.resolve_id(id_keys), Some(id) if live_ids.contains(&id)))
            .cloned(),
    );
    merged
}

/// Conservative merge for the other four fields (§4.F step 6): the
/// profile is authoritative; live only supplies entries for ids the
/// profile doesn't already carry, since live enumeration can miss items
/// that are mid-transit (e.g. being staged by the Preserve/Stage Manager).
#[must_use]
pub fn merge_conservative(profile: &[InventoryEntry], live: &[InventoryEntry], id_keys: &[&str]) -> Vec<InventoryEntry> {
    if profile.is_empty() {
        return live.to_vec();
    }
    if live.is_empty() {
        return profile.to_vec();
    }
    let profile_ids: HashSet<u64> = profile.iter().filter_map(|e| e.resolve_id(id_keys)).collect();
    let mut merged = profile.to_vec();
    merged.extend(
        live.iter()
            .filter(|e| !matches!(e.resolve_id(id_keys), Some(id) if profile_ids.contains(&id)))
            .cloned(),
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use vivarium_core::AttrValue;

    fn entry(id: u64) -> InventoryEntry {
        InventoryEntry::from_pairs([("id", AttrValue::from(id))])
    }

    const IDS: &[&str] = &["id"];

    #[test]
    fn authoritative_merge_prefers_live_for_matching_ids_and_keeps_stale_profile_entries() {
        let profile = vec![entry(1), entry(2)];
        let mut live_one = entry(1);
        live_one.set("gp", 0.9);
        let live = vec![live_one.clone()];

        let merged = merge_authoritative(&profile, &live, IDS);
        assert_eq!(merged.len(), 2);
        assert!(merged.contains(&live_one));
        assert!(merged.contains(&entry(2)));
    }

    #[test]
    fn authoritative_merge_appends_new_live_ids() {
        let profile = vec![entry(1)];
        let live = vec![entry(1), entry(3)];
        let merged = merge_authoritative(&profile, &live, IDS);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn conservative_merge_adopts_live_when_profile_empty() {
        let merged = merge_conservative(&[], &[entry(1)], IDS);
        assert_eq!(merged, vec![entry(1)]);
    }

    #[test]
    fn conservative_merge_keeps_profile_when_live_empty() {
        let profile = vec![entry(1), entry(2)];
        let merged = merge_conservative(&profile, &[], IDS);
        assert_eq!(merged, profile);
    }

    #[test]
    fn conservative_merge_unions_by_id_without_overwriting() {
        let profile = vec![entry(1)];
        let mut live_one = entry(1);
        live_one.set("chg", 7_i64);
        let live = vec![live_one, entry(2)];

        let merged = merge_conservative(&profile, &live, IDS);
        assert_eq!(merged.len(), 2);
        // id 1's profile copy wins untouched, live's extra field is dropped.
        assert!(merged.contains(&entry(1)));
        assert!(merged.contains(&entry(2)));
    }
}
