// SPDX-License-Identifier: Apache-2.0
//! Ports onto the live game world (§6, §9 "Dynamic attribute bags").
//!
//! `LiveWorldPort` is the sole surface [`crate`]'s serializer and growth
//! engine use to read/write live-entity attributes and poses. The concrete
//! engine (out of scope, §1) implements this trait; tests and the admin
//! tooling use `vivarium-testkit`'s in-memory implementation.
//!
//! Per Design Note §9, each entity class is modeled with a small attribute
//! bag rather than full dynamic typing — the short-key projection is the
//! serialization contract (see `vivarium-serialize`), not the in-memory
//! shape used here.

use crate::entry::AttrValue;
use crate::ids::{EntityId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A live entity's attribute bag. Same value representation as
/// [`crate::entry::InventoryEntry`] so translation in `vivarium-serialize`
/// is a pure relabeling rather than a type conversion.
pub type LiveAttrs = BTreeMap<String, AttrValue>;

/// Which of the five sub-serializer kinds (§4.C) an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Live world pet.
    WorldSlime,
    /// Placed, unhatched egg.
    WorldEgg,
    /// Feed tool.
    FoodTool,
    /// Unplaced egg tool.
    EggTool,
    /// Captured pet (tool representation).
    CapturedSlime,
}

impl EntityKind {
    /// Whether entities of this kind have a spatial pose (world entities
    /// only; tools sitting in a backpack do not).
    #[must_use]
    pub const fn is_world_placed(self) -> bool {
        matches!(self, EntityKind::WorldSlime | EntityKind::WorldEgg)
    }
}

/// A world position, absolute and (optionally) relative to the owning
/// plot's origin part (§4.C "Spatial encoding").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Absolute world-space position.
    pub absolute: [f64; 3],
    /// Position relative to the owning plot's origin, when a plot origin
    /// exists. Restore prefers this over `absolute` when present.
    pub local: Option<[f64; 3]>,
}

impl Pose {
    /// An origin-relative pose convenience constructor.
    #[must_use]
    pub const fn with_local(absolute: [f64; 3], local: [f64; 3]) -> Self {
        Self {
            absolute,
            local: Some(local),
        }
    }

    /// An absolute-only pose (no known plot origin).
    #[must_use]
    pub const fn absolute_only(absolute: [f64; 3]) -> Self {
        Self {
            absolute,
            local: None,
        }
    }

    /// The coordinates restore should prefer: local when present, else
    /// absolute (§4.C "Restore prefers local coords when an origin exists;
    /// falls back to absolute").
    #[must_use]
    pub fn preferred(&self) -> [f64; 3] {
        self.local.unwrap_or(self.absolute)
    }
}

/// Read/write/enumerate access to live entities, keyed by [`EntityKind`].
///
/// Absence semantics mirror `echo-cas::BlobStore`: a missing id is not an
/// error, it is the normal "not currently live" state.
pub trait LiveWorldPort: Send + Sync {
    /// All live entity ids of `kind` owned by `owner` (backpack/character
    /// container for tools, the user's placed pets/eggs for world kinds).
    fn entities_for_owner(&self, kind: EntityKind, owner: UserId) -> Vec<EntityId>;

    /// Read an entity's attribute bag. `None` if not currently live.
    fn read_attrs(&self, kind: EntityKind, id: EntityId) -> Option<LiveAttrs>;

    /// Overwrite an entity's attribute bag in place. No-op if not live.
    fn write_attrs(&mut self, kind: EntityKind, id: EntityId, attrs: LiveAttrs);

    /// Read a world entity's pose. `None` for non-world kinds or if not live.
    fn read_pose(&self, kind: EntityKind, id: EntityId) -> Option<Pose>;

    /// Overwrite a world entity's pose in place. No-op if not live or not a
    /// world-placed kind.
    fn write_pose(&mut self, kind: EntityKind, id: EntityId, pose: Pose);

    /// Construct a new live entity from a named template, parented to
    /// `owner`, with the given attributes and (for world kinds) pose.
    /// Returns the constructed entity's id (normally `id`, echoed back for
    /// convenience).
    fn spawn(
        &mut self,
        kind: EntityKind,
        owner: UserId,
        id: EntityId,
        template: &str,
        attrs: LiveAttrs,
        pose: Option<Pose>,
    ) -> EntityId;

    /// Destroy a live entity. No-op if not live.
    fn destroy(&mut self, kind: EntityKind, id: EntityId);
}
