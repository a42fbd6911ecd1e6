// SPDX-License-Identifier: Apache-2.0
//! Durable identifiers for users and persisted entries.
//!
//! Every inventory entry and every live entity carries one of these ids
//! (`ToolUniqueId`, `SlimeId`, `EggId`). Ids are immutable once assigned
//! (invariant 1, §3): nothing in this crate ever mints a second id for the
//! same logical entity.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! durable_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Wrap a raw id value.
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// The raw id value.
            #[must_use]
            pub const fn value(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

durable_id!(UserId, "Numeric user id a [`crate::profile::Profile`] is keyed by.");
durable_id!(
    ToolUniqueId,
    "Durable id for a tool entry (egg tool, food tool, or captured-slime tool)."
);
durable_id!(SlimeId, "Durable id for a world or captured pet entry.");
durable_id!(EggId, "Durable id for a placed egg entry.");

/// A durable entity id, unified across the three id spaces for use at the
/// [`crate::live::LiveWorldPort`] boundary. Sub-serializers convert to/from
/// their typed id (`SlimeId`, `EggId`, `ToolUniqueId`) at the edges; the
/// port itself only needs "some u64 identity" regardless of kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl EntityId {
    /// The raw id value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SlimeId> for EntityId {
    fn from(id: SlimeId) -> Self {
        Self(id.0)
    }
}
impl From<EggId> for EntityId {
    fn from(id: EggId) -> Self {
        Self(id.0)
    }
}
impl From<ToolUniqueId> for EntityId {
    fn from(id: ToolUniqueId) -> Self {
        Self(id.0)
    }
}
impl From<EntityId> for SlimeId {
    fn from(id: EntityId) -> Self {
        Self(id.0)
    }
}
impl From<EntityId> for EggId {
    fn from(id: EntityId) -> Self {
        Self(id.0)
    }
}
impl From<EntityId> for ToolUniqueId {
    fn from(id: EntityId) -> Self {
        Self(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_raw_value() {
        assert_eq!(format!("{}", SlimeId::new(42)), "42");
        assert_eq!(format!("{}", EntityId(7)), "7");
    }

    #[test]
    fn round_trips_through_entity_id() {
        let slime = SlimeId::new(9);
        let via_entity: SlimeId = EntityId::from(slime).into();
        assert_eq!(slime, via_entity);
    }

    #[test]
    fn distinct_id_kinds_with_same_value_are_not_interchangeable_types() {
        let slime = SlimeId::new(1);
        let egg = EggId::new(1);
        assert_eq!(slime.value(), egg.value());
        // The point: this compiles only because they are distinct types;
        // there is no `slime == egg` available.
    }
}
