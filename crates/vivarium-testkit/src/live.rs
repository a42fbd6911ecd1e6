// SPDX-License-Identifier: Apache-2.0
//! In-memory [`LiveWorldPort`] fake for serializer/growth-engine tests.

use std::collections::HashMap;
use vivarium_core::{EntityId, EntityKind, LiveAttrs, LiveWorldPort, Pose, UserId};

#[derive(Clone)]
struct LiveEntity {
    owner: UserId,
    attrs: LiveAttrs,
    pose: Option<Pose>,
}

/// A live world with no concrete engine behind it: entities are plain maps.
/// `spawn` always succeeds; there is no parent-lock failure mode to
/// exercise here (see `vivarium-stage`'s own fakes for that).
#[derive(Default)]
pub struct FakeLiveWorld {
    entities: HashMap<(EntityKind, EntityId), LiveEntity>,
}

impl FakeLiveWorld {
    /// An empty world.
    #[must_use]
    pub fn new() -> Self {
        Self { entities: HashMap::new() }
    }

    /// Directly seed a live entity, bypassing `spawn`, for test setup.
    pub fn seed(
        &mut self,
        kind: EntityKind,
        owner: UserId,
        id: EntityId,
        attrs: LiveAttrs,
        pose: Option<Pose>,
    ) {
        self.entities.insert((kind, id), LiveEntity { owner, attrs, pose });
    }

    /// Whether an entity is currently live.
    #[must_use]
    pub fn contains(&self, kind: EntityKind, id: EntityId) -> bool {
        self.entities.contains_key(&(kind, id))
    }

    /// Number of live entities of any kind.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the world holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl LiveWorldPort for FakeLiveWorld {
    fn entities_for_owner(&self, kind: EntityKind, owner: UserId) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|((k, _), e)| *k == kind && e.owner == owner)
            .map(|((_, id), _)| *id)
            .collect()
    }

    fn read_attrs(&self, kind: EntityKind, id: EntityId) -> Option<LiveAttrs> {
        self.entities.get(&(kind, id)).map(|e| e.attrs.clone())
    }

    fn write_attrs(&mut self, kind: EntityKind, id: EntityId, attrs: LiveAttrs) {
        if let Some(e) = self.entities.get_mut(&(kind, id)) {
            e.attrs = attrs;
        }
    }

    fn read_pose(&self, kind: EntityKind, id: EntityId) -> Option<Pose> {
        self.entities.get(&(kind, id)).and_then(|e| e.pose)
    }

    fn write_pose(&mut self, kind: EntityKind, id: EntityId, pose: Pose) {
        if let Some(e) = self.entities.get_mut(&(kind, id)) {
            if kind.is_world_placed() {
                e.pose = Some(pose);
            }
        }
    }

    fn spawn(
        &mut self,
        kind: EntityKind,
        owner: UserId,
        id: EntityId,
        _template: &str,
        attrs: LiveAttrs,
        pose: Option<Pose>,
    ) -> EntityId {
        self.entities.insert((kind, id), LiveEntity { owner, attrs, pose });
        id
    }

    fn destroy(&mut self, kind: EntityKind, id: EntityId) {
        self.entities.remove(&(kind, id));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use vivarium_core::AttrValue;

    #[test]
    fn spawn_then_read_round_trips_attrs() {
        let mut world = FakeLiveWorld::new();
        let owner = UserId::new(7);
        let id = EntityId::from(vivarium_core::SlimeId::new(1));
        let mut attrs = LiveAttrs::new();
        attrs.insert("gp".into(), AttrValue::Float(0.5));
        world.spawn(EntityKind::WorldSlime, owner, id, "slime_template", attrs.clone(), None);
        assert_eq!(world.read_attrs(EntityKind::WorldSlime, id), Some(attrs));
    }

    #[test]
    fn entities_for_owner_filters_by_kind_and_owner() {
        let mut world = FakeLiveWorld::new();
        let owner = UserId::new(1);
        let other = UserId::new(2);
        let id_a = EntityId::from(vivarium_core::SlimeId::new(1));
        let id_b = EntityId::from(vivarium_core::SlimeId::new(2));
        world.spawn(EntityKind::WorldSlime, owner, id_a, "t", LiveAttrs::new(), None);
        world.spawn(EntityKind::WorldSlime, other, id_b, "t", LiveAttrs::new(), None);
        let found = world.entities_for_owner(EntityKind::WorldSlime, owner);
        assert_eq!(found, vec![id_a]);
    }

    #[test]
    fn destroy_removes_entity() {
        let mut world = FakeLiveWorld::new();
        let id = EntityId::from(vivarium_core::EggId::new(9));
        world.spawn(EntityKind::WorldEgg, UserId::new(1), id, "t", LiveAttrs::new(), None);
        assert!(world.contains(EntityKind::WorldEgg, id));
        world.destroy(EntityKind::WorldEgg, id);
        assert!(!world.contains(EntityKind::WorldEgg, id));
    }
}
