//! The engine's index of live entities.
//!
//! Every entity in the engine root's subtree is "live": it is listed in
//! attachment order and searchable by its global name. A name is held by at
//! most one live entity. An entity that enters the tree under a name already
//! held is renamed rather than rejected, so attachment never fails on names.
//!
//! Subtrees are indexed parent-first and de-indexed children-first.

use std::collections::{HashMap, HashSet};

use engine_component::EntityId;
use engine_messenger::Messaging;
use tracing::{debug, trace};

use crate::messages::{
    ChildAdded, ChildRemoved, ComponentAdded, ComponentRemoved, EntityAdded, EntityRemoved,
    NameChanged,
};
use crate::world::{World, unique_name};

/// Live entities of an engine, in attachment order and by name.
#[derive(Debug, Default)]
pub struct EntityManager {
    order: Vec<EntityId>,
    live: HashSet<EntityId>,
    by_name: HashMap<String, EntityId>,
}

impl EntityManager {
    /// Returns `true` if `entity` is live.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.live.contains(&entity)
    }

    /// The live entity holding `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<EntityId> {
        self.by_name.get(name).copied()
    }

    /// Live entities in attachment order.
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn insert(&mut self, entity: EntityId, name: &str) {
        self.order.push(entity);
        self.live.insert(entity);
        self.by_name.insert(name.to_string(), entity);
    }

    fn remove(&mut self, entity: EntityId, name: &str) {
        if !self.live.remove(&entity) {
            return;
        }
        if let Some(index) = self.order.iter().position(|&e| e == entity) {
            self.order.remove(index);
        }
        if self.by_name.get(name) == Some(&entity) {
            self.by_name.remove(name);
        }
    }

    fn rename(&mut self, entity: EntityId, previous: &str, current: &str) {
        if !self.live.contains(&entity) {
            return;
        }
        if self.by_name.get(previous) == Some(&entity) {
            self.by_name.remove(previous);
        }
        self.by_name.insert(current.to_string(), entity);
    }
}

impl World {
    /// Index `entity` and its subtree, parent first.
    pub(crate) fn index_tree(&mut self, entity: EntityId) {
        self.index_entity(entity);
        let children = self.children(entity).to_vec();
        for child in children {
            self.index_tree(child);
        }
    }

    fn index_entity(&mut self, entity: EntityId) {
        let Some(name) = self.entities.get(&entity).map(|node| node.name.clone()) else {
            return;
        };
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        if engine.entities.contains(entity) {
            return;
        }

        let name = match engine.entities.get(&name) {
            Some(holder) => {
                let fresh = unique_name();
                debug!(entity = %entity, holder = %holder, name = %name, renamed = %fresh, "name collision; renaming incoming entity");
                if let Some(node) = self.entities.get_mut(&entity) {
                    node.name = fresh.clone();
                }
                engine.entities.insert(entity, &fresh);
                self.dispatch(&NameChanged {
                    entity,
                    previous: name,
                    current: fresh,
                });
                None
            }
            None => {
                engine.entities.insert(entity, &name);
                Some(name)
            }
        };
        trace!(entity = %entity, name = ?name, "entity indexed");

        let World {
            entities, engine, ..
        } = self;
        let events = match engine.as_mut() {
            Some(engine) => engine.families.entity_added(entity, entities),
            None => Vec::new(),
        };
        self.dispatch_family_events(events);
        self.dispatch(&EntityAdded { entity });
    }

    /// De-index `entity` and its subtree, children first.
    pub(crate) fn deindex_tree(&mut self, entity: EntityId) {
        let children = self.children(entity).to_vec();
        for child in children.into_iter().rev() {
            self.deindex_tree(child);
        }
        self.deindex_entity(entity);
    }

    fn deindex_entity(&mut self, entity: EntityId) {
        let name = self
            .entities
            .get(&entity)
            .map(|node| node.name.clone())
            .unwrap_or_default();
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        if !engine.entities.contains(entity) {
            return;
        }
        let events = engine.families.entity_removed(entity);
        engine.entities.remove(entity, &name);
        trace!(entity = %entity, "entity de-indexed");
        self.dispatch_family_events(events);
        self.dispatch(&EntityRemoved { entity });
    }

    // ── Engine bookkeeping listeners ────────────────────────────────────

    pub(crate) fn on_child_added(&mut self, message: &ChildAdded) {
        if self.is_managed(message.parent) && !self.is_managed(message.child) {
            self.index_tree(message.child);
        }
    }

    pub(crate) fn on_child_removed(&mut self, message: &ChildRemoved) {
        if self.is_managed(message.child) && self.root(message.child) != self.engine_root() {
            self.deindex_tree(message.child);
        }
    }

    pub(crate) fn on_name_changed(&mut self, message: &NameChanged) {
        if let Some(engine) = self.engine.as_mut() {
            engine
                .entities
                .rename(message.entity, &message.previous, &message.current);
        }
    }

    pub(crate) fn on_component_added(&mut self, message: &ComponentAdded) {
        let World {
            entities, engine, ..
        } = self;
        let Some(engine) = engine.as_mut() else {
            return;
        };
        if !engine.entities.contains(message.entity) {
            return;
        }
        let events = engine
            .families
            .component_added(message.entity, message.key, entities);
        self.dispatch_family_events(events);
    }

    pub(crate) fn on_component_removed(&mut self, message: &ComponentRemoved) {
        let World {
            entities, engine, ..
        } = self;
        let Some(engine) = engine.as_mut() else {
            return;
        };
        if !engine.entities.contains(message.entity) {
            return;
        }
        let events = engine
            .families
            .component_removed(message.entity, message.key, entities);
        self.dispatch_family_events(events);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::config::EngineConfig;

    fn engine_world() -> (World, EntityId) {
        let mut world = World::new();
        let root = world.spawn("root");
        world.attach_engine(root, EngineConfig::default()).unwrap();
        (world, root)
    }

    fn live(world: &World) -> Vec<EntityId> {
        world
            .engine()
            .map(|engine| engine.entities().entities().to_vec())
            .unwrap_or_default()
    }

    #[test]
    fn test_subtree_indexed_parent_first() {
        let (mut world, root) = engine_world();
        let a = world.spawn("a");
        let a1 = world.spawn("a1");
        let a2 = world.spawn("a2");
        world.add_child(a, a1).unwrap();
        world.add_child(a1, a2).unwrap();

        world.add_child(root, a).unwrap();
        assert_eq!(live(&world), vec![root, a, a1, a2]);
        assert_eq!(world.entity_by_name("a2"), Some(a2));
    }

    #[test]
    fn test_subtree_deindexed_children_first() {
        let (mut world, root) = engine_world();
        let a = world.spawn("a");
        let a1 = world.spawn("a1");
        world.add_child(a, a1).unwrap();
        world.add_child(root, a).unwrap();

        let removed = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&removed);
        world
            .messenger_mut()
            .add_listener(0, move |_: &mut World, m: &EntityRemoved| sink.borrow_mut().push(m.entity));

        world.set_parent(a, None).unwrap();
        assert_eq!(*removed.borrow(), vec![a1, a]);
        assert_eq!(live(&world), vec![root]);
        assert!(world.contains_entity(a1));
    }

    #[test]
    fn test_name_collision_renames_incoming() {
        let (mut world, root) = engine_world();
        let first = world.spawn("twin");
        let second = world.spawn("twin");
        world.add_child(root, first).unwrap();
        world.add_child(root, second).unwrap();

        assert_eq!(live(&world).len(), 3);
        assert_eq!(world.name(first), Some("twin"));
        assert_ne!(world.name(second), Some("twin"));
        assert_eq!(world.entity_by_name("twin"), Some(first));
        let renamed = world.name(second).unwrap().to_string();
        assert_eq!(world.entity_by_name(&renamed), Some(second));
    }

    #[test]
    fn test_move_within_tree_keeps_index() {
        let (mut world, root) = engine_world();
        let a = world.spawn("a");
        let b = world.spawn("b");
        world.add_child(root, a).unwrap();
        world.add_child(root, b).unwrap();

        let events = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&events);
        world
            .messenger_mut()
            .add_listener(0, move |_: &mut World, _: &EntityRemoved| *counter.borrow_mut() += 1);

        world.add_child(a, b).unwrap();
        assert_eq!(*events.borrow(), 0);
        assert!(world.is_managed(b));
    }

    #[test]
    fn test_rename_live_entity_updates_index() {
        let (mut world, root) = engine_world();
        let a = world.spawn("a");
        world.add_child(root, a).unwrap();
        assert!(world.set_name(a, "renamed"));
        assert_eq!(world.entity_by_name("renamed"), Some(a));
        assert_eq!(world.entity_by_name("a"), None);
    }

    #[test]
    fn test_despawn_deindexes() {
        let (mut world, root) = engine_world();
        let a = world.spawn("a");
        world.add_child(root, a).unwrap();
        assert!(world.remove_child(root, a));
        assert!(!world.is_managed(a));
        assert_eq!(world.entity_by_name("a"), None);
        assert_eq!(live(&world), vec![root]);
    }
}
