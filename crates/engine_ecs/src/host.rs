//! Component host operations.
//!
//! A component instance lives in the world's arena and is registered on one
//! or more entities ("managers") under a type key. The key is normally the
//! component's own concrete key but may be any capability key; an entity
//! holds at most one component per key.
//!
//! Exclusive components accept a single manager. Shareable ones accept any
//! number, in a caller-controlled order. When the last manager goes away and
//! the component's auto-dispose flag is set, the instance is torn down.

use engine_component::{AnyComponent, Component, ComponentId, ComponentOptions, ComponentTypeId, EntityId};
use engine_messenger::Messaging;
use tracing::{debug, trace};

use crate::error::EcsError;
use crate::messages::{ComponentAdded, ComponentDisposed, ComponentRemoved};
use crate::world::{ComponentHost, World};

impl World {
    // ── Creation and attachment ─────────────────────────────────────────

    /// Create a component instance with no managers.
    pub fn create_component<T: Component>(&mut self, value: T, options: ComponentOptions) -> ComponentId {
        self.insert_component(Box::new(value), options)
    }

    pub(crate) fn insert_component(
        &mut self,
        data: Box<dyn AnyComponent>,
        options: ComponentOptions,
    ) -> ComponentId {
        let id: ComponentId = self.ids.allocate();
        self.concrete_types
            .insert(data.concrete_type(), data.concrete_name());
        trace!(component = %id, kind = data.concrete_name(), shareable = options.shareable, "created component");
        self.components.insert(
            id,
            ComponentHost {
                options,
                managers: Vec::new(),
                data,
            },
        );
        id
    }

    /// Create an exclusive, auto-disposing component and register it on
    /// `entity` under its concrete key, replacing any component already
    /// registered there.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownEntity`] if `entity` does not exist.
    pub fn add_component<T: Component>(&mut self, entity: EntityId, value: T) -> Result<ComponentId, EcsError> {
        self.add_component_with(entity, value, ComponentOptions::default())
    }

    /// Like [`World::add_component`], with explicit ownership options.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownEntity`] if `entity` does not exist.
    pub fn add_component_with<T: Component>(
        &mut self,
        entity: EntityId,
        value: T,
        options: ComponentOptions,
    ) -> Result<ComponentId, EcsError> {
        self.node(entity)?;
        let component = self.create_component(value, options);
        self.add_manager(component, entity, None, None)?;
        Ok(component)
    }

    /// Register an existing component on `entity` under `key` (its concrete
    /// key when `None`).
    ///
    /// # Errors
    ///
    /// See [`World::add_manager`].
    pub fn attach_component(
        &mut self,
        component: ComponentId,
        entity: EntityId,
        key: Option<ComponentTypeId>,
    ) -> Result<bool, EcsError> {
        self.add_manager(component, entity, key, None)
    }

    /// Register `component` on `entity` under `key`, inserting `entity` into
    /// the manager list at `index` (appended when `None`).
    ///
    /// Re-registering the same component on the same entity and key is a
    /// no-op that returns `Ok(false)`; with an `index` it only repositions
    /// the manager. A different component already under `key` is removed
    /// first.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnknownEntity`] / [`EcsError::UnknownComponent`]
    /// - [`EcsError::TypeMismatch`] if `key` is the concrete key of another
    ///   component type
    /// - [`EcsError::ComponentNotShareable`] if the component is exclusive and
    ///   managed by another entity
    /// - [`EcsError::IndexOutOfRange`] if `index` is past the manager list
    pub fn add_manager(
        &mut self,
        component: ComponentId,
        entity: EntityId,
        key: Option<ComponentTypeId>,
        index: Option<usize>,
    ) -> Result<bool, EcsError> {
        self.node(entity)?;
        let host = self
            .components
            .get(&component)
            .ok_or(EcsError::UnknownComponent(component))?;

        let concrete = host.data.concrete_type();
        let key = key.unwrap_or(concrete);
        if key != concrete {
            if let Some(&expected) = self.concrete_types.get(&key) {
                return Err(EcsError::TypeMismatch {
                    key,
                    expected,
                    found: host.data.concrete_name(),
                });
            }
        }

        let managing = host.managers.contains(&entity);
        if !managing && !host.options.shareable {
            if let Some(&owner) = host.managers.first() {
                return Err(EcsError::ComponentNotShareable { component, owner });
            }
        }
        if let Some(index) = index {
            let len = if managing {
                host.managers.len() - 1
            } else {
                host.managers.len()
            };
            if index > len {
                return Err(EcsError::IndexOutOfRange { index, len });
            }
        }

        if let Some(index) = index {
            if managing {
                self.set_manager_index(component, entity, index);
            }
        }

        let occupant = self.node(entity)?.components.get(&key).copied();
        match occupant {
            Some(existing) if existing == component => return Ok(false),
            Some(_) => {
                self.remove_component_key(entity, key);
            }
            None => {}
        }

        // Removal listeners may have touched the world; look up again.
        self.node(entity)?;
        let host = self
            .components
            .get_mut(&component)
            .ok_or(EcsError::UnknownComponent(component))?;
        if !host.managers.contains(&entity) {
            let at = index.unwrap_or(host.managers.len()).min(host.managers.len());
            host.managers.insert(at, entity);
        }
        self.node_mut(entity)?.components.insert(key, component);

        trace!(entity = %entity, component = %component, key = %key, "component added");
        self.dispatch(&ComponentAdded {
            entity,
            component,
            key,
        });
        Ok(true)
    }

    // ── Removal ─────────────────────────────────────────────────────────

    /// Unregister whatever component `entity` holds under `T`'s key.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> Option<ComponentId> {
        self.remove_component_key(entity, T::component_type_id())
    }

    /// Unregister whatever component `entity` holds under `key`.
    ///
    /// The entity stops managing the component once no key of the entity
    /// refers to it any more.
    pub fn remove_component_key(&mut self, entity: EntityId, key: ComponentTypeId) -> Option<ComponentId> {
        let node = self.entities.get_mut(&entity)?;
        let component = node.components.remove(&key)?;
        let still_managing = node.components.values().any(|&c| c == component);
        if !still_managing {
            if let Some(host) = self.components.get_mut(&component) {
                host.managers.retain(|&e| e != entity);
            }
        }
        self.dispatch(&ComponentRemoved {
            entity,
            component,
            key,
        });
        if !still_managing {
            self.dispose_if_orphaned(component);
        }
        Some(component)
    }

    /// Unregister `component` from `entity` under every key it holds there.
    ///
    /// Returns `false` if `entity` does not manage `component`.
    pub fn remove_manager(&mut self, component: ComponentId, entity: EntityId) -> bool {
        let Some(node) = self.entities.get_mut(&entity) else {
            return false;
        };
        let keys: Vec<ComponentTypeId> = node
            .components
            .iter()
            .filter(|&(_, &c)| c == component)
            .map(|(&key, _)| key)
            .collect();
        if keys.is_empty() {
            return false;
        }
        for key in &keys {
            node.components.remove(key);
        }
        if let Some(host) = self.components.get_mut(&component) {
            host.managers.retain(|&e| e != entity);
        }
        for key in keys {
            self.dispatch(&ComponentRemoved {
                entity,
                component,
                key,
            });
        }
        self.dispose_if_orphaned(component);
        true
    }

    /// Remove the manager at `index`.
    pub fn remove_manager_at(&mut self, component: ComponentId, index: usize) -> Option<EntityId> {
        let entity = *self.managers(component).get(index)?;
        self.remove_manager(component, entity).then_some(entity)
    }

    /// Remove every manager of `component`, last first. Returns how many were
    /// removed.
    pub fn remove_managers(&mut self, component: ComponentId) -> usize {
        let managers: Vec<EntityId> = self.managers(component).iter().rev().copied().collect();
        managers
            .into_iter()
            .filter(|&entity| self.remove_manager(component, entity))
            .count()
    }

    /// Unregister every component of `entity`. Returns how many distinct
    /// components were released.
    pub fn remove_components(&mut self, entity: EntityId) -> usize {
        let Some(node) = self.entities.get(&entity) else {
            return 0;
        };
        let mut components: Vec<ComponentId> = node.components.values().copied().collect();
        components.sort_unstable();
        components.dedup();
        components
            .into_iter()
            .filter(|&component| self.remove_manager(component, entity))
            .count()
    }

    fn dispose_if_orphaned(&mut self, component: ComponentId) {
        let orphaned = self
            .components
            .get(&component)
            .is_some_and(|host| host.managers.is_empty() && host.options.auto_dispose);
        if orphaned {
            self.dispose_component(component);
        }
    }

    /// Tear a component down: unregister it from every manager, run its
    /// disposal hook and drop it from the world.
    ///
    /// Returns `false` if the component does not exist.
    pub fn dispose_component(&mut self, component: ComponentId) -> bool {
        let Some(host) = self.components.get(&component) else {
            return false;
        };
        let managers = host.managers.clone();
        let mut unlinked = Vec::new();
        for entity in managers {
            let Some(node) = self.entities.get_mut(&entity) else {
                continue;
            };
            let keys: Vec<ComponentTypeId> = node
                .components
                .iter()
                .filter(|&(_, &c)| c == component)
                .map(|(&key, _)| key)
                .collect();
            for key in keys {
                node.components.remove(&key);
                unlinked.push((entity, key));
            }
        }
        let Some(mut host) = self.components.remove(&component) else {
            return false;
        };
        for (entity, key) in unlinked {
            self.dispatch(&ComponentRemoved {
                entity,
                component,
                key,
            });
        }
        host.data.dispose();
        let type_name = host.data.concrete_name();
        debug!(component = %component, kind = type_name, "component disposed");
        self.dispatch(&ComponentDisposed {
            component,
            type_name,
        });
        true
    }

    // ── Manager ordering ────────────────────────────────────────────────

    /// Managing entities of `component` in order. Empty if unknown.
    #[must_use]
    pub fn managers(&self, component: ComponentId) -> &[EntityId] {
        self.components
            .get(&component)
            .map(|host| host.managers.as_slice())
            .unwrap_or(&[])
    }

    /// Returns `true` if `entity` manages `component`.
    #[must_use]
    pub fn has_manager(&self, component: ComponentId, entity: EntityId) -> bool {
        self.managers(component).contains(&entity)
    }

    /// Position of `entity` in `component`'s manager list.
    #[must_use]
    pub fn manager_index(&self, component: ComponentId, entity: EntityId) -> Option<usize> {
        self.managers(component).iter().position(|&e| e == entity)
    }

    /// Swap the managers at two positions.
    pub fn swap_managers(&mut self, component: ComponentId, i: usize, j: usize) -> bool {
        let Some(host) = self.components.get_mut(&component) else {
            return false;
        };
        if i >= host.managers.len() || j >= host.managers.len() {
            return false;
        }
        host.managers.swap(i, j);
        true
    }

    /// Swap the positions of two managing entities.
    pub fn swap_manager_entities(&mut self, component: ComponentId, a: EntityId, b: EntityId) -> bool {
        match (self.manager_index(component, a), self.manager_index(component, b)) {
            (Some(i), Some(j)) => self.swap_managers(component, i, j),
            _ => false,
        }
    }

    /// Move a managing entity to `index`.
    pub fn set_manager_index(&mut self, component: ComponentId, entity: EntityId, index: usize) -> bool {
        let Some(host) = self.components.get_mut(&component) else {
            return false;
        };
        let Some(current) = host.managers.iter().position(|&e| e == entity) else {
            return false;
        };
        if index >= host.managers.len() {
            return false;
        }
        let moved = host.managers.remove(current);
        host.managers.insert(index, moved);
        true
    }

    /// Change a component's auto-dispose flag. Enabling it on a component
    /// without managers disposes it immediately.
    ///
    /// Returns `false` if the component does not exist or the flag is
    /// unchanged.
    pub fn set_component_auto_dispose(&mut self, component: ComponentId, auto_dispose: bool) -> bool {
        let Some(host) = self.components.get_mut(&component) else {
            return false;
        };
        if host.options.auto_dispose == auto_dispose {
            return false;
        }
        host.options.auto_dispose = auto_dispose;
        self.dispose_if_orphaned(component);
        true
    }

    // ── Lookup ──────────────────────────────────────────────────────────

    /// The component registered on `entity` under `key`.
    #[must_use]
    pub fn component_id(&self, entity: EntityId, key: ComponentTypeId) -> Option<ComponentId> {
        self.entities.get(&entity)?.components.get(&key).copied()
    }

    /// Returns `true` if `entity` has a component under `key`.
    #[must_use]
    pub fn has_component_key(&self, entity: EntityId, key: ComponentTypeId) -> bool {
        self.component_id(entity, key).is_some()
    }

    /// Returns `true` if `entity` has a component under `T`'s key.
    #[must_use]
    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        self.has_component_key(entity, T::component_type_id())
    }

    /// Typed access to a component instance.
    #[must_use]
    pub fn component_value<T: Component>(&self, component: ComponentId) -> Option<&T> {
        self.components.get(&component)?.data.downcast_ref::<T>()
    }

    /// Typed mutable access to a component instance.
    pub fn component_value_mut<T: Component>(&mut self, component: ComponentId) -> Option<&mut T> {
        self.components.get_mut(&component)?.data.downcast_mut::<T>()
    }

    /// The `T` registered on `entity` under `T`'s own key.
    #[must_use]
    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.get_component_as(entity, T::component_type_id())
    }

    /// The `T` registered on `entity` under `key`.
    #[must_use]
    pub fn get_component_as<T: Component>(&self, entity: EntityId, key: ComponentTypeId) -> Option<&T> {
        let component = self.component_id(entity, key)?;
        self.component_value(component)
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let component = self.component_id(entity, T::component_type_id())?;
        self.component_value_mut(component)
    }

    /// The nearest strict ancestor of `entity` holding a `T`.
    #[must_use]
    pub fn ancestor_component<T: Component>(&self, entity: EntityId) -> Option<(EntityId, ComponentId)> {
        let key = T::component_type_id();
        self.ancestors(entity)
            .into_iter()
            .find_map(|ancestor| Some((ancestor, self.component_id(ancestor, key)?)))
    }

    /// Every strict descendant of `entity` holding a `T`, in pre-order.
    #[must_use]
    pub fn descendant_components<T: Component>(&self, entity: EntityId) -> Vec<(EntityId, ComponentId)> {
        let key = T::component_type_id();
        self.descendants(entity)
            .into_iter()
            .filter_map(|descendant| Some((descendant, self.component_id(descendant, key)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Health(u32);
    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Armor(u32);
    impl Component for Armor {
        fn type_name() -> &'static str {
            "Armor"
        }
    }

    thread_local! {
        static DISPOSED: Cell<u32> = const { Cell::new(0) };
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Tracked;
    impl Component for Tracked {
        fn type_name() -> &'static str {
            "Tracked"
        }

        fn on_dispose(&mut self) {
            DISPOSED.with(|d| d.set(d.get() + 1));
        }
    }

    const DAMAGEABLE: ComponentTypeId = ComponentTypeId::from_name("Damageable");

    #[test]
    fn test_add_and_get_component() {
        let mut world = World::new();
        let e = world.spawn("e");
        let c = world.add_component(e, Health(10)).unwrap();

        assert_eq!(world.get_component::<Health>(e), Some(&Health(10)));
        assert_eq!(world.managers(c), &[e]);
        world.get_component_mut::<Health>(e).unwrap().0 = 3;
        assert_eq!(world.component_value::<Health>(c), Some(&Health(3)));
        assert!(world.has_component::<Health>(e));
        assert!(!world.has_component::<Armor>(e));
    }

    #[test]
    fn test_add_component_to_unknown_entity() {
        let mut world = World::new();
        let err = world
            .add_component(EntityId::from_raw(99), Health(1))
            .unwrap_err();
        assert!(matches!(err, EcsError::UnknownEntity(_)));
        assert_eq!(world.component_count(), 0);
    }

    #[test]
    fn test_exclusive_component_rejects_second_manager() {
        let mut world = World::new();
        let a = world.spawn("a");
        let b = world.spawn("b");
        let c = world.add_component(a, Health(1)).unwrap();

        let err = world.attach_component(c, b, None).unwrap_err();
        assert!(matches!(err, EcsError::ComponentNotShareable { owner, .. } if owner == a));
        assert_eq!(world.managers(c), &[a]);
        assert!(!world.has_component::<Health>(b));
    }

    #[test]
    fn test_re_adding_same_pair_is_idempotent() {
        let mut world = World::new();
        let a = world.spawn("a");
        let c = world.add_component(a, Health(1)).unwrap();
        assert!(!world.attach_component(c, a, None).unwrap());
        assert_eq!(world.managers(c), &[a]);
    }

    #[test]
    fn test_shareable_component_counts_managers() {
        let mut world = World::new();
        let entities: Vec<EntityId> = (0..4).map(|i| world.spawn(format!("e{i}"))).collect();
        let c = world.create_component(Health(5), ComponentOptions::SHAREABLE);
        for &e in &entities {
            world.attach_component(c, e, None).unwrap();
        }
        assert_eq!(world.managers(c).len(), 4);
        assert_eq!(world.managers(c), entities.as_slice());
    }

    #[test]
    fn test_manager_insertion_index() {
        let mut world = World::new();
        let a = world.spawn("a");
        let b = world.spawn("b");
        let d = world.spawn("d");
        let c = world.create_component(Health(5), ComponentOptions::SHAREABLE);
        world.add_manager(c, a, None, None).unwrap();
        world.add_manager(c, b, None, Some(0)).unwrap();
        assert_eq!(world.managers(c), &[b, a]);
        assert!(matches!(
            world.add_manager(c, d, None, Some(3)),
            Err(EcsError::IndexOutOfRange { index: 3, len: 2 })
        ));
        world.add_manager(c, a, None, Some(0)).unwrap();
        assert_eq!(world.managers(c), &[a, b]);
    }

    #[test]
    fn test_capability_key_and_type_mismatch() {
        let mut world = World::new();
        let e = world.spawn("e");
        let c = world.create_component(Health(1), ComponentOptions::EXCLUSIVE);
        world.add_component(e, Armor(2)).unwrap();

        world.attach_component(c, e, Some(DAMAGEABLE)).unwrap();
        assert_eq!(world.get_component_as::<Health>(e, DAMAGEABLE), Some(&Health(1)));
        assert!(!world.has_component::<Health>(e));

        let other = world.spawn("other");
        let h = world.create_component(Health(1), ComponentOptions::EXCLUSIVE);
        let err = world
            .attach_component(h, other, Some(Armor::component_type_id()))
            .unwrap_err();
        assert!(matches!(err, EcsError::TypeMismatch { expected: "Armor", found: "Health", .. }));
    }

    #[test]
    fn test_multiple_keys_share_one_manager_slot() {
        let mut world = World::new();
        let e = world.spawn("e");
        let c = world.add_component(e, Health(1)).unwrap();
        world.attach_component(c, e, Some(DAMAGEABLE)).unwrap();
        assert_eq!(world.managers(c), &[e]);

        world.remove_component::<Health>(e);
        assert_eq!(world.managers(c), &[e]);
        assert!(world.component(c).is_some());

        world.remove_component_key(e, DAMAGEABLE);
        assert!(world.component(c).is_none());
    }

    #[test]
    fn test_replacing_key_releases_previous_component() {
        let mut world = World::new();
        let e = world.spawn("e");
        let first = world.add_component(e, Health(1)).unwrap();
        let second = world.add_component(e, Health(2)).unwrap();
        assert!(world.component(first).is_none());
        assert_eq!(world.component_id(e, Health::component_type_id()), Some(second));
    }

    #[test]
    fn test_last_manager_removal_disposes() {
        DISPOSED.with(|d| d.set(0));
        let mut world = World::new();
        let a = world.spawn("a");
        let b = world.spawn("b");
        let c = world.create_component(Tracked, ComponentOptions::SHAREABLE);
        world.attach_component(c, a, None).unwrap();
        world.attach_component(c, b, None).unwrap();

        assert!(world.remove_manager(c, a));
        assert!(!world.remove_manager(c, a));
        assert_eq!(DISPOSED.with(Cell::get), 0);
        assert!(world.remove_manager(c, b));
        assert_eq!(DISPOSED.with(Cell::get), 1);
        assert!(world.component(c).is_none());
    }

    #[test]
    fn test_auto_dispose_off_keeps_orphan() {
        let mut world = World::new();
        let a = world.spawn("a");
        let c = world.create_component(Health(1), ComponentOptions::EXCLUSIVE.with_auto_dispose(false));
        world.attach_component(c, a, None).unwrap();
        world.remove_manager(c, a);
        assert!(world.component(c).is_some());
        assert!(world.managers(c).is_empty());

        assert!(world.set_component_auto_dispose(c, true));
        assert!(world.component(c).is_none());
    }

    #[test]
    fn test_dispose_component_unlinks_managers() {
        let mut world = World::new();
        let a = world.spawn("a");
        let b = world.spawn("b");
        let c = world.create_component(Health(1), ComponentOptions::SHAREABLE);
        world.attach_component(c, a, None).unwrap();
        world.attach_component(c, b, Some(DAMAGEABLE)).unwrap();

        let removed = Rc::new(Cell::new(0));
        let counter = Rc::clone(&removed);
        world
            .messenger_mut()
            .add_listener(0, move |_: &mut World, _: &ComponentRemoved| counter.set(counter.get() + 1));

        assert!(world.dispose_component(c));
        assert_eq!(removed.get(), 2);
        assert!(!world.has_component::<Health>(a));
        assert!(!world.has_component_key(b, DAMAGEABLE));
        assert!(!world.dispose_component(c));
    }

    #[test]
    fn test_swap_and_reorder_managers() {
        let mut world = World::new();
        let a = world.spawn("a");
        let b = world.spawn("b");
        let d = world.spawn("d");
        let c = world.create_component(Health(1), ComponentOptions::SHAREABLE);
        for e in [a, b, d] {
            world.attach_component(c, e, None).unwrap();
        }
        assert!(world.swap_managers(c, 0, 2));
        assert_eq!(world.managers(c), &[d, b, a]);
        assert!(world.swap_manager_entities(c, d, b));
        assert_eq!(world.managers(c), &[b, d, a]);
        assert!(world.set_manager_index(c, a, 0));
        assert_eq!(world.managers(c), &[a, b, d]);

        let stranger = world.spawn("x");
        assert!(!world.swap_manager_entities(c, a, stranger));
        assert!(!world.swap_managers(c, 0, 3));
        assert!(!world.set_manager_index(c, stranger, 0));
        assert_eq!(world.managers(c), &[a, b, d]);
    }

    #[test]
    fn test_remove_manager_at_and_remove_managers() {
        let mut world = World::new();
        let a = world.spawn("a");
        let b = world.spawn("b");
        let c = world.create_component(Health(1), ComponentOptions::SHAREABLE.with_auto_dispose(false));
        world.attach_component(c, a, None).unwrap();
        world.attach_component(c, b, None).unwrap();

        assert_eq!(world.remove_manager_at(c, 1), Some(b));
        assert_eq!(world.remove_manager_at(c, 1), None);
        world.attach_component(c, b, None).unwrap();
        assert_eq!(world.remove_managers(c), 2);
        assert!(world.component(c).is_some());
    }

    #[test]
    fn test_ancestor_and_descendant_components() {
        let mut world = World::new();
        let root = world.spawn("root");
        let mid = world.spawn("mid");
        let leaf = world.spawn("leaf");
        world.add_child(root, mid).unwrap();
        world.add_child(mid, leaf).unwrap();
        let rc = world.add_component(root, Health(1)).unwrap();
        let lc = world.add_component(leaf, Health(2)).unwrap();

        assert_eq!(world.ancestor_component::<Health>(leaf), Some((root, rc)));
        assert_eq!(world.ancestor_component::<Health>(root), None);
        assert_eq!(world.descendant_components::<Health>(root), vec![(leaf, lc)]);
    }

    #[test]
    fn test_despawn_releases_components() {
        let mut world = World::new();
        let a = world.spawn("a");
        let b = world.spawn("b");
        let owned = world.add_component(a, Health(1)).unwrap();
        let shared = world.create_component(Armor(1), ComponentOptions::SHAREABLE);
        world.attach_component(shared, a, None).unwrap();
        world.attach_component(shared, b, None).unwrap();

        world.despawn(a);
        assert!(world.component(owned).is_none());
        assert_eq!(world.managers(shared), &[b]);
    }
}
