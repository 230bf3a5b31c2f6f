//! Entity hierarchy operations.
//!
//! Every entity has at most one parent and an ordered, duplicate-free list
//! of children. Structural changes are applied first and announced after,
//! in the order `ChildRemoved` (old parent), `ChildAdded`, `ParentChanged`,
//! so listeners always observe the final shape of the tree.

use engine_component::EntityId;
use engine_messenger::Messaging;
use tracing::{debug, warn};

use crate::error::EcsError;
use crate::messages::{ChildAdded, ChildRemoved, EntityDisposed, ParentChanged};
use crate::world::World;

impl World {
    /// Append `child` to `parent`'s children, detaching it from any previous
    /// parent.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownEntity`] if either entity is missing,
    /// [`EcsError::HierarchyCycle`] if `child` is `parent` or one of its
    /// ancestors, or [`EcsError::EngineBusy`] if `child` is the engine root
    /// and the engine is mid-update.
    pub fn add_child(&mut self, parent: EntityId, child: EntityId) -> Result<(), EcsError> {
        self.insert_child(parent, child, None)
    }

    /// Insert `child` into `parent`'s children at `index`.
    ///
    /// If `child` already belongs to `parent` it is moved to `index`.
    ///
    /// # Errors
    ///
    /// As [`World::add_child`], plus [`EcsError::IndexOutOfRange`].
    pub fn add_child_at(
        &mut self,
        parent: EntityId,
        child: EntityId,
        index: usize,
    ) -> Result<(), EcsError> {
        self.insert_child(parent, child, Some(index))
    }

    fn insert_child(
        &mut self,
        parent: EntityId,
        child: EntityId,
        index: Option<usize>,
    ) -> Result<(), EcsError> {
        let len = self.node(parent)?.children.len();
        let old_parent = self.node(child)?.parent;
        if parent == child || self.is_ancestor(child, parent) {
            return Err(EcsError::HierarchyCycle { parent, child });
        }

        if old_parent == Some(parent) {
            let index = index.unwrap_or(len - 1);
            if index >= len {
                return Err(EcsError::IndexOutOfRange { index, len });
            }
            self.set_child_index(parent, child, index);
            return Ok(());
        }

        let index = index.unwrap_or(len);
        if index > len {
            return Err(EcsError::IndexOutOfRange { index, len });
        }

        // The engine must live on a root entity.
        if self.engine_root() == Some(child) {
            if self.is_updating() {
                return Err(EcsError::EngineBusy);
            }
            debug!(root = %child, parent = %parent, "engine root gained a parent; detaching engine");
            self.detach_engine()?;
        }

        let old_index = old_parent.and_then(|old| self.unlink_child(old, child));
        self.node_mut(parent)?.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);

        if let (Some(old), Some(old_index)) = (old_parent, old_index) {
            self.dispatch(&ChildRemoved {
                parent: old,
                child,
                index: old_index,
            });
        }
        self.dispatch(&ChildAdded {
            parent,
            child,
            index,
        });
        self.dispatch(&ParentChanged {
            entity: child,
            previous: old_parent,
            current: Some(parent),
        });
        Ok(())
    }

    /// Remove `child` from `parent`'s children list, returning its index.
    fn unlink_child(&mut self, parent: EntityId, child: EntityId) -> Option<usize> {
        let children = &mut self.entities.get_mut(&parent)?.children;
        let index = children.iter().position(|&c| c == child)?;
        children.remove(index);
        if let Some(node) = self.entities.get_mut(&child) {
            node.parent = None;
        }
        Some(index)
    }

    /// Detach `entity` from its parent without destroying it.
    fn detach(&mut self, entity: EntityId) -> bool {
        let Some(parent) = self.entities.get(&entity).and_then(|node| node.parent) else {
            return false;
        };
        let Some(index) = self.unlink_child(parent, entity) else {
            return false;
        };
        self.dispatch(&ChildRemoved {
            parent,
            child: entity,
            index,
        });
        self.dispatch(&ParentChanged {
            entity,
            previous: Some(parent),
            current: None,
        });
        true
    }

    /// Remove `child` from `parent`. The child is despawned if its
    /// auto-dispose flag is set.
    ///
    /// Returns `false` if `child` is not a child of `parent`.
    pub fn remove_child(&mut self, parent: EntityId, child: EntityId) -> bool {
        if self.parent(child) != Some(parent) {
            return false;
        }
        self.detach(child);
        if self.entity_auto_dispose(child) == Some(true) {
            self.despawn(child);
        }
        true
    }

    /// Remove the child at `index`. See [`World::remove_child`].
    pub fn remove_child_at(&mut self, parent: EntityId, index: usize) -> Option<EntityId> {
        let child = *self.children(parent).get(index)?;
        self.remove_child(parent, child).then_some(child)
    }

    /// Remove every child of `parent`, last first. Returns how many were
    /// removed.
    pub fn remove_children(&mut self, parent: EntityId) -> usize {
        let children: Vec<EntityId> = self.children(parent).iter().rev().copied().collect();
        children
            .into_iter()
            .filter(|&child| self.remove_child(parent, child))
            .count()
    }

    /// Re-parent `child`, or detach it (without destroying it) when `parent`
    /// is `None`.
    ///
    /// # Errors
    ///
    /// As [`World::add_child`].
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> Result<(), EcsError> {
        match parent {
            Some(parent) => self.add_child(parent, child),
            None => {
                self.node(child)?;
                self.detach(child);
                Ok(())
            }
        }
    }

    /// The parent of `entity`.
    #[must_use]
    pub fn parent(&self, entity: EntityId) -> Option<EntityId> {
        self.entities.get(&entity)?.parent
    }

    /// Children of `entity` in order. Empty if the entity is unknown.
    #[must_use]
    pub fn children(&self, entity: EntityId) -> &[EntityId] {
        self.entities
            .get(&entity)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Position of `child` in `parent`'s children.
    #[must_use]
    pub fn child_index(&self, parent: EntityId, child: EntityId) -> Option<usize> {
        self.children(parent).iter().position(|&c| c == child)
    }

    /// Move `child` to `index` within `parent`'s children.
    ///
    /// Returns `false` if `child` is not a child of `parent` or `index` is
    /// out of range.
    pub fn set_child_index(&mut self, parent: EntityId, child: EntityId, index: usize) -> bool {
        let Some(node) = self.entities.get_mut(&parent) else {
            return false;
        };
        let Some(current) = node.children.iter().position(|&c| c == child) else {
            return false;
        };
        if index >= node.children.len() {
            return false;
        }
        let moved = node.children.remove(current);
        node.children.insert(index, moved);
        true
    }

    /// Swap the positions of two children.
    pub fn swap_children(&mut self, parent: EntityId, a: EntityId, b: EntityId) -> bool {
        match (self.child_index(parent, a), self.child_index(parent, b)) {
            (Some(i), Some(j)) => self.swap_children_at(parent, i, j),
            _ => false,
        }
    }

    /// Swap the children at two positions.
    pub fn swap_children_at(&mut self, parent: EntityId, i: usize, j: usize) -> bool {
        let Some(node) = self.entities.get_mut(&parent) else {
            return false;
        };
        if i >= node.children.len() || j >= node.children.len() {
            return false;
        }
        node.children.swap(i, j);
        true
    }

    /// The topmost ancestor of `entity`, or `entity` itself if it has no
    /// parent.
    #[must_use]
    pub fn root(&self, entity: EntityId) -> Option<EntityId> {
        let mut current = entity;
        self.entities.get(&current)?;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        Some(current)
    }

    /// Returns `true` if `ancestor` is a strict ancestor of `entity`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: EntityId, entity: EntityId) -> bool {
        let mut current = self.parent(entity);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }

    /// Strict ancestors of `entity`, nearest first.
    #[must_use]
    pub fn ancestors(&self, entity: EntityId) -> Vec<EntityId> {
        let mut ancestors = Vec::new();
        let mut current = self.parent(entity);
        while let Some(parent) = current {
            ancestors.push(parent);
            current = self.parent(parent);
        }
        ancestors
    }

    /// Strict descendants of `entity` in pre-order.
    #[must_use]
    pub fn descendants(&self, entity: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut stack: Vec<EntityId> = self.children(entity).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Destroy `entity` and its subtree.
    ///
    /// The entity is detached from its parent first, then every node of the
    /// subtree is destroyed children-first, releasing its components. If
    /// `entity` is the engine root the engine is detached first.
    ///
    /// Returns `false` if the entity does not exist or is the root of an
    /// engine that is mid-update.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        if !self.entities.contains_key(&entity) {
            return false;
        }
        if self.engine_root() == Some(entity) {
            if let Err(err) = self.detach_engine() {
                warn!(entity = %entity, error = %err, "cannot despawn engine root");
                return false;
            }
        }
        self.detach(entity);
        self.destroy_tree(entity);
        true
    }

    fn destroy_tree(&mut self, entity: EntityId) {
        let children = self.children(entity).to_vec();
        for child in children.into_iter().rev() {
            self.destroy_tree(child);
        }
        self.remove_components(entity);
        if self.entities.remove(&entity).is_some() {
            debug!(entity = %entity, "entity disposed");
            self.dispatch(&EntityDisposed { entity });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn tree() -> (World, EntityId, EntityId, EntityId) {
        let mut world = World::new();
        let root = world.spawn("root");
        let a = world.spawn("a");
        let b = world.spawn("b");
        world.add_child(root, a).unwrap();
        world.add_child(root, b).unwrap();
        (world, root, a, b)
    }

    #[test]
    fn test_add_child_links_both_ways() {
        let (world, root, a, b) = tree();
        assert_eq!(world.children(root), &[a, b]);
        assert_eq!(world.parent(a), Some(root));
        assert_eq!(world.root(b), Some(root));
        assert_eq!(world.child_index(root, b), Some(1));
    }

    #[test]
    fn test_add_child_at_inserts_in_position() {
        let (mut world, root, a, b) = tree();
        let c = world.spawn("c");
        world.add_child_at(root, c, 0).unwrap();
        assert_eq!(world.children(root), &[c, a, b]);
    }

    #[test]
    fn test_add_child_at_out_of_range() {
        let (mut world, root, _, _) = tree();
        let c = world.spawn("c");
        let err = world.add_child_at(root, c, 5).unwrap_err();
        assert!(matches!(err, EcsError::IndexOutOfRange { index: 5, len: 2 }));
        assert_eq!(world.parent(c), None);
    }

    #[test]
    fn test_reparent_detaches_from_old_parent() {
        let (mut world, root, a, b) = tree();
        world.add_child(a, b).unwrap();
        assert_eq!(world.children(root), &[a]);
        assert_eq!(world.children(a), &[b]);
        assert_eq!(world.parent(b), Some(a));
    }

    #[test]
    fn test_reparent_message_order() {
        let (mut world, _root, a, b) = tree();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l1 = Rc::clone(&log);
        let l2 = Rc::clone(&log);
        let l3 = Rc::clone(&log);
        world
            .messenger_mut()
            .add_listener(0, move |_: &mut World, _: &ChildRemoved| l1.borrow_mut().push("removed"));
        world
            .messenger_mut()
            .add_listener(0, move |_: &mut World, _: &ChildAdded| l2.borrow_mut().push("added"));
        world
            .messenger_mut()
            .add_listener(0, move |_: &mut World, _: &ParentChanged| l3.borrow_mut().push("parent"));

        world.add_child(a, b).unwrap();
        assert_eq!(*log.borrow(), vec!["removed", "added", "parent"]);
    }

    #[test]
    fn test_re_adding_same_child_moves_it() {
        let (mut world, root, a, b) = tree();
        world.add_child_at(root, b, 0).unwrap();
        assert_eq!(world.children(root), &[b, a]);
    }

    #[test]
    fn test_cycle_rejected() {
        let (mut world, root, a, _) = tree();
        let err = world.add_child(a, root).unwrap_err();
        assert!(matches!(err, EcsError::HierarchyCycle { .. }));
        assert!(matches!(
            world.add_child(a, a),
            Err(EcsError::HierarchyCycle { .. })
        ));
        assert_eq!(world.parent(root), None);
    }

    #[test]
    fn test_remove_child_despawns_auto_dispose() {
        let (mut world, root, a, b) = tree();
        world.set_entity_auto_dispose(b, false);

        assert!(world.remove_child(root, a));
        assert!(!world.contains_entity(a));

        assert!(world.remove_child(root, b));
        assert!(world.contains_entity(b));
        assert_eq!(world.parent(b), None);

        assert!(!world.remove_child(root, b));
    }

    #[test]
    fn test_remove_child_at_and_remove_children() {
        let (mut world, root, a, b) = tree();
        assert_eq!(world.remove_child_at(root, 1), Some(b));
        assert_eq!(world.remove_child_at(root, 3), None);
        let c = world.spawn("c");
        world.add_child(root, c).unwrap();
        assert_eq!(world.remove_children(root), 2);
        assert!(world.children(root).is_empty());
        assert!(!world.contains_entity(a));
    }

    #[test]
    fn test_set_parent_none_keeps_entity() {
        let (mut world, root, a, _) = tree();
        world.set_parent(a, None).unwrap();
        assert!(world.contains_entity(a));
        assert_eq!(world.child_index(root, a), None);
    }

    #[test]
    fn test_swap_and_set_index() {
        let (mut world, root, a, b) = tree();
        let c = world.spawn("c");
        world.add_child(root, c).unwrap();

        assert!(world.swap_children(root, a, c));
        assert_eq!(world.children(root), &[c, b, a]);
        assert!(world.set_child_index(root, a, 0));
        assert_eq!(world.children(root), &[a, c, b]);
        assert!(!world.set_child_index(root, a, 3));
        assert!(!world.swap_children_at(root, 0, 9));
        let stranger = world.spawn("x");
        assert!(!world.swap_children(root, a, stranger));
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let (mut world, root, a, b) = tree();
        let a1 = world.spawn("a1");
        let a2 = world.spawn("a2");
        world.add_child(a, a1).unwrap();
        world.add_child(a1, a2).unwrap();

        assert_eq!(world.ancestors(a2), vec![a1, a, root]);
        assert_eq!(world.descendants(root), vec![a, a1, a2, b]);
        assert!(world.is_ancestor(root, a2));
        assert!(!world.is_ancestor(a2, root));
    }

    #[test]
    fn test_despawn_destroys_subtree() {
        let (mut world, root, a, b) = tree();
        let a1 = world.spawn("a1");
        world.add_child(a, a1).unwrap();

        let disposed = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&disposed);
        world
            .messenger_mut()
            .add_listener(0, move |_: &mut World, m: &EntityDisposed| sink.borrow_mut().push(m.entity));

        assert!(world.despawn(a));
        assert_eq!(*disposed.borrow(), vec![a1, a]);
        assert_eq!(world.children(root), &[b]);
        assert!(!world.despawn(a));
    }
}
