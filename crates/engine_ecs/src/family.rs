//! Families: live, incrementally maintained entity queries.
//!
//! A [`Family`] lists the live entities whose component keys include every
//! key of its [`Signature`]. Membership is computed once when the family is
//! created and afterwards only adjusted by deltas: an entity entering or
//! leaving the engine is checked against every family, a component key
//! added to or removed from a live entity is checked against the families
//! whose signature names that key.
//!
//! Families are reference counted per signature. Releasing the last
//! reference while the engine is mid-update defers the teardown to the end
//! of the tick; the family keeps being maintained until then.

use std::collections::{HashMap, HashSet};

use engine_component::{ComponentSet, ComponentTypeId, EntityId, FamilyId, Signature};
use engine_messenger::Messaging;
use tracing::debug;

use crate::error::EcsError;
use crate::messages::{FamilyAdded, FamilyMemberAdded, FamilyMemberRemoved, FamilyRemoved};
use crate::world::{EntityNode, World};

/// A live set of entities matching a signature.
#[derive(Debug, Clone)]
pub struct Family {
    id: FamilyId,
    signature: Signature,
    members: Vec<EntityId>,
    index: HashSet<EntityId>,
}

impl Family {
    fn new(id: FamilyId, signature: Signature) -> Self {
        Self {
            id,
            signature,
            members: Vec::new(),
            index: HashSet::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> FamilyId {
        self.id
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Members in the order they joined.
    #[must_use]
    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.index.contains(&entity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn matches(&self, node: &EntityNode) -> bool {
        self.signature.is_satisfied_by(|key| node.has_component(key))
    }

    fn insert(&mut self, entity: EntityId) -> bool {
        if !self.index.insert(entity) {
            return false;
        }
        self.members.push(entity);
        true
    }

    fn remove(&mut self, entity: EntityId) -> bool {
        if !self.index.remove(&entity) {
            return false;
        }
        if let Some(position) = self.members.iter().position(|&e| e == entity) {
            self.members.remove(position);
        }
        true
    }
}

/// A membership change produced by the family manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FamilyEvent {
    Joined(FamilyId, EntityId),
    Left(FamilyId, EntityId),
}

/// Outcome of releasing one reference to a family.
#[derive(Debug)]
pub(crate) enum Release {
    Missing,
    Retained,
    Deferred,
    Removed(Family),
}

/// Reference-counted registry of families.
#[derive(Debug, Default)]
pub struct FamilyManager {
    families: HashMap<FamilyId, Family>,
    order: Vec<FamilyId>,
    by_signature: HashMap<Signature, FamilyId>,
    references: HashMap<FamilyId, usize>,
    by_component: HashMap<ComponentTypeId, Vec<FamilyId>>,
    pending: Vec<FamilyId>,
}

impl FamilyManager {
    /// Look up a family.
    #[must_use]
    pub fn get(&self, id: FamilyId) -> Option<&Family> {
        self.families.get(&id)
    }

    /// Look up the family registered for `signature`.
    #[must_use]
    pub fn by_signature(&self, signature: &Signature) -> Option<&Family> {
        self.families.get(self.by_signature.get(signature)?)
    }

    /// Outstanding references to a family.
    #[must_use]
    pub fn references(&self, id: FamilyId) -> usize {
        self.references.get(&id).copied().unwrap_or(0)
    }

    /// Families in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Family> + '_ {
        self.order.iter().filter_map(|id| self.families.get(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Take another reference to an existing family.
    pub(crate) fn acquire(&mut self, signature: &Signature) -> Option<FamilyId> {
        let id = *self.by_signature.get(signature)?;
        let references = self.references.entry(id).or_insert(0);
        *references += 1;
        if *references == 1 {
            self.pending.retain(|&p| p != id);
        }
        Some(id)
    }

    /// Register a new family and back-fill it from `live`.
    pub(crate) fn create(
        &mut self,
        id: FamilyId,
        signature: Signature,
        live: &[EntityId],
        nodes: &HashMap<EntityId, EntityNode>,
    ) {
        let mut family = Family::new(id, signature.clone());
        for &entity in live {
            if nodes.get(&entity).is_some_and(|node| family.matches(node)) {
                family.insert(entity);
            }
        }
        for key in signature.iter() {
            self.by_component.entry(key).or_default().push(id);
        }
        self.by_signature.insert(signature, id);
        self.references.insert(id, 1);
        self.order.push(id);
        self.families.insert(id, family);
    }

    /// Drop one reference to the family for `signature`.
    pub(crate) fn release(&mut self, signature: &Signature, defer: bool) -> Release {
        let Some(&id) = self.by_signature.get(signature) else {
            return Release::Missing;
        };
        let references = self.references.entry(id).or_insert(0);
        if *references == 0 {
            return Release::Missing;
        }
        *references -= 1;
        if *references > 0 {
            return Release::Retained;
        }
        if defer {
            self.pending.push(id);
            return Release::Deferred;
        }
        match self.unregister(id) {
            Some(family) => Release::Removed(family),
            None => Release::Missing,
        }
    }

    /// Tear down every deferred family still without references.
    pub(crate) fn finalize_pending(&mut self) -> Vec<Family> {
        let pending = std::mem::take(&mut self.pending);
        let mut removed = Vec::new();
        for id in pending {
            if self.references(id) > 0 {
                continue;
            }
            if let Some(family) = self.unregister(id) {
                removed.push(family);
            }
        }
        removed
    }

    /// Tear down every family regardless of references.
    pub(crate) fn clear(&mut self) -> Vec<Family> {
        let order = std::mem::take(&mut self.order);
        let families = order
            .into_iter()
            .filter_map(|id| self.families.remove(&id))
            .collect();
        self.by_signature.clear();
        self.references.clear();
        self.by_component.clear();
        self.pending.clear();
        families
    }

    fn unregister(&mut self, id: FamilyId) -> Option<Family> {
        let family = self.families.remove(&id)?;
        self.order.retain(|&f| f != id);
        self.by_signature.remove(&family.signature);
        self.references.remove(&id);
        for key in family.signature.iter() {
            if let Some(ids) = self.by_component.get_mut(&key) {
                ids.retain(|&f| f != id);
                if ids.is_empty() {
                    self.by_component.remove(&key);
                }
            }
        }
        Some(family)
    }

    /// Check a newly live entity against every family.
    pub(crate) fn entity_added(
        &mut self,
        entity: EntityId,
        nodes: &HashMap<EntityId, EntityNode>,
    ) -> Vec<FamilyEvent> {
        let Some(node) = nodes.get(&entity) else {
            return Vec::new();
        };
        let mut events = Vec::new();
        for id in &self.order {
            if let Some(family) = self.families.get_mut(id) {
                if family.matches(node) && family.insert(entity) {
                    events.push(FamilyEvent::Joined(*id, entity));
                }
            }
        }
        events
    }

    /// Drop an entity that is no longer live from every family.
    pub(crate) fn entity_removed(&mut self, entity: EntityId) -> Vec<FamilyEvent> {
        let mut events = Vec::new();
        for id in &self.order {
            if let Some(family) = self.families.get_mut(id) {
                if family.remove(entity) {
                    events.push(FamilyEvent::Left(*id, entity));
                }
            }
        }
        events
    }

    /// Re-check the families naming `key` after it was added to `entity`.
    pub(crate) fn component_added(
        &mut self,
        entity: EntityId,
        key: ComponentTypeId,
        nodes: &HashMap<EntityId, EntityNode>,
    ) -> Vec<FamilyEvent> {
        let (Some(ids), Some(node)) = (self.by_component.get(&key), nodes.get(&entity)) else {
            return Vec::new();
        };
        let mut events = Vec::new();
        for id in ids {
            if let Some(family) = self.families.get_mut(id) {
                if !family.contains(entity) && family.matches(node) && family.insert(entity) {
                    events.push(FamilyEvent::Joined(*id, entity));
                }
            }
        }
        events
    }

    /// Re-check the families naming `key` after it was removed from
    /// `entity`.
    pub(crate) fn component_removed(
        &mut self,
        entity: EntityId,
        key: ComponentTypeId,
        nodes: &HashMap<EntityId, EntityNode>,
    ) -> Vec<FamilyEvent> {
        let Some(ids) = self.by_component.get(&key) else {
            return Vec::new();
        };
        let mut events = Vec::new();
        for id in ids {
            if let Some(family) = self.families.get_mut(id) {
                let still_matches = nodes.get(&entity).is_some_and(|node| family.matches(node));
                if family.contains(entity) && !still_matches && family.remove(entity) {
                    events.push(FamilyEvent::Left(*id, entity));
                }
            }
        }
        events
    }
}

impl World {
    /// Take a reference to the family for `signature`, creating and
    /// back-filling it on first request.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NoEngine`] if no engine is attached.
    pub fn add_family(&mut self, signature: Signature) -> Result<FamilyId, EcsError> {
        let engine = self.engine.as_mut().ok_or(EcsError::NoEngine)?;
        if let Some(id) = engine.families.acquire(&signature) {
            return Ok(id);
        }
        let id: FamilyId = self.ids.allocate();
        engine
            .families
            .create(id, signature.clone(), engine.entities.entities(), &self.entities);
        let members = engine.families.get(id).map_or(0, Family::len);
        debug!(family = %id, keys = signature.len(), members, "family created");
        self.dispatch(&FamilyAdded { family: id, signature });
        Ok(id)
    }

    /// [`World::add_family`] for a statically known component set.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NoEngine`] if no engine is attached.
    pub fn add_family_of<S: ComponentSet>(&mut self) -> Result<FamilyId, EcsError> {
        self.add_family(Signature::of::<S>())
    }

    /// Release one reference to the family for `signature`.
    ///
    /// Returns `false` if no such family is referenced.
    pub fn remove_family(&mut self, signature: &Signature) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };
        let defer = engine.is_updating();
        match engine.families.release(signature, defer) {
            Release::Missing => false,
            Release::Retained => true,
            Release::Deferred => {
                debug!(keys = signature.len(), "family removal deferred to end of tick");
                true
            }
            Release::Removed(family) => {
                self.announce_family_removed(family);
                true
            }
        }
    }

    /// [`World::remove_family`] for a statically known component set.
    pub fn remove_family_of<S: ComponentSet>(&mut self) -> bool {
        self.remove_family(&Signature::of::<S>())
    }

    /// Look up a family.
    #[must_use]
    pub fn family(&self, id: FamilyId) -> Option<&Family> {
        self.engine.as_ref()?.families().get(id)
    }

    /// Look up the family registered for `signature`.
    #[must_use]
    pub fn family_by_signature(&self, signature: &Signature) -> Option<&Family> {
        self.engine.as_ref()?.families().by_signature(signature)
    }

    /// Returns `true` if the family for `signature` holds references.
    #[must_use]
    pub fn has_family(&self, signature: &Signature) -> bool {
        self.family_by_signature(signature).is_some_and(|family| {
            self.engine
                .as_ref()
                .is_some_and(|engine| engine.families().references(family.id()) > 0)
        })
    }

    /// A copy of a family's current members, safe to iterate while mutating
    /// the world.
    #[must_use]
    pub fn family_members(&self, id: FamilyId) -> Vec<EntityId> {
        self.family(id)
            .map(|family| family.members().to_vec())
            .unwrap_or_default()
    }

    pub(crate) fn announce_family_removed(&mut self, family: Family) {
        debug!(family = %family.id, "family removed");
        self.dispatch(&FamilyRemoved {
            family: family.id,
            signature: family.signature,
        });
    }

    pub(crate) fn dispatch_family_events(&mut self, events: Vec<FamilyEvent>) {
        for event in events {
            match event {
                FamilyEvent::Joined(family, entity) => {
                    self.dispatch(&FamilyMemberAdded { family, entity });
                }
                FamilyEvent::Left(family, entity) => {
                    self.dispatch(&FamilyMemberRemoved { family, entity });
                }
            }
        }
    }
}
