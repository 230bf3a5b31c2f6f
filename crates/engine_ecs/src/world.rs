//! The world context: entity and component arenas plus the messenger.
//!
//! A [`World`] owns every entity node and component instance it creates,
//! addressed by id handles that are never reused. Hierarchy, component host,
//! family and system operations are implemented on `World` in their own
//! modules; this module holds the storage, naming and read accessors.
//!
//! At most one [`Engine`] is attached to a world at a time. Without an
//! engine the world is a plain hierarchy: nothing is indexed by name, no
//! families are maintained and [`World::update`] does nothing.

use std::collections::{BTreeMap, HashMap};

use engine_component::{AnyComponent, ComponentId, ComponentOptions, ComponentTypeId, EntityId, IdAllocator};
use engine_messenger::{Messaging, Messenger};
use tracing::trace;
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::EcsError;
use crate::messages::NameChanged;

/// One node of the entity hierarchy.
#[derive(Debug, Clone)]
pub struct EntityNode {
    pub(crate) name: String,
    pub(crate) parent: Option<EntityId>,
    pub(crate) children: Vec<EntityId>,
    pub(crate) components: BTreeMap<ComponentTypeId, ComponentId>,
    pub(crate) auto_dispose: bool,
}

impl EntityNode {
    fn new(name: String) -> Self {
        Self {
            name,
            parent: None,
            children: Vec::new(),
            components: BTreeMap::new(),
            auto_dispose: true,
        }
    }

    /// The entity's global name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parent entity, if any.
    #[must_use]
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Children in order.
    #[must_use]
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    /// Registered components, keyed by type key in ascending order.
    pub fn components(&self) -> impl Iterator<Item = (ComponentTypeId, ComponentId)> + '_ {
        self.components.iter().map(|(&key, &id)| (key, id))
    }

    /// Returns `true` if a component is registered under `key`.
    #[must_use]
    pub fn has_component(&self, key: ComponentTypeId) -> bool {
        self.components.contains_key(&key)
    }

    /// Whether the entity is destroyed when removed from its parent.
    #[must_use]
    pub fn auto_dispose(&self) -> bool {
        self.auto_dispose
    }
}

/// A component instance and the entities currently managing it.
#[derive(Debug)]
pub struct ComponentHost {
    pub(crate) options: ComponentOptions,
    pub(crate) managers: Vec<EntityId>,
    pub(crate) data: Box<dyn AnyComponent>,
}

impl ComponentHost {
    /// Ownership settings.
    #[must_use]
    pub fn options(&self) -> ComponentOptions {
        self.options
    }

    /// Managing entities in order.
    #[must_use]
    pub fn managers(&self) -> &[EntityId] {
        &self.managers
    }

    /// The component data.
    #[must_use]
    pub fn data(&self) -> &dyn AnyComponent {
        self.data.as_ref()
    }

    /// The concrete type's name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.data.concrete_name()
    }
}

/// Generate a fresh global name.
pub(crate) fn unique_name() -> String {
    format!("entity-{}", Uuid::new_v4().simple())
}

/// Arena of entities and components, and the context every listener and
/// system receives.
pub struct World {
    pub(crate) ids: IdAllocator,
    pub(crate) entities: HashMap<EntityId, EntityNode>,
    pub(crate) components: HashMap<ComponentId, ComponentHost>,
    /// Concrete type keys seen so far, used to reject mistyped registrations.
    pub(crate) concrete_types: HashMap<ComponentTypeId, &'static str>,
    pub(crate) messenger: Messenger<World>,
    pub(crate) engine: Option<Engine>,
}

impl World {
    /// Create an empty world without an engine.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: IdAllocator::new(),
            entities: HashMap::new(),
            components: HashMap::new(),
            concrete_types: HashMap::new(),
            messenger: Messenger::new(),
            engine: None,
        }
    }

    // ── Entities ────────────────────────────────────────────────────────

    /// Create a free-standing entity.
    pub fn spawn(&mut self, name: impl Into<String>) -> EntityId {
        let id: EntityId = self.ids.allocate();
        let node = EntityNode::new(name.into());
        trace!(entity = %id, name = %node.name, "spawned entity");
        self.entities.insert(id, node);
        id
    }

    /// Create a free-standing entity with a generated name.
    pub fn spawn_unnamed(&mut self) -> EntityId {
        self.spawn(unique_name())
    }

    /// Returns `true` if `entity` exists in this world.
    #[must_use]
    pub fn contains_entity(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Look up an entity node.
    #[must_use]
    pub fn entity(&self, entity: EntityId) -> Option<&EntityNode> {
        self.entities.get(&entity)
    }

    /// Returns the number of entities in the world, managed or not.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub(crate) fn node(&self, entity: EntityId) -> Result<&EntityNode, EcsError> {
        self.entities
            .get(&entity)
            .ok_or(EcsError::UnknownEntity(entity))
    }

    pub(crate) fn node_mut(&mut self, entity: EntityId) -> Result<&mut EntityNode, EcsError> {
        self.entities
            .get_mut(&entity)
            .ok_or(EcsError::UnknownEntity(entity))
    }

    /// The entity's name.
    #[must_use]
    pub fn name(&self, entity: EntityId) -> Option<&str> {
        self.entities.get(&entity).map(EntityNode::name)
    }

    /// Rename an entity.
    ///
    /// Returns `false` if the entity does not exist, already has this name,
    /// or is managed by the engine while another managed entity holds the
    /// name.
    pub fn set_name(&mut self, entity: EntityId, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.is_managed(entity)
            && self
                .entity_by_name(&name)
                .is_some_and(|holder| holder != entity)
        {
            return false;
        }
        let Some(node) = self.entities.get_mut(&entity) else {
            return false;
        };
        if node.name == name {
            return false;
        }
        let previous = std::mem::replace(&mut node.name, name.clone());
        self.dispatch(&NameChanged {
            entity,
            previous,
            current: name,
        });
        true
    }

    /// Find a managed entity by its global name.
    ///
    /// Only entities indexed by the attached engine are searchable.
    #[must_use]
    pub fn entity_by_name(&self, name: &str) -> Option<EntityId> {
        self.engine.as_ref()?.entities().get(name)
    }

    /// Whether the entity is destroyed when removed from its parent.
    #[must_use]
    pub fn entity_auto_dispose(&self, entity: EntityId) -> Option<bool> {
        self.entities.get(&entity).map(EntityNode::auto_dispose)
    }

    /// Set the entity's auto-dispose flag. Returns `false` if unchanged.
    pub fn set_entity_auto_dispose(&mut self, entity: EntityId, auto_dispose: bool) -> bool {
        match self.entities.get_mut(&entity) {
            Some(node) if node.auto_dispose != auto_dispose => {
                node.auto_dispose = auto_dispose;
                true
            }
            _ => false,
        }
    }

    // ── Components ──────────────────────────────────────────────────────

    /// Look up a component host.
    #[must_use]
    pub fn component(&self, component: ComponentId) -> Option<&ComponentHost> {
        self.components.get(&component)
    }

    /// Returns the number of live component instances.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    // ── Engine ──────────────────────────────────────────────────────────

    /// The attached engine, if any.
    #[must_use]
    pub fn engine(&self) -> Option<&Engine> {
        self.engine.as_ref()
    }

    /// The entity the engine is attached to.
    #[must_use]
    pub fn engine_root(&self) -> Option<EntityId> {
        self.engine.as_ref().map(Engine::root)
    }

    /// Returns `true` if the attached engine is mid-update.
    #[must_use]
    pub fn is_updating(&self) -> bool {
        self.engine.as_ref().is_some_and(Engine::is_updating)
    }

    /// Returns `true` if `entity` is indexed by the attached engine.
    #[must_use]
    pub fn is_managed(&self, entity: EntityId) -> bool {
        self.engine
            .as_ref()
            .is_some_and(|engine| engine.entities().contains(entity))
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("components", &self.components.len())
            .field("messenger", &self.messenger)
            .field("engine", &self.engine)
            .finish()
    }
}

impl Messaging for World {
    fn messenger(&self) -> &Messenger<Self> {
        &self.messenger
    }

    fn messenger_mut(&mut self) -> &mut Messenger<Self> {
        &mut self.messenger
    }
}
