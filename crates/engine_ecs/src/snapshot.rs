//! Snapshots: walking an entity subtree into plain data and back.
//!
//! A [`SceneSnapshot`] holds a tree of [`EntitySnapshot`]s plus one shared
//! component table. Entities refer to components by table index, so a
//! shareable component managed by several entities of the subtree is
//! restored as a single instance with the same managers, in the same order.
//! Each table entry records that order as pre-order indices of the entities
//! in the snapshot; managers outside the subtree are dropped.
//!
//! Traversal depth can be bounded: entities deeper than `max_depth` are
//! omitted entirely (depth 0 keeps only the root).
//!
//! Restoring decodes and validates the whole snapshot before creating
//! anything, so a rejected snapshot leaves the world untouched.

use std::collections::{BTreeMap, HashMap, HashSet};

use engine_component::{
    AnyComponent, ComponentId, ComponentOptions, ComponentRegistry, ComponentTypeId, EntityId,
    Signature, SystemId,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EcsError;
use crate::system::{SystemDescriptor, SystemTypeId, TimeStep};
use crate::world::World;

/// One component instance of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    /// Registered name of the component type.
    pub type_name: String,
    pub options: ComponentOptions,
    pub data: serde_json::Value,
    /// Managing entities in manager order, as pre-order positions in the
    /// snapshot tree. Empty means walk order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub managers: Vec<usize>,
}

/// A component registration on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRef {
    pub key: ComponentTypeId,
    /// Index into [`SceneSnapshot::components`].
    pub component: usize,
}

/// One entity and the part of its subtree within the depth bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub name: String,
    pub auto_dispose: bool,
    pub components: Vec<ComponentRef>,
    pub children: Vec<EntitySnapshot>,
}

/// An entity subtree with its component table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub components: Vec<ComponentSnapshot>,
    pub root: EntitySnapshot,
}

impl SceneSnapshot {
    /// Encode as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Json`] if encoding fails.
    pub fn to_json(&self) -> Result<String, EcsError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Json`] if the text is not a snapshot.
    pub fn from_json(text: &str) -> Result<Self, EcsError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode as MessagePack with named fields.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MsgpackEncode`] if encoding fails.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, EcsError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Decode from MessagePack.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MsgpackDecode`] if the bytes are not a snapshot.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, EcsError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Number of entities in the snapshot.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        fn count(entity: &EntitySnapshot) -> usize {
            1 + entity.children.iter().map(count).sum::<usize>()
        }
        count(&self.root)
    }
}

/// Scheduling state of one system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub name: String,
    pub type_id: SystemTypeId,
    pub priority: i32,
    pub timestep: TimeStep,
    pub sleeping: bool,
}

/// A registered family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilySnapshot {
    pub signature: Signature,
    pub references: usize,
    /// Member names in join order.
    pub members: Vec<String>,
}

struct SnapshotBuilder<'w> {
    world: &'w World,
    max_depth: Option<usize>,
    table: Vec<ComponentSnapshot>,
    slots: HashMap<ComponentId, usize>,
    positions: HashMap<EntityId, usize>,
}

impl SnapshotBuilder<'_> {
    /// Number the entities within the depth bound in pre-order.
    fn number(&mut self, entity: EntityId, depth: usize) {
        let position = self.positions.len();
        self.positions.insert(entity, position);
        let world = self.world;
        if self.max_depth.is_none_or(|max| depth < max) {
            for &child in world.children(entity) {
                self.number(child, depth + 1);
            }
        }
    }

    fn entity(&mut self, entity: EntityId, depth: usize) -> Result<EntitySnapshot, EcsError> {
        let world = self.world;
        let node = world.node(entity)?;
        let mut components = Vec::new();
        for (key, component) in node.components() {
            let slot = match self.slots.get(&component) {
                Some(&slot) => slot,
                None => {
                    let host = world
                        .component(component)
                        .ok_or(EcsError::UnknownComponent(component))?;
                    let slot = self.table.len();
                    let managers = host
                        .managers()
                        .iter()
                        .filter_map(|e| self.positions.get(e).copied())
                        .collect();
                    self.table.push(ComponentSnapshot {
                        type_name: host.type_name().to_string(),
                        options: host.options(),
                        data: host.data().to_value()?,
                        managers,
                    });
                    self.slots.insert(component, slot);
                    slot
                }
            };
            components.push(ComponentRef {
                key,
                component: slot,
            });
        }

        let mut children = Vec::new();
        if self.max_depth.is_none_or(|max| depth < max) {
            for &child in node.children() {
                children.push(self.entity(child, depth + 1)?);
            }
        }

        Ok(EntitySnapshot {
            name: node.name().to_string(),
            auto_dispose: node.auto_dispose(),
            components,
            children,
        })
    }
}

impl World {
    /// Snapshot `entity` and its subtree down to `max_depth` levels below it.
    ///
    /// Components are ordered by first use in a pre-order walk; managers of
    /// shared components outside the walk are not recorded.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownEntity`] if `entity` does not exist, or
    /// [`EcsError::Json`] if a component fails to encode.
    pub fn snapshot_entity(&self, entity: EntityId, max_depth: Option<usize>) -> Result<SceneSnapshot, EcsError> {
        let mut builder = SnapshotBuilder {
            world: self,
            max_depth,
            table: Vec::new(),
            slots: HashMap::new(),
            positions: HashMap::new(),
        };
        self.node(entity)?;
        builder.number(entity, 0);
        let root = builder.entity(entity, 0)?;
        Ok(SceneSnapshot {
            components: builder.table,
            root,
        })
    }

    /// Recreate a snapshot as a new free-standing subtree and return its
    /// root.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Registry`] if a component type is unknown to
    /// `registry` or its data does not decode, and
    /// [`EcsError::InvalidSnapshot`] if the snapshot is inconsistent: a
    /// dangling or unused table entry, an exclusive component used by two
    /// entities, a key used twice on one entity, or a key that is another
    /// type's concrete key.
    pub fn restore_entity(
        &mut self,
        snapshot: &SceneSnapshot,
        registry: &ComponentRegistry,
    ) -> Result<EntityId, EcsError> {
        let decoded: Vec<Box<dyn AnyComponent>> = snapshot
            .components
            .iter()
            .map(|c| registry.decode(&c.type_name, c.data.clone()))
            .collect::<Result<_, _>>()?;
        self.validate_snapshot(snapshot, &decoded)?;

        let mut ids = Vec::with_capacity(decoded.len());
        for (data, component) in decoded.into_iter().zip(&snapshot.components) {
            ids.push(self.insert_component(data, component.options));
        }
        let mut restored = Vec::with_capacity(snapshot.entity_count());
        let root = self.restore_node(&snapshot.root, &ids, &mut restored)?;
        for (component, &id) in snapshot.components.iter().zip(&ids) {
            for (index, &position) in component.managers.iter().enumerate() {
                if let Some(&entity) = restored.get(position) {
                    self.set_manager_index(id, entity, index);
                }
            }
        }
        debug!(root = %root, entities = snapshot.entity_count(), components = ids.len(), "snapshot restored");
        Ok(root)
    }

    fn restore_node(
        &mut self,
        snapshot: &EntitySnapshot,
        ids: &[ComponentId],
        restored: &mut Vec<EntityId>,
    ) -> Result<EntityId, EcsError> {
        let entity = self.spawn(snapshot.name.clone());
        restored.push(entity);
        self.set_entity_auto_dispose(entity, snapshot.auto_dispose);
        for reference in &snapshot.components {
            let component = ids
                .get(reference.component)
                .copied()
                .ok_or_else(|| EcsError::InvalidSnapshot(format!("component index {}", reference.component)))?;
            self.add_manager(component, entity, Some(reference.key), None)?;
        }
        for child in &snapshot.children {
            let child = self.restore_node(child, ids, restored)?;
            self.add_child(entity, child)?;
        }
        Ok(entity)
    }

    fn validate_snapshot(
        &self,
        snapshot: &SceneSnapshot,
        decoded: &[Box<dyn AnyComponent>],
    ) -> Result<(), EcsError> {
        let mut concrete: HashMap<ComponentTypeId, &'static str> = self.concrete_types.clone();
        for data in decoded {
            concrete.insert(data.concrete_type(), data.concrete_name());
        }

        // Component index to the pre-order positions of the entities using it.
        let mut uses: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut stack = vec![&snapshot.root];
        let mut position = 0;
        while let Some(entity) = stack.pop() {
            let mut keys = HashSet::new();
            let mut seen = HashSet::new();
            for reference in &entity.components {
                let data = decoded.get(reference.component).ok_or_else(|| {
                    EcsError::InvalidSnapshot(format!(
                        "entity '{}' refers to missing component {}",
                        entity.name, reference.component
                    ))
                })?;
                if !keys.insert(reference.key) {
                    return Err(EcsError::InvalidSnapshot(format!(
                        "entity '{}' uses key {} twice",
                        entity.name, reference.key
                    )));
                }
                if reference.key != data.concrete_type() {
                    if let Some(&expected) = concrete.get(&reference.key) {
                        return Err(EcsError::TypeMismatch {
                            key: reference.key,
                            expected,
                            found: data.concrete_name(),
                        });
                    }
                }
                if seen.insert(reference.component) {
                    uses.entry(reference.component).or_default().push(position);
                }
            }
            stack.extend(entity.children.iter().rev());
            position += 1;
        }

        for (index, component) in snapshot.components.iter().enumerate() {
            match uses.get(&index) {
                None => {
                    return Err(EcsError::InvalidSnapshot(format!(
                        "component {index} ('{}') is not used",
                        component.type_name
                    )));
                }
                Some(users) if users.len() > 1 && !component.options.shareable => {
                    return Err(EcsError::InvalidSnapshot(format!(
                        "exclusive component {index} ('{}') used by {} entities",
                        component.type_name,
                        users.len()
                    )));
                }
                Some(users) => {
                    if component.managers.is_empty() {
                        continue;
                    }
                    let mut managers = component.managers.clone();
                    managers.sort_unstable();
                    if managers != *users {
                        return Err(EcsError::InvalidSnapshot(format!(
                            "component {index} ('{}') lists managers {:?}, used by {users:?}",
                            component.type_name, component.managers
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Scheduling state of every system, in run order.
    #[must_use]
    pub fn snapshot_systems(&self) -> Vec<SystemSnapshot> {
        self.systems()
            .into_iter()
            .filter_map(|id| self.system(id))
            .map(|record| SystemSnapshot {
                name: record.name().to_string(),
                type_id: record.type_id(),
                priority: record.priority(),
                timestep: record.timestep(),
                sleeping: record.is_sleeping(),
            })
            .collect()
    }

    /// Add the systems of a snapshot, resolving each through `catalog`, and
    /// restore their scheduling state.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidSnapshot`] if a system is missing from
    /// `catalog` (nothing is added in that case), or any error of
    /// [`World::add_system`].
    pub fn restore_systems(
        &mut self,
        snapshots: &[SystemSnapshot],
        catalog: &[SystemDescriptor],
    ) -> Result<Vec<SystemId>, EcsError> {
        let descriptors = snapshots
            .iter()
            .map(|snapshot| {
                catalog
                    .iter()
                    .find(|d| d.type_id() == snapshot.type_id)
                    .copied()
                    .ok_or_else(|| EcsError::InvalidSnapshot(format!("unknown system '{}'", snapshot.name)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut ids = Vec::with_capacity(descriptors.len());
        for (descriptor, snapshot) in descriptors.into_iter().zip(snapshots) {
            let id = self.add_system(descriptor)?;
            self.set_system_priority(id, snapshot.priority);
            self.set_system_timestep(id, snapshot.timestep);
            self.set_system_sleeping(id, snapshot.sleeping);
            ids.push(id);
        }
        Ok(ids)
    }

    /// Every registered family, in creation order.
    #[must_use]
    pub fn snapshot_families(&self) -> Vec<FamilySnapshot> {
        let Some(engine) = self.engine() else {
            return Vec::new();
        };
        engine
            .families()
            .iter()
            .map(|family| FamilySnapshot {
                signature: family.signature().clone(),
                references: engine.families().references(family.id()),
                members: family
                    .members()
                    .iter()
                    .filter_map(|&e| self.name(e).map(str::to_string))
                    .collect(),
            })
            .collect()
    }
}
