//! Notifications dispatched through the world's messenger.
//!
//! Every structural change publishes one of these after the change is in
//! place. The engine's own bookkeeping listens to the hierarchy, name and
//! component messages at [`i32::MIN`] priority, so by the time a user
//! listener sees them the entity and family indexes are already updated.

use engine_component::{ComponentId, ComponentTypeId, EntityId, FamilyId, Signature, SystemId};

use crate::system::TimeStep;

// ── Hierarchy ───────────────────────────────────────────────────────────────

/// `child` was inserted into `parent`'s children at `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildAdded {
    pub parent: EntityId,
    pub child: EntityId,
    pub index: usize,
}

/// `child` was taken out of `parent`'s children from `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRemoved {
    pub parent: EntityId,
    pub child: EntityId,
    pub index: usize,
}

/// An entity's parent reference changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentChanged {
    pub entity: EntityId,
    pub previous: Option<EntityId>,
    pub current: Option<EntityId>,
}

/// An entity's global name changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameChanged {
    pub entity: EntityId,
    pub previous: String,
    pub current: String,
}

/// An entity was destroyed and its handle is no longer valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDisposed {
    pub entity: EntityId,
}

// ── Components ──────────────────────────────────────────────────────────────

/// `component` was registered on `entity` under `key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentAdded {
    pub entity: EntityId,
    pub component: ComponentId,
    pub key: ComponentTypeId,
}

/// `component` was unregistered from `entity` under `key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRemoved {
    pub entity: EntityId,
    pub component: ComponentId,
    pub key: ComponentTypeId,
}

/// A component instance was torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDisposed {
    pub component: ComponentId,
    pub type_name: &'static str,
}

// ── Engine index ────────────────────────────────────────────────────────────

/// An entity became live in the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityAdded {
    pub entity: EntityId,
}

/// An entity stopped being live in the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRemoved {
    pub entity: EntityId,
}

// ── Families ────────────────────────────────────────────────────────────────

/// A family was constructed and back-filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyAdded {
    pub family: FamilyId,
    pub signature: Signature,
}

/// A family's last reference was released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyRemoved {
    pub family: FamilyId,
    pub signature: Signature,
}

/// `entity` joined `family`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyMemberAdded {
    pub family: FamilyId,
    pub entity: EntityId,
}

/// `entity` left `family`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyMemberRemoved {
    pub family: FamilyId,
    pub entity: EntityId,
}

// ── Systems ─────────────────────────────────────────────────────────────────

/// A system was constructed and scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemAdded {
    pub system: SystemId,
    pub name: &'static str,
}

/// A system's last reference was released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemRemoved {
    pub system: SystemId,
    pub name: &'static str,
}

/// A scheduled system moved to a new priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPriorityChanged {
    pub system: SystemId,
    pub previous: i32,
    pub current: i32,
}

/// The engine entered or left a fixed/variable pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStateChanged {
    pub previous: TimeStep,
    pub current: TimeStep,
}
