//! Runtime error types.

use engine_component::{ComponentId, ComponentTypeId, EntityId, RegistryError};

/// Errors returned by fallible world and engine operations.
///
/// Every operation that returns one of these has been rejected before any
/// state changed.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist in this world.
    #[error("entity {0} not found")]
    UnknownEntity(EntityId),

    /// The component instance does not exist in this world.
    #[error("component {0} not found")]
    UnknownComponent(ComponentId),

    /// The engine must be attached to an entity without a parent.
    #[error("engine must be attached to a root entity; {0} has a parent")]
    NotRoot(EntityId),

    /// The world already hosts an engine.
    #[error("an engine is already attached to this world")]
    EngineAlreadyAttached,

    /// The operation needs an attached engine.
    #[error("no engine is attached to this world")]
    NoEngine,

    /// The operation is not allowed while the engine is updating.
    #[error("engine is mid-update")]
    EngineBusy,

    /// The key is the concrete key of a different component type.
    #[error("key {key} belongs to component type '{expected}', not '{found}'")]
    TypeMismatch {
        key: ComponentTypeId,
        expected: &'static str,
        found: &'static str,
    },

    /// The component is exclusive and already has a manager.
    #[error("component {component} is exclusive and already attached to {owner}")]
    ComponentNotShareable {
        component: ComponentId,
        owner: EntityId,
    },

    /// The requested edge would make an entity its own ancestor.
    #[error("{child} cannot become a child of {parent}: cycle")]
    HierarchyCycle { parent: EntityId, child: EntityId },

    /// An insertion index past the end of the target list.
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// An engine configuration value is out of range.
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),

    /// Neither the injected factory nor the descriptor can build the system.
    #[error("no constructor available for system '{0}'")]
    NoConstructor(&'static str),

    /// Component decoding through the registry failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A snapshot is structurally invalid.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// MessagePack encoding failed.
    #[error("failed to encode msgpack: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding failed.
    #[error("failed to decode msgpack: {0}")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),
}
