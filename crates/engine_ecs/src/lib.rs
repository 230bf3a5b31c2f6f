//! # engine_ecs
//!
//! The ECS runtime: a [`World`] of hierarchical entities and shared or
//! exclusive components, and an [`Engine`] attached to one of its root
//! entities that keeps live queries ([`Family`]) and priority-ordered
//! [`System`]s running on a fixed/variable timestep.
//!
//! Everything is single-threaded and synchronous. Structural changes are
//! announced through the world's messenger (see [`messages`]); the engine's
//! own bookkeeping listens at the lowest priority so user listeners always
//! observe consistent indexes.
//!
//! ```rust
//! use engine_ecs::{EngineConfig, World};
//!
//! let mut world = World::new();
//! let root = world.spawn("root");
//! world.attach_engine(root, EngineConfig::default()).unwrap();
//!
//! let player = world.spawn("player");
//! world.add_child(root, player).unwrap();
//! assert_eq!(world.entity_by_name("player"), Some(player));
//!
//! world.update(1.0 / 60.0);
//! ```

pub mod config;
pub mod driver;
pub mod engine;
pub mod entity_manager;
pub mod error;
pub mod family;
pub mod hierarchy;
pub mod host;
pub mod messages;
pub mod scheduler;
pub mod snapshot;
pub mod system;
pub mod world;

pub use config::{EngineConfig, TickConfig};
pub use driver::{Clock, InstantClock, ManualClock, TickDriver};
pub use engine::{Engine, TimeState};
pub use entity_manager::EntityManager;
pub use error::EcsError;
pub use family::{Family, FamilyManager};
pub use scheduler::{Scheduler, SystemRecord};
pub use snapshot::{ComponentRef, ComponentSnapshot, EntitySnapshot, FamilySnapshot, SceneSnapshot, SystemSnapshot};
pub use system::{
    DefaultSystemFactory, FamilySystem, System, SystemDescriptor, SystemFactory, SystemType,
    SystemTypeId, TimeStep,
};
pub use world::{ComponentHost, EntityNode, World};

pub use engine_component as component;
pub use engine_messenger::{ListenerId, Messaging};
