//! # engine_component
//!
//! Component identity for the ECS runtime: what a component is, how its type is identified,
//! and how entities, systems and families are addressed.
//!
//! This crate provides:
//!
//! - [`Component`] trait: the contract all component data must satisfy.
//! - [`AnyComponent`]: the object-safe form the runtime stores.
//! - [`ComponentTypeId`]: FNV-1a name hash used as the registration key.
//! - [`EntityId`], [`ComponentId`], [`SystemId`], [`FamilyId`]: handles.
//! - [`Signature`]: the required key set of a family.
//! - [`ComponentRegistry`]: name → decoder table for reconstruction.

pub mod component;
pub mod id;
pub mod registry;
pub mod signature;

pub use component::{AnyComponent, Component, ComponentOptions, ComponentTypeId};
pub use id::{ComponentId, EntityId, FamilyId, IdAllocator, SystemId};
pub use registry::{ComponentInfo, ComponentRegistry, DecodeFn, RegistryError};
pub use signature::{ComponentSet, Signature};
