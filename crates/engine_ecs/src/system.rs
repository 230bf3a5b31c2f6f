//! The system contract and how systems are constructed.
//!
//! A system is a unit of per-tick logic. It is scheduled by priority (lower
//! runs first) and runs only in passes matching its [`TimeStep`]. The engine
//! never builds a system itself: it asks a [`SystemFactory`] to turn a
//! [`SystemDescriptor`] into an instance, falling back to the descriptor's
//! own default constructor.

use engine_component::{ComponentTypeId, EntityId, FamilyId, Signature, SystemId};
use serde::{Deserialize, Serialize};

use crate::world::World;

/// When a system is run by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeStep {
    /// Never scheduled; the system only reacts to messages.
    #[default]
    None,
    /// Run once per fixed step.
    Fixed,
    /// Run once per tick.
    Variable,
}

/// Per-tick logic driven by the engine.
pub trait System: 'static {
    /// Initial scheduling priority. Lower runs first.
    fn priority(&self) -> i32 {
        0
    }

    /// Initial timestep classification.
    fn timestep(&self) -> TimeStep {
        TimeStep::Variable
    }

    /// Called once after the system is scheduled. Families are usually
    /// requested here.
    fn added(&mut self, _world: &mut World, _id: SystemId) {}

    /// Called once when the system's last reference is released.
    fn removed(&mut self, _world: &mut World, _id: SystemId) {}

    /// Run one pass. `delta` is the fixed step length in fixed passes and the
    /// clamped frame delta in variable passes.
    fn update(&mut self, world: &mut World, delta: f64);
}

/// A system type with a stable name.
pub trait SystemType: System {
    fn type_name() -> &'static str;
}

/// Stable identifier of a system type, hashed from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemTypeId(pub u64);

impl SystemTypeId {
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        Self(ComponentTypeId::from_name(name).0)
    }

    #[must_use]
    pub fn of<S: SystemType>() -> Self {
        Self::from_name(S::type_name())
    }
}

impl std::fmt::Display for SystemTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SystemType({:#018x})", self.0)
    }
}

fn construct_default<S: System + Default>() -> Box<dyn System> {
    Box::new(S::default())
}

/// Describes a system type to a [`SystemFactory`].
#[derive(Clone, Copy)]
pub struct SystemDescriptor {
    type_id: SystemTypeId,
    name: &'static str,
    default: Option<fn() -> Box<dyn System>>,
}

impl SystemDescriptor {
    /// Describe `S`, constructible through `S::default()`.
    #[must_use]
    pub fn of<S: SystemType + Default>() -> Self {
        Self {
            type_id: SystemTypeId::of::<S>(),
            name: S::type_name(),
            default: Some(construct_default::<S>),
        }
    }

    /// Describe a system known only by name. Only a factory can build it.
    #[must_use]
    pub fn named(name: &'static str) -> Self {
        Self {
            type_id: SystemTypeId::from_name(name),
            name,
            default: None,
        }
    }

    #[must_use]
    pub fn type_id(&self) -> SystemTypeId {
        self.type_id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Build through the default constructor, if the descriptor has one.
    #[must_use]
    pub fn construct_default(&self) -> Option<Box<dyn System>> {
        self.default.map(|construct| construct())
    }
}

impl std::fmt::Debug for SystemDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemDescriptor")
            .field("type_id", &self.type_id)
            .field("name", &self.name)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// Builds systems from descriptors.
///
/// Returning `None` lets the engine fall back to the descriptor's default
/// constructor.
pub trait SystemFactory {
    fn construct(&self, descriptor: &SystemDescriptor) -> Option<Box<dyn System>>;
}

/// Builds only systems that have a default constructor.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSystemFactory;

impl SystemFactory for DefaultSystemFactory {
    fn construct(&self, descriptor: &SystemDescriptor) -> Option<Box<dyn System>> {
        descriptor.construct_default()
    }
}

impl<F> SystemFactory for F
where
    F: Fn(&SystemDescriptor) -> Option<Box<dyn System>>,
{
    fn construct(&self, descriptor: &SystemDescriptor) -> Option<Box<dyn System>> {
        self(descriptor)
    }
}

/// A system that runs a closure for each member of one family.
///
/// The family is requested when the system is added and released when it is
/// removed. Members that leave the family during a pass are skipped.
pub struct FamilySystem<F> {
    signature: Signature,
    priority: i32,
    timestep: TimeStep,
    family: Option<FamilyId>,
    each: F,
}

impl<F> FamilySystem<F>
where
    F: FnMut(&mut World, EntityId, f64) + 'static,
{
    #[must_use]
    pub fn new(signature: Signature, each: F) -> Self {
        Self {
            signature,
            priority: 0,
            timestep: TimeStep::Variable,
            family: None,
            each,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_timestep(mut self, timestep: TimeStep) -> Self {
        self.timestep = timestep;
        self
    }

    /// The family this system iterates, once added.
    #[must_use]
    pub fn family(&self) -> Option<FamilyId> {
        self.family
    }
}

impl<F> System for FamilySystem<F>
where
    F: FnMut(&mut World, EntityId, f64) + 'static,
{
    fn priority(&self) -> i32 {
        self.priority
    }

    fn timestep(&self) -> TimeStep {
        self.timestep
    }

    fn added(&mut self, world: &mut World, _id: SystemId) {
        self.family = world.add_family(self.signature.clone()).ok();
    }

    fn removed(&mut self, world: &mut World, _id: SystemId) {
        if self.family.take().is_some() {
            world.remove_family(&self.signature);
        }
    }

    fn update(&mut self, world: &mut World, delta: f64) {
        let Some(family) = self.family else {
            return;
        };
        for entity in world.family_members(family) {
            if world.family(family).is_some_and(|f| f.contains(entity)) {
                (self.each)(world, entity, delta);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Idle;

    impl System for Idle {
        fn update(&mut self, _world: &mut World, _delta: f64) {}
    }

    impl SystemType for Idle {
        fn type_name() -> &'static str {
            "Idle"
        }
    }

    #[test]
    fn test_descriptor_of_has_default() {
        let descriptor = SystemDescriptor::of::<Idle>();
        assert_eq!(descriptor.name(), "Idle");
        assert_eq!(descriptor.type_id(), SystemTypeId::from_name("Idle"));
        assert!(descriptor.construct_default().is_some());
    }

    #[test]
    fn test_named_descriptor_needs_factory() {
        let descriptor = SystemDescriptor::named("Custom");
        assert!(DefaultSystemFactory.construct(&descriptor).is_none());

        let factory = |d: &SystemDescriptor| -> Option<Box<dyn System>> {
            (d.name() == "Custom").then(|| Box::new(Idle) as Box<dyn System>)
        };
        assert!(factory.construct(&descriptor).is_some());
    }

    #[test]
    fn test_system_defaults() {
        let idle = Idle;
        assert_eq!(idle.priority(), 0);
        assert_eq!(idle.timestep(), TimeStep::Variable);
        assert_eq!(TimeStep::default(), TimeStep::None);
    }
}
