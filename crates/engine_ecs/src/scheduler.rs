//! Priority-ordered system scheduling.
//!
//! Systems are kept in ascending priority. Insertion scans from the tail and
//! places the system right after the last one whose priority is less than or
//! equal to its own, so systems of equal priority keep insertion order. A
//! priority change removes the system and inserts it again the same way.
//!
//! Systems are reference counted per type. Releasing the last reference
//! while the engine is updating only queues the system; it stops running
//! immediately but its `removed` hook runs at the end of the tick.

use std::collections::HashMap;

use engine_component::SystemId;
use engine_messenger::Messaging;
use tracing::{debug, trace};

use crate::error::EcsError;
use crate::messages::{SystemAdded, SystemPriorityChanged, SystemRemoved};
use crate::system::{System, SystemDescriptor, SystemType, SystemTypeId, TimeStep};
use crate::world::World;

/// Scheduling state of one system.
pub struct SystemRecord {
    id: SystemId,
    type_id: SystemTypeId,
    name: &'static str,
    priority: i32,
    timestep: TimeStep,
    sleeping: bool,
    references: usize,
    /// Taken out while the system runs.
    logic: Option<Box<dyn System>>,
}

impl SystemRecord {
    #[must_use]
    pub fn id(&self) -> SystemId {
        self.id
    }

    #[must_use]
    pub fn type_id(&self) -> SystemTypeId {
        self.type_id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    #[must_use]
    pub fn timestep(&self) -> TimeStep {
        self.timestep
    }

    #[must_use]
    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    #[must_use]
    pub fn references(&self) -> usize {
        self.references
    }

    /// Returns `true` if the scheduler should run this record in a pass of
    /// `step`.
    fn runs_in(&self, step: TimeStep) -> bool {
        self.references > 0 && !self.sleeping && self.timestep == step && step != TimeStep::None
    }
}

impl std::fmt::Debug for SystemRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("timestep", &self.timestep)
            .field("sleeping", &self.sleeping)
            .field("references", &self.references)
            .finish()
    }
}

/// The engine's ordered set of systems.
#[derive(Debug, Default)]
pub struct Scheduler {
    records: HashMap<SystemId, SystemRecord>,
    order: Vec<SystemId>,
    by_type: HashMap<SystemTypeId, SystemId>,
    pending: Vec<SystemId>,
    update_state: TimeStep,
    current: Option<SystemId>,
}

impl Scheduler {
    /// Systems in run order.
    #[must_use]
    pub fn order(&self) -> &[SystemId] {
        &self.order
    }

    #[must_use]
    pub fn get(&self, id: SystemId) -> Option<&SystemRecord> {
        self.records.get(&id)
    }

    #[must_use]
    pub fn by_type(&self, type_id: SystemTypeId) -> Option<&SystemRecord> {
        self.records.get(self.by_type.get(&type_id)?)
    }

    /// The pass currently running, or [`TimeStep::None`] between passes.
    #[must_use]
    pub fn update_state(&self) -> TimeStep {
        self.update_state
    }

    /// The system whose `update` is executing.
    #[must_use]
    pub fn current(&self) -> Option<SystemId> {
        self.current
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn insert(&mut self, record: SystemRecord) {
        let id = record.id;
        let priority = record.priority;
        self.by_type.insert(record.type_id, id);
        self.records.insert(id, record);
        self.insert_ordered(id, priority);
    }

    fn insert_ordered(&mut self, id: SystemId, priority: i32) {
        let mut index = self.order.len();
        while index > 0 {
            let before = self.order[index - 1];
            if self
                .records
                .get(&before)
                .is_some_and(|record| record.priority <= priority)
            {
                break;
            }
            index -= 1;
        }
        self.order.insert(index, id);
    }

    fn remove(&mut self, id: SystemId) -> Option<SystemRecord> {
        let record = self.records.remove(&id)?;
        self.order.retain(|&s| s != id);
        self.by_type.remove(&record.type_id);
        self.pending.retain(|&s| s != id);
        Some(record)
    }

    fn reprioritize(&mut self, id: SystemId, priority: i32) -> Option<i32> {
        let record = self.records.get_mut(&id)?;
        if record.priority == priority {
            return None;
        }
        let previous = std::mem::replace(&mut record.priority, priority);
        self.order.retain(|&s| s != id);
        self.insert_ordered(id, priority);
        Some(previous)
    }

    pub(crate) fn set_update_state(&mut self, state: TimeStep) -> Option<TimeStep> {
        if self.update_state == state {
            return None;
        }
        Some(std::mem::replace(&mut self.update_state, state))
    }

    /// Take a system's logic out for a pass of `step`, marking it current.
    pub(crate) fn begin(&mut self, id: SystemId, step: TimeStep) -> Option<Box<dyn System>> {
        let record = self.records.get_mut(&id)?;
        if !record.runs_in(step) {
            return None;
        }
        let logic = record.logic.take()?;
        self.current = Some(id);
        Some(logic)
    }

    /// Put a system's logic back after its pass.
    pub(crate) fn end(&mut self, id: SystemId, logic: Box<dyn System>) {
        self.current = None;
        if let Some(record) = self.records.get_mut(&id) {
            record.logic = Some(logic);
        }
    }

    pub(crate) fn take_pending(&mut self) -> Vec<SystemId> {
        std::mem::take(&mut self.pending)
    }
}

impl World {
    /// Take a reference to the system described by `descriptor`,
    /// constructing and scheduling it on first request.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NoEngine`] without an engine, or
    /// [`EcsError::NoConstructor`] if neither the engine's factory nor the
    /// descriptor can build the system.
    pub fn add_system(&mut self, descriptor: SystemDescriptor) -> Result<SystemId, EcsError> {
        let engine = self.engine.as_mut().ok_or(EcsError::NoEngine)?;
        if let Some(&id) = engine.scheduler.by_type.get(&descriptor.type_id()) {
            if let Some(record) = engine.scheduler.records.get_mut(&id) {
                record.references += 1;
                if record.references == 1 {
                    engine.scheduler.pending.retain(|&s| s != id);
                }
                trace!(system = %id, references = record.references, "system referenced again");
                return Ok(id);
            }
        }

        let mut logic = engine
            .factory
            .construct(&descriptor)
            .or_else(|| descriptor.construct_default())
            .ok_or(EcsError::NoConstructor(descriptor.name()))?;
        let id: SystemId = self.ids.allocate();
        engine.scheduler.insert(SystemRecord {
            id,
            type_id: descriptor.type_id(),
            name: descriptor.name(),
            priority: logic.priority(),
            timestep: logic.timestep(),
            sleeping: false,
            references: 1,
            logic: None,
        });
        debug!(system = %id, name = descriptor.name(), priority = logic.priority(), "system added");

        logic.added(self, id);
        if let Some(engine) = self.engine.as_mut() {
            engine.scheduler.end(id, logic);
        }
        self.dispatch(&SystemAdded {
            system: id,
            name: descriptor.name(),
        });
        Ok(id)
    }

    /// [`World::add_system`] for a default-constructible system type.
    ///
    /// # Errors
    ///
    /// See [`World::add_system`].
    pub fn add_system_of<S: SystemType + Default>(&mut self) -> Result<SystemId, EcsError> {
        self.add_system(SystemDescriptor::of::<S>())
    }

    /// Release one reference to the system of `type_id`.
    ///
    /// Returns `false` if no such system is referenced.
    pub fn remove_system(&mut self, type_id: SystemTypeId) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };
        let updating = engine.is_updating();
        let scheduler = &mut engine.scheduler;
        let Some(&id) = scheduler.by_type.get(&type_id) else {
            return false;
        };
        let Some(record) = scheduler.records.get_mut(&id) else {
            return false;
        };
        if record.references == 0 {
            return false;
        }
        record.references -= 1;
        if record.references > 0 {
            return true;
        }
        if updating {
            debug!(system = %id, name = record.name, "system removal deferred to end of tick");
            scheduler.pending.push(id);
            return true;
        }
        self.finalize_system(id);
        true
    }

    /// [`World::remove_system`] for a system type.
    pub fn remove_system_of<S: SystemType>(&mut self) -> bool {
        self.remove_system(SystemTypeId::of::<S>())
    }

    /// Unschedule a system, run its `removed` hook and announce it.
    pub(crate) fn finalize_system(&mut self, id: SystemId) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let Some(mut record) = engine.scheduler.remove(id) else {
            return;
        };
        if let Some(mut logic) = record.logic.take() {
            logic.removed(self, id);
        }
        debug!(system = %id, name = record.name, "system removed");
        self.dispatch(&SystemRemoved {
            system: id,
            name: record.name,
        });
    }

    /// Finalize systems released during the tick.
    pub(crate) fn finalize_pending_systems(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        for id in engine.scheduler.take_pending() {
            let released = self
                .engine
                .as_ref()
                .and_then(|engine| engine.scheduler.get(id))
                .is_some_and(|record| record.references == 0);
            if released {
                self.finalize_system(id);
            }
        }
    }

    /// Move a system to a new priority.
    ///
    /// Returns `false` if the system does not exist or already has this
    /// priority.
    pub fn set_system_priority(&mut self, id: SystemId, priority: i32) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };
        let Some(previous) = engine.scheduler.reprioritize(id, priority) else {
            return false;
        };
        trace!(system = %id, previous, priority, "system priority changed");
        self.dispatch(&SystemPriorityChanged {
            system: id,
            previous,
            current: priority,
        });
        true
    }

    /// Put a system to sleep or wake it. Sleeping systems are skipped.
    pub fn set_system_sleeping(&mut self, id: SystemId, sleeping: bool) -> bool {
        match self.system_record_mut(id) {
            Some(record) if record.sleeping != sleeping => {
                record.sleeping = sleeping;
                true
            }
            _ => false,
        }
    }

    /// Change the passes a system runs in.
    pub fn set_system_timestep(&mut self, id: SystemId, timestep: TimeStep) -> bool {
        match self.system_record_mut(id) {
            Some(record) if record.timestep != timestep => {
                record.timestep = timestep;
                true
            }
            _ => false,
        }
    }

    fn system_record_mut(&mut self, id: SystemId) -> Option<&mut SystemRecord> {
        self.engine.as_mut()?.scheduler.records.get_mut(&id)
    }

    #[must_use]
    pub fn system(&self, id: SystemId) -> Option<&SystemRecord> {
        self.engine.as_ref()?.scheduler().get(id)
    }

    #[must_use]
    pub fn system_by_type(&self, type_id: SystemTypeId) -> Option<&SystemRecord> {
        self.engine.as_ref()?.scheduler().by_type(type_id)
    }

    /// Returns `true` if the system of `type_id` holds references.
    #[must_use]
    pub fn has_system(&self, type_id: SystemTypeId) -> bool {
        self.system_by_type(type_id)
            .is_some_and(|record| record.references > 0)
    }

    /// Scheduled systems in run order.
    #[must_use]
    pub fn systems(&self) -> Vec<SystemId> {
        self.engine
            .as_ref()
            .map(|engine| engine.scheduler().order().to_vec())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::config::EngineConfig;

    #[derive(Default)]
    struct Counter;

    impl System for Counter {
        fn priority(&self) -> i32 {
            7
        }

        fn update(&mut self, _world: &mut World, _delta: f64) {}
    }

    impl SystemType for Counter {
        fn type_name() -> &'static str {
            "Counter"
        }
    }

    fn engine_world() -> World {
        let mut world = World::new();
        let root = world.spawn("root");
        world.attach_engine(root, EngineConfig::default()).unwrap();
        world
    }

    struct Tagged(i32);

    impl System for Tagged {
        fn priority(&self) -> i32 {
            self.0
        }

        fn update(&mut self, _world: &mut World, _delta: f64) {}
    }

    fn tagged_world() -> World {
        let mut world = World::new();
        let root = world.spawn("root");
        world
            .attach_engine_with(root, EngineConfig::default(), |d: &SystemDescriptor| {
                let priority: i32 = d.name().trim_start_matches('p').split('-').next()?.parse().ok()?;
                Some(Box::new(Tagged(priority)) as Box<dyn System>)
            })
            .unwrap();
        world
    }

    #[test]
    fn test_add_system_without_engine() {
        let mut world = World::new();
        assert!(matches!(
            world.add_system_of::<Counter>(),
            Err(EcsError::NoEngine)
        ));
    }

    #[test]
    fn test_add_system_uses_initial_priority() {
        let mut world = engine_world();
        let id = world.add_system_of::<Counter>().unwrap();
        let record = world.system(id).unwrap();
        assert_eq!(record.priority(), 7);
        assert_eq!(record.name(), "Counter");
        assert_eq!(record.timestep(), TimeStep::Variable);
    }

    #[test]
    fn test_no_constructor() {
        let mut world = engine_world();
        let err = world.add_system(SystemDescriptor::named("Ghost")).unwrap_err();
        assert!(matches!(err, EcsError::NoConstructor("Ghost")));
    }

    #[test]
    fn test_priority_order_is_stable() {
        let mut world = tagged_world();
        let ids: Vec<SystemId> = ["p5-a", "p1-a", "p3-a", "p1-b"]
            .into_iter()
            .map(|name| world.add_system(SystemDescriptor::named(name)).unwrap())
            .collect();
        assert_eq!(world.systems(), vec![ids[1], ids[3], ids[2], ids[0]]);
    }

    #[test]
    fn test_priority_change_reinserts_after_equals() {
        let mut world = tagged_world();
        let a = world.add_system(SystemDescriptor::named("p1-a")).unwrap();
        let b = world.add_system(SystemDescriptor::named("p3-b")).unwrap();
        let c = world.add_system(SystemDescriptor::named("p3-c")).unwrap();

        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&changes);
        world
            .messenger_mut()
            .add_listener(0, move |_: &mut World, m: &SystemPriorityChanged| {
                sink.borrow_mut().push((m.previous, m.current));
            });

        assert!(world.set_system_priority(a, 3));
        assert_eq!(world.systems(), vec![b, c, a]);
        assert!(!world.set_system_priority(a, 3));
        assert!(world.set_system_priority(c, 0));
        assert_eq!(world.systems(), vec![c, b, a]);
        assert_eq!(*changes.borrow(), vec![(1, 3), (3, 0)]);
    }

    #[test]
    fn test_system_reference_counting() {
        let mut world = engine_world();
        let type_id = SystemTypeId::of::<Counter>();
        let first = world.add_system_of::<Counter>().unwrap();
        let second = world.add_system_of::<Counter>().unwrap();
        assert_eq!(first, second);
        assert_eq!(world.systems().len(), 1);

        assert!(world.remove_system(type_id));
        assert!(world.has_system(type_id));
        assert!(world.remove_system_of::<Counter>());
        assert!(!world.has_system(type_id));
        assert!(world.system(first).is_none());
        assert!(!world.remove_system(type_id));
    }

    #[test]
    fn test_sleep_and_timestep_setters() {
        let mut world = engine_world();
        let id = world.add_system_of::<Counter>().unwrap();
        assert!(world.set_system_sleeping(id, true));
        assert!(!world.set_system_sleeping(id, true));
        assert!(world.system(id).unwrap().is_sleeping());
        assert!(world.set_system_timestep(id, TimeStep::Fixed));
        assert_eq!(world.system(id).unwrap().timestep(), TimeStep::Fixed);
    }
}
