//! The engine: entity index, families, systems and the update loop.
//!
//! An [`Engine`] is attached to a root entity of a [`World`]. On attach it
//! registers its bookkeeping listeners at [`i32::MIN`] priority and indexes
//! the root's subtree; from then on every hierarchy, name and component
//! change reaching the world's messenger keeps the entity index and the
//! families current before any user listener runs.
//!
//! ## Update loop
//!
//! [`World::update`] advances one tick:
//!
//! 1. Clamp the frame delta to `[0, max_variable_time]` and add it to the
//!    variable total.
//! 2. Count how many whole fixed steps fit between the fixed total and the
//!    new variable total, advancing the fixed total by that many steps.
//! 3. Adjust the lag counter: `lag += max(0, n - 1)`, and a tick with exactly
//!    one step pays one unit of lag back.
//! 4. Run `n` fixed passes, then one variable pass. Each pass walks a copy of
//!    the run order, skipping sleeping systems and systems of another
//!    timestep.
//! 5. Finalize systems and families released during the tick.
//!
//! Calling `update` from inside a tick does nothing.

use engine_component::{EntityId, SystemId};
use engine_messenger::{ListenerId, Messaging};
use tracing::{debug, info, trace};

use crate::config::{EngineConfig, valid_delta_fixed_time, valid_max_variable_time};
use crate::entity_manager::EntityManager;
use crate::error::EcsError;
use crate::family::FamilyManager;
use crate::messages::{ChildAdded, ChildRemoved, ComponentAdded, ComponentRemoved, NameChanged, UpdateStateChanged};
use crate::scheduler::Scheduler;
use crate::system::{DefaultSystemFactory, SystemFactory, TimeStep};
use crate::world::World;

/// Accumulated step counts may drift by float error; a step that fits
/// within this tolerance is taken.
const FIXED_STEP_TOLERANCE: f64 = 1e-9;

/// The engine's clocks.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeState {
    pub max_variable_time: f64,
    pub delta_variable_time: f64,
    pub total_variable_time: f64,
    pub delta_fixed_time: f64,
    pub total_fixed_time: f64,
    /// Fixed steps owed from ticks that had to catch up.
    pub lag_fixed_time: u64,
    /// Fixed passes run by the latest tick.
    pub fixed_updates: u32,
}

impl TimeState {
    fn new(config: &EngineConfig) -> Self {
        Self {
            max_variable_time: config.max_variable_time,
            delta_variable_time: 0.0,
            total_variable_time: 0.0,
            delta_fixed_time: config.delta_fixed_time,
            total_fixed_time: 0.0,
            lag_fixed_time: 0,
            fixed_updates: 0,
        }
    }

    /// Advance the clocks by one frame and return the number of fixed steps
    /// to run.
    fn advance(&mut self, delta: f64) -> u32 {
        let delta = delta.max(0.0).min(self.max_variable_time.max(0.0));
        let total_variable = self.total_variable_time + delta;

        let mut total_fixed = self.total_fixed_time;
        let mut steps = 0u32;
        if self.delta_fixed_time > 0.0 {
            while total_fixed + self.delta_fixed_time <= total_variable + FIXED_STEP_TOLERANCE {
                total_fixed += self.delta_fixed_time;
                steps += 1;
            }
        }

        self.lag_fixed_time += u64::from(steps.saturating_sub(1));
        if steps == 1 && self.lag_fixed_time > 0 {
            self.lag_fixed_time -= 1;
        }

        self.delta_variable_time = delta;
        self.total_variable_time = total_variable;
        self.total_fixed_time = total_fixed;
        self.fixed_updates = steps;
        steps
    }
}

/// Composition root of the runtime, attached to a root entity.
pub struct Engine {
    root: EntityId,
    time: TimeState,
    pub(crate) entities: EntityManager,
    pub(crate) families: FamilyManager,
    pub(crate) scheduler: Scheduler,
    pub(crate) factory: Box<dyn SystemFactory>,
    listeners: Vec<ListenerId>,
    updating: bool,
    running: bool,
    ticks: u64,
}

impl Engine {
    fn new(root: EntityId, config: &EngineConfig, factory: Box<dyn SystemFactory>) -> Self {
        Self {
            root,
            time: TimeState::new(config),
            entities: EntityManager::default(),
            families: FamilyManager::default(),
            scheduler: Scheduler::default(),
            factory,
            listeners: Vec::new(),
            updating: false,
            running: false,
            ticks: 0,
        }
    }

    /// The entity this engine is attached to.
    #[must_use]
    pub fn root(&self) -> EntityId {
        self.root
    }

    #[must_use]
    pub fn time(&self) -> &TimeState {
        &self.time
    }

    #[must_use]
    pub fn entities(&self) -> &EntityManager {
        &self.entities
    }

    #[must_use]
    pub fn families(&self) -> &FamilyManager {
        &self.families
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Returns `true` while a tick is in progress.
    #[must_use]
    pub fn is_updating(&self) -> bool {
        self.updating
    }

    /// The run flag polled by the tick driver.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Completed ticks.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("root", &self.root)
            .field("time", &self.time)
            .field("entities", &self.entities.len())
            .field("families", &self.families.len())
            .field("systems", &self.scheduler.len())
            .field("updating", &self.updating)
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl World {
    /// Attach an engine to `root` with the default system factory.
    ///
    /// # Errors
    ///
    /// See [`World::attach_engine_with`].
    pub fn attach_engine(&mut self, root: EntityId, config: EngineConfig) -> Result<(), EcsError> {
        self.attach_engine_with(root, config, DefaultSystemFactory)
    }

    /// Attach an engine to `root`, constructing systems through `factory`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EngineAlreadyAttached`] if the world already has
    /// an engine, [`EcsError::InvalidConfig`] if `config` fails
    /// [`EngineConfig::validate`], [`EcsError::UnknownEntity`] if `root`
    /// does not exist, or [`EcsError::NotRoot`] if `root` has a parent.
    pub fn attach_engine_with(
        &mut self,
        root: EntityId,
        config: EngineConfig,
        factory: impl SystemFactory + 'static,
    ) -> Result<(), EcsError> {
        if self.engine.is_some() {
            return Err(EcsError::EngineAlreadyAttached);
        }
        config.validate()?;
        if self.node(root)?.parent.is_some() {
            return Err(EcsError::NotRoot(root));
        }

        let mut engine = Engine::new(root, &config, Box::new(factory));
        let messenger = &mut self.messenger;
        engine.listeners = vec![
            messenger.add_listener(i32::MIN, |world: &mut World, m: &ChildAdded| world.on_child_added(m)),
            messenger.add_listener(i32::MIN, |world: &mut World, m: &ChildRemoved| {
                world.on_child_removed(m);
            }),
            messenger.add_listener(i32::MIN, |world: &mut World, m: &NameChanged| world.on_name_changed(m)),
            messenger.add_listener(i32::MIN, |world: &mut World, m: &ComponentAdded| {
                world.on_component_added(m);
            }),
            messenger.add_listener(i32::MIN, |world: &mut World, m: &ComponentRemoved| {
                world.on_component_removed(m);
            }),
        ];
        self.engine = Some(engine);
        info!(
            root = %root,
            delta_fixed_time = config.delta_fixed_time,
            max_variable_time = config.max_variable_time,
            "engine attached"
        );

        self.index_tree(root);
        Ok(())
    }

    /// Detach the engine, tearing down its systems, families and entity
    /// index. Entities and components stay in the world.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NoEngine`] without an engine, or
    /// [`EcsError::EngineBusy`] if called during a tick.
    pub fn detach_engine(&mut self) -> Result<(), EcsError> {
        let engine = self.engine.as_ref().ok_or(EcsError::NoEngine)?;
        if engine.updating {
            return Err(EcsError::EngineBusy);
        }
        let root = engine.root;
        let systems: Vec<SystemId> = engine.scheduler.order().iter().rev().copied().collect();
        for id in systems {
            self.finalize_system(id);
        }

        let families = match self.engine.as_mut() {
            Some(engine) => engine.families.clear(),
            None => Vec::new(),
        };
        for family in families {
            self.announce_family_removed(family);
        }

        self.deindex_tree(root);

        if let Some(engine) = self.engine.take() {
            for listener in engine.listeners {
                self.messenger.remove_listener(listener);
            }
            info!(root = %root, ticks = engine.ticks, "engine detached");
        }
        Ok(())
    }

    /// The engine's clocks.
    #[must_use]
    pub fn time(&self) -> Option<&TimeState> {
        self.engine.as_ref().map(Engine::time)
    }

    /// Change the fixed step length. Returns `false` if there is no engine,
    /// the value is unchanged, or it is not finite or below
    /// [`MIN_DELTA_FIXED_TIME`](crate::config::MIN_DELTA_FIXED_TIME).
    pub fn set_delta_fixed_time(&mut self, seconds: f64) -> bool {
        match self.engine.as_mut() {
            Some(engine)
                if valid_delta_fixed_time(seconds) && engine.time.delta_fixed_time != seconds =>
            {
                engine.time.delta_fixed_time = seconds;
                true
            }
            _ => false,
        }
    }

    /// Change the variable delta cap. Returns `false` if there is no engine,
    /// the value is unchanged, negative or not finite.
    pub fn set_max_variable_time(&mut self, seconds: f64) -> bool {
        match self.engine.as_mut() {
            Some(engine)
                if valid_max_variable_time(seconds) && engine.time.max_variable_time != seconds =>
            {
                engine.time.max_variable_time = seconds;
                true
            }
            _ => false,
        }
    }

    /// Set the run flag polled by the tick driver. Returns `false` without an
    /// engine.
    pub fn set_running(&mut self, running: bool) -> bool {
        match self.engine.as_mut() {
            Some(engine) => {
                engine.running = running;
                true
            }
            None => false,
        }
    }

    /// Returns `true` if an engine is attached and its run flag is set.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.engine.as_ref().is_some_and(Engine::is_running)
    }

    /// The pass currently running.
    #[must_use]
    pub fn update_state(&self) -> TimeStep {
        self.engine
            .as_ref()
            .map_or(TimeStep::None, |engine| engine.scheduler.update_state())
    }

    /// Advance the engine by one tick of `delta` seconds.
    pub fn update(&mut self, delta: f64) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        if engine.updating {
            debug!(delta, "update skipped: already updating");
            return;
        }
        engine.updating = true;

        let steps = engine.time.advance(delta);
        let delta_fixed = engine.time.delta_fixed_time;
        let delta_variable = engine.time.delta_variable_time;
        trace!(
            tick = engine.ticks + 1,
            fixed_updates = steps,
            lag = engine.time.lag_fixed_time,
            delta_variable,
            "tick start"
        );

        for _ in 0..steps {
            self.run_pass(TimeStep::Fixed, delta_fixed);
        }
        self.run_pass(TimeStep::Variable, delta_variable);

        self.finalize_pending_systems();
        let families = match self.engine.as_mut() {
            Some(engine) => engine.families.finalize_pending(),
            None => Vec::new(),
        };
        for family in families {
            self.announce_family_removed(family);
        }

        if let Some(engine) = self.engine.as_mut() {
            engine.updating = false;
            engine.ticks += 1;
        }
    }

    fn run_pass(&mut self, step: TimeStep, delta: f64) {
        self.set_update_state(step);
        let order = self
            .engine
            .as_ref()
            .map(|engine| engine.scheduler.order().to_vec())
            .unwrap_or_default();
        for id in order {
            let Some(mut logic) = self
                .engine
                .as_mut()
                .and_then(|engine| engine.scheduler.begin(id, step))
            else {
                continue;
            };
            logic.update(self, delta);
            if let Some(engine) = self.engine.as_mut() {
                engine.scheduler.end(id, logic);
            }
        }
        self.set_update_state(TimeStep::None);
    }

    fn set_update_state(&mut self, state: TimeStep) {
        let Some(previous) = self
            .engine
            .as_mut()
            .and_then(|engine| engine.scheduler.set_update_state(state))
        else {
            return;
        };
        self.dispatch(&UpdateStateChanged {
            previous,
            current: state,
        });
    }
}
