//! Tick driver.
//!
//! Feeds frame deltas from a [`Clock`] into [`World::update`] for as long as
//! the engine's run flag stays set. The flag is checked at the top of each
//! iteration, so clearing it from inside a tick lets that tick finish before
//! the loop exits. The driver never sleeps; pacing is the caller's concern.

use std::time::Instant;

use tracing::info;

use crate::config::TickConfig;
use crate::world::World;

/// A source of frame deltas, in seconds.
pub trait Clock {
    fn delta(&mut self) -> f64;
}

/// A clock that reports the same delta every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManualClock {
    step: f64,
}

impl ManualClock {
    #[must_use]
    pub fn new(step: f64) -> Self {
        Self { step }
    }
}

impl Clock for ManualClock {
    fn delta(&mut self) -> f64 {
        self.step
    }
}

/// Wall-clock time since the previous frame. The first frame reports zero.
#[derive(Debug, Clone, Default)]
pub struct InstantClock {
    last: Option<Instant>,
}

impl InstantClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for InstantClock {
    fn delta(&mut self) -> f64 {
        let now = Instant::now();
        let delta = self
            .last
            .map_or(0.0, |last| now.duration_since(last).as_secs_f64());
        self.last = Some(now);
        delta
    }
}

/// Drives a world's engine from a clock.
#[derive(Debug)]
pub struct TickDriver<C> {
    config: TickConfig,
    clock: C,
    ticks: u64,
}

impl<C: Clock> TickDriver<C> {
    #[must_use]
    pub fn new(config: TickConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            ticks: 0,
        }
    }

    /// Ticks driven so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one tick.
    pub fn tick(&mut self, world: &mut World) {
        let delta = self.clock.delta();
        world.update(delta);
        self.ticks += 1;
    }

    /// Set the run flag and tick until it is cleared or the configured tick
    /// limit is reached. Returns the number of ticks run by this call.
    pub fn run(&mut self, world: &mut World) -> u64 {
        if !world.set_running(true) {
            return 0;
        }
        info!(max_ticks = self.config.max_ticks, "starting tick loop");

        let start = self.ticks;
        while world.is_running() {
            if self.config.max_ticks > 0 && self.ticks - start >= self.config.max_ticks {
                break;
            }
            self.tick(world);
        }
        world.set_running(false);

        let ran = self.ticks - start;
        info!(ticks = ran, "tick loop complete");
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::system::{System, SystemType};

    fn engine_world() -> World {
        let mut world = World::new();
        let root = world.spawn("root");
        world.attach_engine(root, EngineConfig::default()).unwrap();
        world
    }

    #[test]
    fn test_run_limited_ticks() {
        let mut world = engine_world();
        let mut driver = TickDriver::new(TickConfig { max_ticks: 5 }, ManualClock::new(1.0 / 60.0));
        assert_eq!(driver.run(&mut world), 5);
        assert_eq!(world.engine().unwrap().ticks(), 5);
        assert!(!world.is_running());
        assert!((world.time().unwrap().total_fixed_time - 5.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_without_engine_returns_immediately() {
        let mut world = World::new();
        let mut driver = TickDriver::new(TickConfig::default(), ManualClock::new(0.1));
        assert_eq!(driver.run(&mut world), 0);
    }

    #[derive(Default)]
    struct StopAfterThree {
        seen: u32,
    }

    impl System for StopAfterThree {
        fn update(&mut self, world: &mut World, _delta: f64) {
            self.seen += 1;
            if self.seen == 3 {
                world.set_running(false);
            }
        }
    }

    impl SystemType for StopAfterThree {
        fn type_name() -> &'static str {
            "StopAfterThree"
        }
    }

    #[test]
    fn test_clearing_run_flag_finishes_current_tick() {
        let mut world = engine_world();
        world.add_system_of::<StopAfterThree>().unwrap();
        let mut driver = TickDriver::new(TickConfig::default(), ManualClock::new(0.01));
        assert_eq!(driver.run(&mut world), 3);
        assert_eq!(world.engine().unwrap().ticks(), 3);
    }

    #[test]
    fn test_instant_clock_first_delta_is_zero() {
        let mut clock = InstantClock::new();
        assert_eq!(clock.delta(), 0.0);
        assert!(clock.delta() >= 0.0);
    }
}
