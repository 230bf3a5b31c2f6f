//! # engine_app
//!
//! Demo simulation on the ECS runtime.
//!
//! Spawns a ring of moving bodies under an engine root, drives them with a
//! fixed-step movement system and a variable-step culling system, and logs
//! the resulting scene.
//!
//! ## Startup Sequence
//!
//! 1. Load the engine configuration (JSON file, or defaults with the
//!    `--fixed-rate` override).
//! 2. Build the hierarchy and attach the engine to its root.
//! 3. Register systems through the app's factory.
//! 4. Run the tick driver for `--ticks` frames.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use engine_component::{Component, EntityId, Signature};
use engine_ecs::{
    EngineConfig, FamilySystem, ManualClock, System, SystemDescriptor, TickConfig, TickDriver, TimeStep,
    World,
};

#[derive(Parser)]
#[command(name = "engine_app", about = "Run a small simulation on the ECS runtime")]
struct Args {
    /// Number of frames to run
    #[arg(short, long, default_value_t = 120)]
    ticks: u64,

    /// Fixed updates per second
    #[arg(short, long, default_value_t = 60.0)]
    fixed_rate: f64,

    /// Number of bodies to spawn
    #[arg(short, long, default_value_t = 16)]
    entities: usize,

    /// Bodies farther than this from the origin are despawned
    #[arg(long, default_value_t = 4.0)]
    bounds: f32,

    /// Engine configuration file (JSON); overrides --fixed-rate
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the final scene as JSON
    #[arg(long)]
    dump: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Position(Vec2);

impl Component for Position {
    fn type_name() -> &'static str {
        "Position"
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Velocity(Vec2);

impl Component for Velocity {
    fn type_name() -> &'static str {
        "Velocity"
    }
}

fn movement(world: &mut World, entity: EntityId, delta: f64) {
    let Some(&Velocity(velocity)) = world.get_component::<Velocity>(entity) else {
        return;
    };
    if let Some(Position(position)) = world.get_component_mut::<Position>(entity) {
        *position += velocity * delta as f32;
    }
}

fn systems(bounds: f32) -> impl Fn(&SystemDescriptor) -> Option<Box<dyn System>> {
    move |descriptor: &SystemDescriptor| -> Option<Box<dyn System>> {
        match descriptor.name() {
            "movement" => Some(Box::new(
                FamilySystem::new(Signature::of::<(Position, Velocity)>(), movement)
                    .with_timestep(TimeStep::Fixed),
            ) as Box<dyn System>),
            "culling" => Some(Box::new(
                FamilySystem::new(
                    Signature::of::<(Position,)>(),
                    move |world: &mut World, entity: EntityId, _delta: f64| {
                        let outside = world
                            .get_component::<Position>(entity)
                            .is_some_and(|Position(p)| p.length() > bounds);
                        if outside {
                            debug!(entity = %entity, "body left bounds");
                            world.despawn(entity);
                        }
                    },
                )
                .with_priority(10),
            ) as Box<dyn System>),
            _ => descriptor.construct_default(),
        }
    }
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading engine config {}", path.display()))?;
            Ok(EngineConfig::from_json(&text)?)
        }
        None => Ok(EngineConfig::default().with_delta_fixed_time(1.0 / args.fixed_rate)),
    }
}

fn spawn_bodies(world: &mut World, root: EntityId, count: usize) -> Result<()> {
    let bodies = world.spawn("bodies");
    world.add_child(root, bodies)?;
    for i in 0..count {
        let angle = std::f32::consts::TAU * i as f32 / count.max(1) as f32;
        let direction = Vec2::from_angle(angle);
        let body = world.spawn(format!("body-{i}"));
        world.add_component(body, Position(direction * 0.5))?;
        world.add_component(body, Velocity(direction * (1.0 + i as f32 * 0.25)))?;
        world.add_child(bodies, body)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let frame = config.delta_fixed_time;

    let mut world = World::new();
    let root = world.spawn("scene");
    world.attach_engine_with(root, config, systems(args.bounds))?;
    spawn_bodies(&mut world, root, args.entities)?;

    world.add_system(SystemDescriptor::named("movement"))?;
    world.add_system(SystemDescriptor::named("culling"))?;
    info!(
        entities = world.engine().map_or(0, |e| e.entities().len()),
        systems = world.systems().len(),
        "scene ready"
    );

    let mut driver = TickDriver::new(
        TickConfig {
            max_ticks: args.ticks,
        },
        ManualClock::new(frame),
    );
    driver.run(&mut world);

    let snapshot = world.snapshot_entity(root, None)?;
    let time = world.time().map(|t| t.total_variable_time).unwrap_or_default();
    info!(
        ticks = driver.ticks(),
        simulated_seconds = time,
        remaining = snapshot.entity_count(),
        "simulation finished"
    );
    if args.dump {
        println!("{}", snapshot.to_json()?);
    }
    Ok(())
}
