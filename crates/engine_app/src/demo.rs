//! A small simulation used by the binary: moving particles that expire.
//!
//! `MovementSystem` integrates velocity into position for every
//! [`MovementNode`]. `ExpirySystem` counts down each [`Lifetime`] and
//! despawns entities whose lifetime runs out while it is walking the
//! collection.

use engine_component::{Component, Handle};
use engine_family::{NodeDescriptor, NodeView};
use glam::Vec2;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::engine::{Engine, EngineError};
use crate::tick::{System, TickLoop};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position(pub Vec2);

impl Component for Position {
    fn type_name() -> &'static str {
        "Position"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity(pub Vec2);

impl Component for Velocity {
    fn type_name() -> &'static str {
        "Velocity"
    }
}

/// Remaining ticks before the entity is despawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lifetime {
    pub remaining: u32,
}

impl Component for Lifetime {
    fn type_name() -> &'static str {
        "Lifetime"
    }
}

#[derive(Default)]
pub struct MovementNode {
    pub position: Option<Handle<Position>>,
    pub velocity: Option<Handle<Velocity>>,
}

impl NodeView for MovementNode {
    fn describe(slots: &mut NodeDescriptor<Self>) {
        slots
            .slot("position", |node: &mut Self, c| node.position = c)
            .slot("velocity", |node: &mut Self, c| node.velocity = c);
    }
}

#[derive(Default)]
pub struct ExpiryNode {
    pub lifetime: Option<Handle<Lifetime>>,
}

impl NodeView for ExpiryNode {
    fn describe(slots: &mut NodeDescriptor<Self>) {
        slots.slot("lifetime", |node: &mut Self, c| node.lifetime = c);
    }
}

/// Moves every entity with a position and a velocity.
#[derive(Debug, Default)]
pub struct MovementSystem;

impl System for MovementSystem {
    fn name(&self) -> &str {
        "movement"
    }

    fn update(&mut self, engine: &mut Engine, dt: f64) -> Result<(), EngineError> {
        engine.nodes::<MovementNode>()?;
        let Some(family) = engine.family::<MovementNode>() else {
            return Ok(());
        };
        let dt = dt as f32;
        for id in family.nodes().iter() {
            if let Some(MovementNode {
                position: Some(position),
                velocity: Some(velocity),
            }) = family.view(id)
            {
                let velocity = velocity.borrow().0;
                position.borrow_mut().0 += velocity * dt;
            }
        }
        Ok(())
    }
}

/// Counts lifetimes down and despawns entities that reach zero.
#[derive(Debug, Default)]
pub struct ExpirySystem {
    expired: usize,
}

impl ExpirySystem {
    /// Entities this system has despawned so far.
    #[must_use]
    pub fn expired(&self) -> usize {
        self.expired
    }
}

impl System for ExpirySystem {
    fn name(&self) -> &str {
        "expiry"
    }

    fn update(&mut self, engine: &mut Engine, _dt: f64) -> Result<(), EngineError> {
        let mut cursor = engine.nodes::<ExpiryNode>()?.cursor();
        loop {
            let Some(family) = engine.family::<ExpiryNode>() else {
                break;
            };
            let Some(id) = cursor.advance(family.nodes()) else {
                break;
            };
            let expired = family
                .view(id)
                .and_then(|node| node.lifetime.as_ref())
                .is_some_and(|lifetime| {
                    let mut lifetime = lifetime.borrow_mut();
                    lifetime.remaining = lifetime.remaining.saturating_sub(1);
                    lifetime.remaining == 0
                });
            if expired && let Some(entity) = family.entity_of(id) {
                engine.despawn(entity)?;
                self.expired += 1;
                debug!(%entity, "entity expired");
            }
        }
        Ok(())
    }
}

/// What a demo run left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoReport {
    pub ticks: u64,
    pub spawned: usize,
    pub remaining: usize,
}

/// Spawn `count` particles. Every third one gets a lifetime of a few ticks.
pub fn populate(engine: &mut Engine, count: usize) -> Result<(), EngineError> {
    for i in 0..count {
        let entity = engine.spawn()?;
        let angle = i as f32 * 0.5;
        engine.add_component(entity, Position(Vec2::ZERO))?;
        engine.add_component(entity, Velocity(Vec2::from_angle(angle) * 2.0))?;
        if i % 3 == 0 {
            engine.add_component(
                entity,
                Lifetime {
                    remaining: 1 + (i as u32 % 5),
                },
            )?;
        }
    }
    Ok(())
}

/// Run the particle simulation with `config`.
pub fn run(config: &EngineConfig, particles: usize) -> Result<DemoReport, EngineError> {
    let mut engine = Engine::with_config(config);
    populate(&mut engine, particles)?;

    let mut tick_loop = TickLoop::new(config.tick.clone(), engine);
    tick_loop.add_system(MovementSystem);
    tick_loop.add_system(ExpirySystem::default());
    tick_loop.run()?;

    let report = DemoReport {
        ticks: tick_loop.tick_id(),
        spawned: particles,
        remaining: tick_loop.engine().entity_count(),
    };
    info!(
        ticks = report.ticks,
        spawned = report.spawned,
        remaining = report.remaining,
        "demo finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TickConfig;

    #[test]
    fn test_movement_integrates_velocity() {
        let mut engine = Engine::new();
        let e = engine.spawn().unwrap();
        let position = engine.add_component(e, Position(Vec2::new(1.0, 1.0))).unwrap();
        engine
            .add_component(e, Velocity(Vec2::new(2.0, -4.0)))
            .unwrap();

        let mut system = MovementSystem;
        engine
            .update(|engine| system.update(engine, 0.5))
            .unwrap()
            .unwrap();
        assert_eq!(position.borrow().0, Vec2::new(2.0, -1.0));
    }

    #[test]
    fn test_entity_without_velocity_does_not_move() {
        let mut engine = Engine::new();
        let e = engine.spawn().unwrap();
        let position = engine.add_component(e, Position(Vec2::ONE)).unwrap();

        let mut system = MovementSystem;
        engine
            .update(|engine| system.update(engine, 1.0))
            .unwrap()
            .unwrap();
        assert_eq!(position.borrow().0, Vec2::ONE);
    }

    #[test]
    fn test_expiry_despawns_while_walking() {
        let mut engine = Engine::new();
        let mut keep = Vec::new();
        for remaining in [1, 3, 1, 1, 2] {
            let e = engine.spawn().unwrap();
            engine.add_component(e, Lifetime { remaining }).unwrap();
            if remaining > 1 {
                keep.push(e);
            }
        }

        let mut system = ExpirySystem::default();
        engine
            .update(|engine| system.update(engine, 0.0))
            .unwrap()
            .unwrap();
        assert_eq!(system.expired(), 3);
        assert_eq!(engine.entity_count(), 2);

        let family = engine.family::<ExpiryNode>().unwrap();
        assert_eq!(family.pool().pending_count(), 0);
        let left: Vec<_> = family
            .nodes()
            .iter()
            .filter_map(|id| family.entity_of(id))
            .collect();
        assert_eq!(left, keep);
    }

    #[test]
    fn test_run_reports_survivors() {
        let config = EngineConfig {
            node_pool_capacity: 4,
            tick: TickConfig {
                tick_rate: 1000.0,
                max_ticks: 10,
            },
        };
        let report = run(&config, 9).unwrap();
        assert_eq!(report.ticks, 10);
        assert_eq!(report.spawned, 9);
        // Indices 0, 3 and 6 carry lifetimes of at most five ticks.
        assert_eq!(report.remaining, 6);
    }
}
