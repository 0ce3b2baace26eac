//! Fixed-timestep tick loop.
//!
//! Each tick runs every registered [`System`] once, in registration order,
//! inside a single [`Engine::update`] pass:
//!
//! 1. Advance the tick counter.
//! 2. Open the update pass.
//! 3. Run each system with the tick's `dt`.
//! 4. Close the pass, releasing nodes removed during it.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::TickConfig;
use crate::engine::{Engine, EngineError};

/// A unit of per-tick logic.
pub trait System {
    /// Human-readable system name, used in logs.
    fn name(&self) -> &str;

    /// Advance this system by `dt` seconds.
    fn update(&mut self, engine: &mut Engine, dt: f64) -> Result<(), EngineError>;
}

/// The tick loop state.
pub struct TickLoop {
    /// Current tick counter.
    tick_id: u64,
    /// Tick configuration.
    config: TickConfig,
    /// The engine the systems run against.
    engine: Engine,
    /// Systems in registration order.
    systems: Vec<Box<dyn System>>,
}

impl TickLoop {
    /// Create a tick loop driving `engine`.
    #[must_use]
    pub fn new(config: TickConfig, engine: Engine) -> Self {
        Self {
            tick_id: 0,
            config,
            engine,
            systems: Vec::new(),
        }
    }

    /// Returns the current tick counter.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Returns a reference to the engine.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Returns a mutable reference to the engine.
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Append a system. Systems run in the order they were added.
    pub fn add_system(&mut self, system: impl System + 'static) {
        info!(system = system.name(), "system registered");
        self.systems.push(Box::new(system));
    }

    /// Number of registered systems.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Run one tick.
    pub fn tick(&mut self, dt: f64) -> Result<(), EngineError> {
        self.tick_id += 1;
        debug!(
            tick_id = self.tick_id,
            dt,
            systems = self.systems.len(),
            "tick start"
        );

        let systems = &mut self.systems;
        self.engine
            .update(|engine| -> Result<(), EngineError> {
                for system in systems.iter_mut() {
                    system.update(engine, dt)?;
                }
                Ok(())
            })??;
        Ok(())
    }

    /// Run the tick loop for the configured number of ticks, or indefinitely.
    pub fn run(&mut self) -> Result<(), EngineError> {
        let rate = self.config.tick_rate;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(EngineError::InvalidTickRate(rate));
        }
        let tick_duration = Duration::from_secs_f64(1.0 / rate);
        let mut tick_count = 0u64;

        info!(
            tick_rate = rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            let start = Instant::now();

            self.tick(tick_duration.as_secs_f64())?;

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, "tick loop complete");
                return Ok(());
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            } else {
                warn!(
                    tick_id = self.tick_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
    }
}

impl std::fmt::Debug for TickLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickLoop")
            .field("tick_id", &self.tick_id)
            .field("config", &self.config)
            .field("engine", &self.engine)
            .field(
                "systems",
                &self.systems.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    struct Recorder {
        name: &'static str,
        log: Rc<RefCell<Vec<(&'static str, bool)>>>,
    }

    impl System for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn update(&mut self, engine: &mut Engine, _dt: f64) -> Result<(), EngineError> {
            self.log.borrow_mut().push((self.name, engine.is_updating()));
            Ok(())
        }
    }

    struct Failing;

    impl System for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn update(&mut self, engine: &mut Engine, _dt: f64) -> Result<(), EngineError> {
            engine.update(|_| ())?;
            Ok(())
        }
    }

    #[test]
    fn test_tick_advances_counter() {
        let mut tick_loop = TickLoop::new(TickConfig::default(), Engine::new());
        assert_eq!(tick_loop.tick_id(), 0);
        tick_loop.tick(1.0 / 60.0).unwrap();
        assert_eq!(tick_loop.tick_id(), 1);
        tick_loop.tick(1.0 / 60.0).unwrap();
        assert_eq!(tick_loop.tick_id(), 2);
    }

    #[test]
    fn test_systems_run_in_order_inside_update() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut tick_loop = TickLoop::new(TickConfig::default(), Engine::new());
        for name in ["input", "physics", "render"] {
            tick_loop.add_system(Recorder {
                name,
                log: Rc::clone(&log),
            });
        }
        assert_eq!(tick_loop.system_count(), 3);

        tick_loop.tick(0.01).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![("input", true), ("physics", true), ("render", true)]
        );
        assert!(!tick_loop.engine().is_updating());
    }

    #[test]
    fn test_system_error_stops_tick() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut tick_loop = TickLoop::new(TickConfig::default(), Engine::new());
        tick_loop.add_system(Failing);
        tick_loop.add_system(Recorder {
            name: "after",
            log: Rc::clone(&log),
        });

        assert!(matches!(tick_loop.tick(0.01), Err(EngineError::AlreadyUpdating)));
        assert!(log.borrow().is_empty());
        assert!(!tick_loop.engine().is_updating());
    }

    #[test]
    fn test_run_limited_ticks() {
        let config = TickConfig {
            tick_rate: 1000.0, // fast for testing
            max_ticks: 5,
        };
        let mut tick_loop = TickLoop::new(config, Engine::new());
        tick_loop.run().unwrap();
        assert_eq!(tick_loop.tick_id(), 5);
    }

    #[test]
    fn test_run_rejects_invalid_tick_rate() {
        for rate in [0.0, -1.0, f64::NAN] {
            let config = TickConfig {
                tick_rate: rate,
                max_ticks: 1,
            };
            let mut tick_loop = TickLoop::new(config, Engine::new());
            assert!(matches!(tick_loop.run(), Err(EngineError::InvalidTickRate(_))));
            assert_eq!(tick_loop.tick_id(), 0);
        }
    }
}
