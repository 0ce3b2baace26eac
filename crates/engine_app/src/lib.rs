//! # engine_app
//!
//! Drives the node-matching ECS: the [`Engine`] owns entities and the
//! families watching them, and the [`TickLoop`] runs [`System`]s once per
//! tick inside an update pass.
//!
//! ## Frame sequence
//!
//! 1. [`Engine::update`] marks the pass as running.
//! 2. Systems walk node collections and change the world. Nodes removed now
//!    keep their data until the pass ends.
//! 3. The pass ends: every family releases its deferred nodes, then the
//!    engine's `update_complete` listeners run.

pub mod config;
pub mod demo;
pub mod engine;
pub mod tick;

pub use config::{ConfigError, EngineConfig, TickConfig};
pub use engine::{Engine, EngineError};
pub use tick::{System, TickLoop};
