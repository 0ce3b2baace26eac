//! Demo runner: moving particles on a fixed tick.
//!
//! Usage: `engine_app [config.json]`. Without a config file the demo runs
//! for a few seconds at the default tick rate.

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine_app::{EngineConfig, demo};

const DEMO_TICKS: u64 = 180;
const DEMO_PARTICLES: usize = 64;

fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => {
            let mut config = EngineConfig::default();
            config.tick.max_ticks = DEMO_TICKS;
            config
        }
    };

    info!(?config, "engine starting");
    let report = demo::run(&config, DEMO_PARTICLES)?;
    info!(
        ticks = report.ticks,
        remaining = report.remaining,
        "engine shut down"
    );
    Ok(())
}
