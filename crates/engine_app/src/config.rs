//! Engine and tick loop configuration.
//!
//! Both structs deserialize from JSON with every field optional:
//!
//! ```json
//! { "node_pool_capacity": 64, "tick": { "tick_rate": 30.0, "max_ticks": 600 } }
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors produced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The config text is not valid JSON for [`EngineConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration for the tick loop.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
        }
    }
}

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Nodes pre-built in each family's pool when the family is created.
    pub node_pool_capacity: usize,
    /// Tick loop settings.
    pub tick: TickConfig,
}

impl EngineConfig {
    /// Parse a config from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.tick.tick_rate, 60.0);
        assert_eq!(config.tick.max_ticks, 0);
    }

    #[test]
    fn test_partial_tick_section() {
        let config =
            EngineConfig::from_json_str(r#"{ "node_pool_capacity": 8, "tick": { "max_ticks": 3 } }"#)
                .unwrap();
        assert_eq!(config.node_pool_capacity, 8);
        assert_eq!(config.tick.max_ticks, 3);
        assert_eq!(config.tick.tick_rate, 60.0);
    }

    #[test]
    fn test_invalid_json_is_a_parse_error() {
        let err = EngineConfig::from_json_str("{ tick: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file_is_an_io_error() {
        let err = EngineConfig::load("/nonexistent/engine-config.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_load_reads_file() {
        let path = std::env::temp_dir().join(format!("engine-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "tick": { "tick_rate": 30.0 } }"#).unwrap();
        let config = EngineConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.tick.tick_rate, 30.0);
    }
}
