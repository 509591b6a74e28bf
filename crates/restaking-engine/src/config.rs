//! Configuration loading and typed config structures for the indexer.
//!
//! The canonical configuration lives in `restaking-index.yaml`. Every field
//! has a default, so an empty file (or no file at all) yields a working
//! configuration that reads `events.ndjson` and keeps state in memory only
//! until the first snapshot.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level indexer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IndexerConfig {
    /// Event source settings.
    #[serde(default)]
    pub input: InputConfig,

    /// Persistence settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Reconciliation policy.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl IndexerConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for paths:
    /// - `RESTAKING_EVENTS_PATH` overrides `input.events_path`
    /// - `RESTAKING_SNAPSHOT_PATH` overrides `store.snapshot_path`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override file paths with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RESTAKING_EVENTS_PATH") {
            self.input.events_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("RESTAKING_SNAPSHOT_PATH") {
            self.store.snapshot_path = PathBuf::from(val);
        }
    }
}

/// Event source configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InputConfig {
    /// Newline-delimited JSON file of decoded events, in chain order.
    #[serde(default = "default_events_path")]
    pub events_path: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            events_path: default_events_path(),
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Snapshot file.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Write a snapshot every N applied events; `0` only at the end.
    #[serde(default = "default_snapshot_every_events")]
    pub snapshot_every_events: u64,

    /// Load an existing snapshot before processing.
    #[serde(default = "default_true")]
    pub resume: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            snapshot_every_events: default_snapshot_every_events(),
            resume: default_true(),
        }
    }
}

/// Reconciliation policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Reject events positioned at or before the cursor instead of applying
    /// them with an anomaly.
    #[serde(default)]
    pub strict_ordering: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error), used
    /// when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_events_path() -> PathBuf {
    PathBuf::from("events.ndjson")
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("restaking-state.json")
}

const fn default_snapshot_every_events() -> u64 {
    10_000
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_usable() {
        let config = IndexerConfig::default();
        assert_eq!(config.store.snapshot_every_events, 10_000);
        assert!(config.store.resume);
        assert!(!config.engine.strict_ordering);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
input:
  events_path: "/data/events.ndjson"

store:
  snapshot_path: "/data/state.json"
  snapshot_every_events: 500
  resume: false

engine:
  strict_ordering: true

logging:
  level: "debug"
  json: true
"#;
        let config = IndexerConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.store.snapshot_every_events, 500);
        assert!(!config.store.resume);
        assert!(config.engine.strict_ordering);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn parse_partial_yaml_keeps_defaults() {
        let yaml = "engine:\n  strict_ordering: true\n";
        let config = IndexerConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();
        assert!(config.engine.strict_ordering);
        assert_eq!(config.store.snapshot_every_events, 10_000);
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(IndexerConfig::parse("").is_ok());
    }

    #[test]
    fn parse_invalid_yaml_is_an_error() {
        let result = IndexerConfig::parse("engine: [not, a, map");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("restaking-index.yaml");
        if path.exists() {
            let config = IndexerConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
