//! Configuration loading and validation (§6, §10).

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Top-level configuration for a `latticed` replica.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Storage backend selection.
    pub storage: StorageConfig,
    /// Sync transport selection.
    pub sync: SyncConfig,
    /// Stable identifier for this replica; used as the vector-clock key.
    pub replica_id: String,
    /// When set and `sync` is not `Manual`, enables the pull and reconcile
    /// background loops at this period.
    #[serde(default)]
    pub auto_sync_interval_ms: Option<u64>,
    /// Authorization extension point (interface-only — parses, inert).
    #[serde(default)]
    pub authorization: Option<AuthorizationConfig>,
    /// Business-logic hook extension point (interface-only — parses, inert).
    #[serde(default)]
    pub business_logic: Option<BusinessLogicConfig>,
    /// Logging output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Storage backend choice. `IndexedDb` parses for forward compatibility with
/// the browser-hosted sibling of this library but is rejected by
/// [`validate`] — this crate ships only [`MemoryStorage`](crate::storage::MemoryStorage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageConfig {
    Memory,
    Indexeddb,
}

/// Sync transport choice.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SyncConfig {
    Manual,
    Websocket { url: String },
}

/// Authorization extension point.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub default_subject: Option<String>,
}

/// Business-logic hook extension point.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusinessLogicConfig {
    #[serde(default)]
    pub global_hook: Option<String>,
    #[serde(default)]
    pub collection_hooks: Vec<String>,
}

/// Log output format, matching the teacher's own `LogFormat` split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Validate a loaded config, collecting every violation rather than
/// stopping at the first — the teacher's own `config::validate` gatekeeping
/// pattern.
pub fn validate(config: &Config) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.replica_id.trim().is_empty() {
        errors.push(ConfigError::Invalid {
            field: "replica_id",
            message: "must be a non-empty, stable identifier".to_string(),
        });
    }

    if config.storage == StorageConfig::Indexeddb {
        errors.push(ConfigError::Invalid {
            field: "storage",
            message: "indexeddb is not implemented by this crate; use memory".to_string(),
        });
    }

    if let SyncConfig::Websocket { url } = &config.sync {
        if url.trim().is_empty() {
            errors.push(ConfigError::Invalid {
                field: "sync.url",
                message: "required when sync.mode is websocket".to_string(),
            });
        }
    }

    if matches!(config.sync, SyncConfig::Manual) && config.auto_sync_interval_ms.is_some() {
        errors.push(ConfigError::Invalid {
            field: "auto_sync_interval_ms",
            message: "has no effect when sync.mode is manual".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
