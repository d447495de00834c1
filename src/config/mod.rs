//! Configuration
//!
//! Layered configuration for logging, storage, agent lifecycle and the
//! collection index. Sources merge in precedence order: defaults, global
//! file, workspace file, `STEWARD_*` environment.

mod facade;
mod merge;
pub mod paths;
mod sources;
pub mod workspace;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;
pub use workspace::storage_paths::StorageConfig;

use crate::index::embeddings::EmbeddingsConfig;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StewardConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub agents: AgentsConfig,

    #[serde(default)]
    pub index: IndexConfig,
}

fn default_stop_timeout_ms() -> u64 {
    5_000
}

/// Agent lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Agents loaded when the application context is created
    #[serde(default)]
    pub autoload: Vec<String>,

    /// Agent switched to after autoload, if loaded
    #[serde(default)]
    pub default: Option<String>,

    /// How long unload waits for a stopped session before aborting it
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            autoload: Vec::new(),
            default: None,
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

pub(crate) fn default_collection_name() -> String {
    "steward".to_string()
}

/// Collection index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_collection_name")]
    pub default_collection: String,

    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            default_collection: default_collection_name(),
            embeddings: EmbeddingsConfig::default(),
        }
    }
}
