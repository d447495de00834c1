//! StorageConfig and path resolution for the collection index.

use crate::config::xdg;
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_index_path() -> PathBuf {
    PathBuf::from("index")
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the vector store. Relative paths live under `$XDG_DATA_HOME/steward/`.
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
}

impl StorageConfig {
    /// Resolve the index path to an actual filesystem location.
    pub fn resolve_index_path(&self) -> Result<PathBuf, ApiError> {
        if self.index_path.is_absolute() {
            return Ok(self.index_path.clone());
        }
        Ok(xdg::data_dir()?.join(&self.index_path))
    }

    /// Resolve against an explicit base directory instead of the XDG data dir.
    pub fn resolve_index_path_in(&self, base: &Path) -> PathBuf {
        if self.index_path.is_absolute() {
            self.index_path.clone()
        } else {
            base.join(&self.index_path)
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
        }
    }
}
