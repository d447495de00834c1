//! Error types for agent lifecycle, collection and configuration operations.

use thiserror::Error;

/// Storage-layer errors raised by the embedded vector client.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

#[cfg(feature = "vector-store")]
impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

#[cfg(feature = "vector-store")]
impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Errors surfaced to command callers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Unknown agent, module or collection.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No active agent")]
    NoActiveAgent,

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Optional feature used without its backing library compiled in.
    #[error("{feature} is not available: {hint}")]
    DependencyMissing { feature: String, hint: String },

    #[error("Agent already loaded: {0}")]
    AlreadyLoaded(String),

    #[error("Agent {0} is already running")]
    AgentBusy(String),

    #[error(
        "Collection '{collection}' was built with {stored}, not {requested} (migrate it first)"
    )]
    EmbeddingMismatch {
        collection: String,
        stored: String,
        requested: String,
    },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl ApiError {
    /// Missing-collection storage errors are reported as `NotFound` to callers.
    pub(crate) fn from_storage(err: StorageError) -> Self {
        match err {
            StorageError::CollectionNotFound(name) => {
                ApiError::NotFound(format!("collection {}", name))
            }
            other => ApiError::StorageError(other),
        }
    }
}
