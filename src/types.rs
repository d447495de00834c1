//! Core types shared across the agent and index layers.

use std::collections::BTreeMap;

/// Collection and record metadata: ordered JSON-valued key/value map.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Equality filter over record metadata (every pair must match).
pub type WhereFilter = BTreeMap<String, serde_json::Value>;

/// Dense embedding vector.
pub type Embedding = Vec<f32>;

/// Metadata key holding the embedding function identity.
pub const EMBEDDING_FN_KEY: &str = "embedding_fn";

/// Metadata key holding the embedding model name, when recoverable.
pub const MODEL_NAME_KEY: &str = "model_name";

/// Metadata key holding a human readable collection description.
pub const DESCRIPTION_KEY: &str = "description";

/// Metadata key holding the vector width of the collection.
pub const DIMENSIONS_KEY: &str = "dimensions";
