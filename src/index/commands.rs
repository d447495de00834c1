//! Index command service: single entry point per index CLI command variant.

use crate::error::ApiError;
use crate::index::client::VectorClient;
use crate::index::collection::CollectionIndex;
use crate::types::{Metadata, WhereFilter, DESCRIPTION_KEY, EMBEDDING_FN_KEY, MODEL_NAME_KEY};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub struct IndexCommandService;

/// One row of `index list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionListItem {
    pub name: String,
    pub embedding_fn: Option<String>,
    pub model_name: Option<String>,
}

/// Result of `index info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfoResult {
    pub name: String,
    pub description: Option<String>,
    pub count: usize,
    pub metadata: Metadata,
}

fn string_field(metadata: &Metadata, key: &str) -> Option<String> {
    metadata.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Parse `key=value` pairs into an equality filter. Values that parse as JSON
/// (numbers, booleans, quoted strings) are compared as such, anything else as a string.
pub fn parse_where(pairs: &[String]) -> Result<Option<WhereFilter>, ApiError> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let mut filter = WhereFilter::new();
    for pair in pairs {
        let (key, raw) = pair.split_once('=').ok_or_else(|| {
            ApiError::InvalidArgument(format!("expected key=value, got '{}'", pair))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ApiError::InvalidArgument(format!("empty key in '{}'", pair)));
        }
        let value = serde_json::from_str(raw.trim())
            .unwrap_or_else(|_| Value::String(raw.trim().to_string()));
        filter.insert(key.to_string(), value);
    }
    Ok(Some(filter))
}

impl IndexCommandService {
    pub fn list(client: &dyn VectorClient) -> Result<Vec<CollectionListItem>, ApiError> {
        Ok(CollectionIndex::list_collections(client)?
            .into_iter()
            .map(|info| CollectionListItem {
                embedding_fn: string_field(&info.metadata, EMBEDDING_FN_KEY),
                model_name: string_field(&info.metadata, MODEL_NAME_KEY),
                name: info.name,
            })
            .collect())
    }

    /// Metadata and live count of an existing collection. Never creates one.
    pub fn info(client: &dyn VectorClient, name: &str) -> Result<CollectionInfoResult, ApiError> {
        let info = client
            .get_collection(name)?
            .ok_or_else(|| ApiError::NotFound(format!("collection {}", name)))?;
        let count = client.count(name).map_err(ApiError::from_storage)?;
        Ok(CollectionInfoResult {
            name: info.name,
            description: string_field(&info.metadata, DESCRIPTION_KEY),
            count,
            metadata: info.metadata,
        })
    }

    /// Delete records from an existing collection.
    pub async fn delete(
        client: Arc<dyn VectorClient>,
        name: &str,
        ids: Vec<String>,
        where_pairs: &[String],
    ) -> Result<usize, ApiError> {
        if client.get_collection(name)?.is_none() {
            return Err(ApiError::NotFound(format!("collection {}", name)));
        }
        let filter = parse_where(where_pairs)?;
        let ids = if ids.is_empty() { None } else { Some(ids) };
        CollectionIndex::delete_in_named_collection_async(client, name.to_string(), ids, filter)
            .await
    }

    /// Drop a collection by name.
    pub async fn drop_collection(client: Arc<dyn VectorClient>, name: &str) -> Result<String, ApiError> {
        CollectionIndex::delete_named_collection_async(client, name.to_string()).await?;
        Ok(name.to_string())
    }
}
