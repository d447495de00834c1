//! Retrieval tool an agent can attach by name.

use crate::error::ApiError;
use crate::index::collection::CollectionIndex;

/// Number of documents returned when the caller does not ask for a count.
pub const DEFAULT_TOP_K: usize = 4;

#[derive(Debug, Clone)]
pub struct RetrievalTool {
    index: CollectionIndex,
    name: String,
    description: String,
    return_direct: bool,
}

impl RetrievalTool {
    pub(crate) fn new(index: CollectionIndex, description: Option<String>, return_direct: bool) -> Self {
        let name = format!("search_{}", index.name());
        let description = description.unwrap_or_else(|| {
            format!(
                "Search the {} collection and return the most relevant documents.",
                index.name()
            )
        });
        Self {
            index,
            name,
            description,
            return_direct,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the tool output goes straight back to the user.
    pub fn return_direct(&self) -> bool {
        self.return_direct
    }

    /// Documents most similar to `query`, separated by blank lines.
    pub async fn run(&self, query: &str, k: Option<usize>) -> Result<String, ApiError> {
        let hits = self
            .index
            .similarity_search(query, k.unwrap_or(DEFAULT_TOP_K), None)
            .await?;
        Ok(hits
            .into_iter()
            .map(|hit| hit.record.document)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
