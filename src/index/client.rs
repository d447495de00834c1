//! Vector store client.
//!
//! [`VectorClient`] is the seam between collections and whatever stores their
//! vectors. Calls are blocking; async callers go through `spawn_blocking`.

use crate::error::{ApiError, StorageError};
use crate::types::{Embedding, Metadata, WhereFilter};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// One stored vector with its source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Embedding,
    pub document: String,
    pub metadata: Metadata,
}

/// A query hit. Higher `score` is closer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: VectorRecord,
    pub score: f32,
}

/// Collection name plus its metadata, without any embedding function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub metadata: Metadata,
}

pub trait VectorClient: Send + Sync {
    /// Return the named collection, creating it with `metadata` if absent.
    /// Existing metadata is never touched.
    fn get_or_create_collection(
        &self,
        name: &str,
        metadata: Metadata,
    ) -> Result<CollectionInfo, StorageError>;

    fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, StorageError>;

    /// Replace a collection's metadata.
    fn update_collection_metadata(&self, name: &str, metadata: Metadata)
        -> Result<(), StorageError>;

    fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<(), StorageError>;

    /// Delete records whose id is in `ids` (when given) and whose metadata
    /// matches `filter` (when given). Returns how many were removed.
    fn delete(
        &self,
        collection: &str,
        ids: Option<&[String]>,
        filter: Option<&WhereFilter>,
    ) -> Result<usize, StorageError>;

    fn count(&self, collection: &str) -> Result<usize, StorageError>;

    fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
        filter: Option<&WhereFilter>,
    ) -> Result<Vec<ScoredRecord>, StorageError>;

    fn get_all(&self, collection: &str) -> Result<Vec<VectorRecord>, StorageError>;

    fn delete_collection(&self, name: &str) -> Result<(), StorageError>;

    fn list_collections(&self) -> Result<Vec<CollectionInfo>, StorageError>;
}

/// Every filter pair equals the record's metadata value.
pub fn matches_filter(metadata: &Metadata, filter: &WhereFilter) -> bool {
    filter
        .iter()
        .all(|(key, expected)| metadata.get(key) == Some(expected))
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

/// Open the embedded vector store at `path`.
#[cfg(feature = "vector-store")]
pub fn open_vector_client(path: &Path) -> Result<Arc<dyn VectorClient>, ApiError> {
    Ok(Arc::new(sled_store::SledVectorClient::open(path)?))
}

/// Open the embedded vector store at `path`.
#[cfg(not(feature = "vector-store"))]
pub fn open_vector_client(path: &Path) -> Result<Arc<dyn VectorClient>, ApiError> {
    let _ = path;
    Err(ApiError::DependencyMissing {
        feature: "vector store".to_string(),
        hint: "rebuild steward with `--features vector-store`".to_string(),
    })
}

#[cfg(feature = "vector-store")]
pub use sled_store::SledVectorClient;

#[cfg(feature = "vector-store")]
mod sled_store {
    use super::*;
    use tracing::debug;

    const COLLECTIONS_TREE: &str = "collections";

    /// On-disk record. Metadata is kept as JSON text since bincode cannot
    /// round-trip `serde_json::Value`.
    #[derive(Serialize, Deserialize)]
    struct StoredRecord {
        id: String,
        embedding: Vec<f32>,
        document: String,
        metadata: String,
    }

    impl StoredRecord {
        fn encode(record: &VectorRecord) -> Result<Vec<u8>, StorageError> {
            let stored = StoredRecord {
                id: record.id.clone(),
                embedding: record.embedding.clone(),
                document: record.document.clone(),
                metadata: serde_json::to_string(&record.metadata)?,
            };
            Ok(bincode::serialize(&stored)?)
        }

        fn decode(bytes: &[u8]) -> Result<VectorRecord, StorageError> {
            let stored: StoredRecord = bincode::deserialize(bytes)?;
            Ok(VectorRecord {
                id: stored.id,
                embedding: stored.embedding,
                document: stored.document,
                metadata: serde_json::from_str(&stored.metadata)?,
            })
        }
    }

    /// Collections in a sled database: one `collections` tree of
    /// name -> metadata JSON, and one record tree per collection.
    pub struct SledVectorClient {
        db: sled::Db,
        collections: sled::Tree,
    }

    impl SledVectorClient {
        pub fn open(path: &Path) -> Result<Self, StorageError> {
            std::fs::create_dir_all(path)?;
            let db = sled::open(path)?;
            Self::from_db(db)
        }

        /// Temporary in-memory store.
        pub fn temporary() -> Result<Self, StorageError> {
            let db = sled::Config::new().temporary(true).open()?;
            Self::from_db(db)
        }

        pub fn from_db(db: sled::Db) -> Result<Self, StorageError> {
            let collections = db.open_tree(COLLECTIONS_TREE)?;
            Ok(Self { db, collections })
        }

        fn tree_name(name: &str) -> String {
            format!("collection/{}", name)
        }

        fn records(&self, name: &str) -> Result<sled::Tree, StorageError> {
            if !self.collections.contains_key(name)? {
                return Err(StorageError::CollectionNotFound(name.to_string()));
            }
            Ok(self.db.open_tree(Self::tree_name(name))?)
        }

        fn scan(&self, name: &str) -> Result<Vec<VectorRecord>, StorageError> {
            self.records(name)?
                .iter()
                .values()
                .map(|value| StoredRecord::decode(&value?))
                .collect()
        }

        fn read_info(name: &str, bytes: &[u8]) -> Result<CollectionInfo, StorageError> {
            Ok(CollectionInfo {
                name: name.to_string(),
                metadata: serde_json::from_slice(bytes)?,
            })
        }
    }

    impl VectorClient for SledVectorClient {
        fn get_or_create_collection(
            &self,
            name: &str,
            metadata: Metadata,
        ) -> Result<CollectionInfo, StorageError> {
            if name.is_empty() {
                return Err(StorageError::InvalidPath("empty collection name".to_string()));
            }
            let bytes = serde_json::to_vec(&metadata)?;
            // Only the first writer's metadata is kept.
            match self
                .collections
                .compare_and_swap(name, None as Option<&[u8]>, Some(bytes))?
            {
                Ok(()) => {
                    debug!(collection = name, "Created collection");
                    self.db.open_tree(Self::tree_name(name))?;
                    Ok(CollectionInfo {
                        name: name.to_string(),
                        metadata,
                    })
                }
                Err(cas) => match cas.current {
                    Some(existing) => Self::read_info(name, &existing),
                    None => Err(StorageError::Database(format!(
                        "collection {} vanished during creation",
                        name
                    ))),
                },
            }
        }

        fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, StorageError> {
            match self.collections.get(name)? {
                Some(bytes) => Ok(Some(Self::read_info(name, &bytes)?)),
                None => Ok(None),
            }
        }

        fn update_collection_metadata(
            &self,
            name: &str,
            metadata: Metadata,
        ) -> Result<(), StorageError> {
            if !self.collections.contains_key(name)? {
                return Err(StorageError::CollectionNotFound(name.to_string()));
            }
            self.collections.insert(name, serde_json::to_vec(&metadata)?)?;
            Ok(())
        }

        fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<(), StorageError> {
            let tree = self.records(collection)?;
            let mut batch = sled::Batch::default();
            for record in &records {
                batch.insert(record.id.as_bytes(), StoredRecord::encode(record)?);
            }
            tree.apply_batch(batch)?;
            Ok(())
        }

        fn delete(
            &self,
            collection: &str,
            ids: Option<&[String]>,
            filter: Option<&WhereFilter>,
        ) -> Result<usize, StorageError> {
            let tree = self.records(collection)?;
            let mut doomed = Vec::new();
            match ids {
                Some(ids) => {
                    for id in ids {
                        if let Some(bytes) = tree.get(id.as_bytes())? {
                            let record = StoredRecord::decode(&bytes)?;
                            if filter.map_or(true, |f| matches_filter(&record.metadata, f)) {
                                doomed.push(record.id);
                            }
                        }
                    }
                }
                None => {
                    for record in self.scan(collection)? {
                        if filter.map_or(true, |f| matches_filter(&record.metadata, f)) {
                            doomed.push(record.id);
                        }
                    }
                }
            }

            let mut batch = sled::Batch::default();
            for id in &doomed {
                batch.remove(id.as_bytes());
            }
            tree.apply_batch(batch)?;
            Ok(doomed.len())
        }

        fn count(&self, collection: &str) -> Result<usize, StorageError> {
            Ok(self.records(collection)?.len())
        }

        fn query(
            &self,
            collection: &str,
            embedding: &[f32],
            k: usize,
            filter: Option<&WhereFilter>,
        ) -> Result<Vec<ScoredRecord>, StorageError> {
            let mut hits: Vec<ScoredRecord> = self
                .scan(collection)?
                .into_iter()
                .filter(|r| filter.map_or(true, |f| matches_filter(&r.metadata, f)))
                .map(|record| ScoredRecord {
                    score: cosine_similarity(&record.embedding, embedding),
                    record,
                })
                .collect();
            hits.sort_by(|a, b| b.score.total_cmp(&a.score));
            hits.truncate(k);
            Ok(hits)
        }

        fn get_all(&self, collection: &str) -> Result<Vec<VectorRecord>, StorageError> {
            self.scan(collection)
        }

        fn delete_collection(&self, name: &str) -> Result<(), StorageError> {
            if self.collections.remove(name)?.is_none() {
                return Err(StorageError::CollectionNotFound(name.to_string()));
            }
            self.db.drop_tree(Self::tree_name(name))?;
            debug!(collection = name, "Dropped collection");
            Ok(())
        }

        fn list_collections(&self) -> Result<Vec<CollectionInfo>, StorageError> {
            self.collections
                .iter()
                .map(|entry| {
                    let (key, value) = entry?;
                    let name = String::from_utf8(key.to_vec())
                        .map_err(|e| StorageError::Serialization(e.to_string()))?;
                    Self::read_info(&name, &value)
                })
                .collect()
        }
    }
}

#[cfg(all(test, feature = "vector-store"))]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, embedding: Vec<f32>, source: &str) -> VectorRecord {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), json!(source));
        VectorRecord {
            id: id.to_string(),
            embedding,
            document: format!("doc {}", id),
            metadata,
        }
    }

    fn client_with(name: &str) -> SledVectorClient {
        let client = SledVectorClient::temporary().unwrap();
        client.get_or_create_collection(name, Metadata::new()).unwrap();
        client
    }

    #[test]
    fn test_first_metadata_wins() {
        let client = SledVectorClient::temporary().unwrap();
        let mut first = Metadata::new();
        first.insert("embedding_fn".to_string(), json!("a"));
        let mut second = Metadata::new();
        second.insert("embedding_fn".to_string(), json!("b"));

        client.get_or_create_collection("notes", first.clone()).unwrap();
        let info = client.get_or_create_collection("notes", second).unwrap();
        assert_eq!(info.metadata, first);
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let client = client_with("notes");
        client
            .upsert("notes", vec![record("1", vec![1.0, 0.0], "a")])
            .unwrap();
        client
            .upsert("notes", vec![record("1", vec![0.0, 1.0], "b")])
            .unwrap();
        assert_eq!(client.count("notes").unwrap(), 1);
        let all = client.get_all("notes").unwrap();
        assert_eq!(all[0].metadata["source"], json!("b"));
    }

    #[test]
    fn test_query_orders_by_similarity() {
        let client = client_with("notes");
        client
            .upsert(
                "notes",
                vec![
                    record("x", vec![1.0, 0.0], "a"),
                    record("y", vec![0.0, 1.0], "b"),
                    record("xy", vec![0.7, 0.7], "a"),
                ],
            )
            .unwrap();

        let hits = client.query("notes", &[1.0, 0.0], 2, None).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.id, "x");
        assert_eq!(hits[1].record.id, "xy");

        let mut filter = WhereFilter::new();
        filter.insert("source".to_string(), json!("b"));
        let hits = client.query("notes", &[1.0, 0.0], 5, Some(&filter)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id, "y");
    }

    #[test]
    fn test_delete_by_ids_and_filter() {
        let client = client_with("notes");
        client
            .upsert(
                "notes",
                vec![
                    record("1", vec![1.0], "a"),
                    record("2", vec![1.0], "b"),
                    record("3", vec![1.0], "a"),
                ],
            )
            .unwrap();

        let mut filter = WhereFilter::new();
        filter.insert("source".to_string(), json!("a"));
        let ids = vec!["1".to_string(), "2".to_string()];
        assert_eq!(client.delete("notes", Some(&ids), Some(&filter)).unwrap(), 1);
        assert_eq!(client.delete("notes", None, Some(&filter)).unwrap(), 1);
        assert_eq!(client.count("notes").unwrap(), 1);
        assert_eq!(client.delete("notes", Some(&["missing".to_string()]), None).unwrap(), 0);
    }

    #[test]
    fn test_delete_collection() {
        let client = client_with("notes");
        client.upsert("notes", vec![record("1", vec![1.0], "a")]).unwrap();
        client.delete_collection("notes").unwrap();

        assert!(client.get_collection("notes").unwrap().is_none());
        assert!(matches!(
            client.count("notes"),
            Err(StorageError::CollectionNotFound(_))
        ));
        assert!(matches!(
            client.delete_collection("notes"),
            Err(StorageError::CollectionNotFound(_))
        ));

        client.get_or_create_collection("notes", Metadata::new()).unwrap();
        assert_eq!(client.count("notes").unwrap(), 0);
    }

    #[test]
    fn test_list_collections_and_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        {
            let client = SledVectorClient::open(dir.path()).unwrap();
            client.get_or_create_collection("b", Metadata::new()).unwrap();
            client.get_or_create_collection("a", Metadata::new()).unwrap();
            client.upsert("a", vec![record("1", vec![1.0], "x")]).unwrap();
        }
        let client = SledVectorClient::open(dir.path()).unwrap();
        let names: Vec<String> = client
            .list_collections()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(client.count("a").unwrap(), 1);
    }

    #[test]
    fn test_cosine_similarity_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[2.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
