#![cfg(feature = "vector-store")]

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use steward::index::embeddings::identity_of;
use steward::index::{
    CollectionIndex, Embeddings, HashingEmbeddings, SledVectorClient, VectorClient,
};
use steward::types::{Metadata, WhereFilter, EMBEDDING_FN_KEY, MODEL_NAME_KEY};
use steward::ApiError;
use tempfile::TempDir;

/// Stand-in for a model-backed embedding function.
struct NamedModel(&'static str);

#[async_trait]
impl Embeddings for NamedModel {
    fn identity(&self) -> String {
        identity_of::<Self>()
    }

    fn model_name(&self) -> Option<String> {
        Some(self.0.to_string())
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(texts
            .iter()
            .map(|t| vec![t.len() as f32, 1.0])
            .collect())
    }
}

fn open_store(dir: &TempDir) -> Arc<dyn VectorClient> {
    Arc::new(SledVectorClient::open(&dir.path().join("index")).unwrap())
}

#[tokio::test]
async fn test_identity_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let client = open_store(&dir);
        let index = CollectionIndex::open(client, "notes", None, None).unwrap();
        index
            .add_texts(&["first note".to_string()], None, None)
            .await
            .unwrap();
    }

    let client = open_store(&dir);
    let listed = CollectionIndex::list_collections(&*client).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(
        listed[0].metadata[EMBEDDING_FN_KEY],
        json!(identity_of::<HashingEmbeddings>())
    );

    let model: Arc<dyn Embeddings> = Arc::new(NamedModel("mini-lm"));
    let err = CollectionIndex::open(client.clone(), "notes", Some(model), None).unwrap_err();
    match err {
        ApiError::EmbeddingMismatch {
            collection,
            stored,
            requested,
        } => {
            assert_eq!(collection, "notes");
            assert!(stored.ends_with("HashingEmbeddings"));
            assert!(requested.ends_with("NamedModel"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let index = CollectionIndex::open(client, "notes", None, None).unwrap();
    assert_eq!(index.count().unwrap(), 1);
}

#[tokio::test]
async fn test_model_name_recorded_and_migrated_away() {
    let dir = TempDir::new().unwrap();
    let client = open_store(&dir);
    let model: Arc<dyn Embeddings> = Arc::new(NamedModel("mini-lm"));
    let index = CollectionIndex::open(client.clone(), "docs", Some(model), None).unwrap();
    index
        .add_texts(&["a".to_string(), "bb".to_string()], None, None)
        .await
        .unwrap();
    assert_eq!(index.metadata().unwrap()[MODEL_NAME_KEY], json!("mini-lm"));

    let hashing: Arc<dyn Embeddings> = Arc::new(HashingEmbeddings::default());
    let migrated = CollectionIndex::migrate(client.clone(), "docs", hashing)
        .await
        .unwrap();
    let metadata = migrated.metadata().unwrap();
    assert!(!metadata.contains_key(MODEL_NAME_KEY));
    assert_eq!(migrated.count().unwrap(), 2);
    for record in client.get_all("docs").unwrap() {
        assert_eq!(record.embedding.len(), 384);
    }
}

#[tokio::test]
async fn test_migrate_missing_collection() {
    let dir = TempDir::new().unwrap();
    let client = open_store(&dir);
    let result =
        CollectionIndex::migrate(client, "ghost", Arc::new(HashingEmbeddings::default())).await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn test_count_is_never_stale() {
    let dir = TempDir::new().unwrap();
    let client = open_store(&dir);
    let first = CollectionIndex::open(client.clone(), "shared", None, None).unwrap();
    let second = CollectionIndex::open(client, "shared", None, None).unwrap();

    let mut tags = Metadata::new();
    tags.insert("kind".to_string(), json!("draft"));
    second
        .add_texts(&["x".to_string()], Some(vec![tags]), None)
        .await
        .unwrap();
    assert_eq!(first.count().unwrap(), 1);

    let mut filter = WhereFilter::new();
    filter.insert("kind".to_string(), json!("draft"));
    assert_eq!(first.delete_async(None, Some(filter)).await.unwrap(), 1);
    assert_eq!(second.count_async().await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_writers_same_collection() {
    let dir = TempDir::new().unwrap();
    let client = open_store(&dir);
    let index = CollectionIndex::open(client, "busy", None, None).unwrap();

    let mut handles = Vec::new();
    for worker in 0..8 {
        let index = index.clone();
        handles.push(tokio::spawn(async move {
            let texts: Vec<String> = (0..10).map(|i| format!("worker {worker} doc {i}")).collect();
            index.add_texts(&texts, None, None).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(index.count().unwrap(), 80);
}

#[tokio::test]
async fn test_delete_named_collection_async() {
    let dir = TempDir::new().unwrap();
    let client = open_store(&dir);
    CollectionIndex::open(client.clone(), "temp", None, None).unwrap();
    CollectionIndex::delete_named_collection_async(client.clone(), "temp".to_string())
        .await
        .unwrap();
    assert!(client.list_collections().unwrap().is_empty());
    assert!(matches!(
        CollectionIndex::delete_named_collection_async(client, "temp".to_string()).await,
        Err(ApiError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_same_type_other_model_or_width_is_rejected() {
    let dir = TempDir::new().unwrap();
    let client = open_store(&dir);

    let wide: Arc<dyn Embeddings> = Arc::new(HashingEmbeddings::new(384).unwrap());
    let notes = CollectionIndex::open(client.clone(), "notes", Some(wide), None).unwrap();
    notes
        .add_texts(&["rust borrow checker".to_string()], None, None)
        .await
        .unwrap();
    let narrow: Arc<dyn Embeddings> = Arc::new(HashingEmbeddings::new(16).unwrap());
    assert!(matches!(
        CollectionIndex::open(client.clone(), "notes", Some(narrow), None),
        Err(ApiError::EmbeddingMismatch { .. })
    ));
    assert!(client
        .get_all("notes")
        .unwrap()
        .iter()
        .all(|r| r.embedding.len() == 384));

    let model_a: Arc<dyn Embeddings> = Arc::new(NamedModel("model-a"));
    CollectionIndex::open(client.clone(), "docs", Some(model_a), None).unwrap();
    let model_b: Arc<dyn Embeddings> = Arc::new(NamedModel("model-b"));
    let err = CollectionIndex::open(client.clone(), "docs", Some(model_b), None).unwrap_err();
    match err {
        ApiError::EmbeddingMismatch {
            stored, requested, ..
        } => {
            assert!(stored.contains("model=model-a"));
            assert!(requested.contains("model=model-b"));
        }
        other => panic!("unexpected error: {other}"),
    }
    let info = client.get_collection("docs").unwrap().unwrap();
    assert_eq!(info.metadata[MODEL_NAME_KEY], json!("model-a"));
}
