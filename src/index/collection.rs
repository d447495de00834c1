//! Embedding-aware collection handle.
//!
//! A collection's metadata records the identity of the embedding function that
//! produced its vectors under `embedding_fn`, with `model_name` and
//! `dimensions` alongside. Opening or writing with a function that differs in
//! any of them is refused; `migrate` is the only way to change it.

use crate::concurrency::CollectionLockManager;
use crate::error::{ApiError, StorageError};
use crate::index::client::{CollectionInfo, ScoredRecord, VectorClient, VectorRecord};
use crate::index::embeddings::{Embeddings, HashingEmbeddings};
use crate::index::tool::RetrievalTool;
use crate::timing::ExecutionTimer;
use crate::types::{
    Embedding, Metadata, WhereFilter, DESCRIPTION_KEY, DIMENSIONS_KEY, EMBEDDING_FN_KEY,
    MODEL_NAME_KEY,
};
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Snapshot/commit rounds `migrate` makes before giving up on a busy collection.
const MIGRATE_ATTEMPTS: usize = 3;

fn shared_locks() -> Arc<CollectionLockManager> {
    static LOCKS: OnceLock<Arc<CollectionLockManager>> = OnceLock::new();
    LOCKS
        .get_or_init(|| Arc::new(CollectionLockManager::new()))
        .clone()
}

/// Content-addressed record id: blake3 hex digest of the document.
pub fn document_id(document: &str) -> String {
    hex::encode(blake3::hash(document.as_bytes()).as_bytes())
}

/// Metadata describing `embeddings`, merged over caller-supplied metadata.
/// `width` is used when the function cannot report its own dimensions.
fn identity_metadata(embeddings: &dyn Embeddings, base: Metadata, width: Option<usize>) -> Metadata {
    let mut metadata = base;
    metadata.insert(
        EMBEDDING_FN_KEY.to_string(),
        Value::String(embeddings.identity()),
    );
    match embeddings.model_name() {
        Some(model) => {
            metadata.insert(MODEL_NAME_KEY.to_string(), Value::String(model));
        }
        None => {
            metadata.remove(MODEL_NAME_KEY);
        }
    }
    match embeddings.dimensions().or(width) {
        Some(dimensions) => {
            metadata.insert(DIMENSIONS_KEY.to_string(), Value::from(dimensions));
        }
        None => {
            metadata.remove(DIMENSIONS_KEY);
        }
    }
    metadata
}

fn stored_dimensions(metadata: &Metadata) -> Option<usize> {
    metadata
        .get(DIMENSIONS_KEY)
        .and_then(Value::as_u64)
        .map(|d| d as usize)
}

/// Identity plus model and width, for error messages.
fn describe(identity: &str, model: Option<&str>, dimensions: Option<usize>) -> String {
    let mut details = Vec::new();
    if let Some(model) = model {
        details.push(format!("model={}", model));
    }
    if let Some(dimensions) = dimensions {
        details.push(format!("dimensions={}", dimensions));
    }
    if details.is_empty() {
        identity.to_string()
    } else {
        format!("{} ({})", identity, details.join(", "))
    }
}

/// Refuse `embeddings` unless it matches what `metadata` records.
/// A collection with no recorded identity passes.
fn check_identity(
    collection: &str,
    metadata: &Metadata,
    embeddings: &dyn Embeddings,
) -> Result<(), ApiError> {
    let Some(stored) = metadata.get(EMBEDDING_FN_KEY).and_then(Value::as_str) else {
        return Ok(());
    };
    let identity = embeddings.identity();
    if stored != identity {
        return Err(ApiError::EmbeddingMismatch {
            collection: collection.to_string(),
            stored: stored.to_string(),
            requested: identity,
        });
    }

    let stored_model = metadata.get(MODEL_NAME_KEY).and_then(Value::as_str);
    let model = embeddings.model_name();
    let stored_width = stored_dimensions(metadata);
    let width = embeddings.dimensions();
    let width_differs = matches!((stored_width, width), (Some(a), Some(b)) if a != b);
    if stored_model != model.as_deref() || width_differs {
        return Err(ApiError::EmbeddingMismatch {
            collection: collection.to_string(),
            stored: describe(stored, stored_model, stored_width),
            requested: describe(&identity, model.as_deref(), width),
        });
    }
    Ok(())
}

/// Refuse vectors whose width differs from the collection's stored width.
fn check_width(
    collection: &str,
    stored: Option<usize>,
    embeddings: &dyn Embeddings,
    width: usize,
) -> Result<(), ApiError> {
    match stored {
        Some(stored) if stored != width => {
            let identity = embeddings.identity();
            let model = embeddings.model_name();
            Err(ApiError::EmbeddingMismatch {
                collection: collection.to_string(),
                stored: describe(&identity, model.as_deref(), Some(stored)),
                requested: describe(&identity, model.as_deref(), Some(width)),
            })
        }
        _ => Ok(()),
    }
}

/// Common width of `vectors`, or `None` when there are none.
fn uniform_width(vectors: &[Embedding]) -> Result<Option<usize>, ApiError> {
    let Some(first) = vectors.first() else {
        return Ok(None);
    };
    let width = first.len();
    if width == 0 || vectors.iter().any(|v| v.len() != width) {
        return Err(ApiError::Embedding(
            "embedding function returned vectors of uneven width".to_string(),
        ));
    }
    Ok(Some(width))
}

/// Width of the vectors already stored in `name`, if it has any.
fn observed_width(client: &dyn VectorClient, name: &str) -> Result<Option<usize>, ApiError> {
    Ok(client
        .get_all(name)
        .map_err(ApiError::from_storage)?
        .first()
        .map(|record| record.embedding.len()))
}

/// Same ids, documents and metadata, ignoring order.
fn same_records(before: &[VectorRecord], after: &[VectorRecord]) -> bool {
    let key = |records: &[VectorRecord]| {
        let mut keys: Vec<(String, String, Metadata)> = records
            .iter()
            .map(|r| (r.id.clone(), r.document.clone(), r.metadata.clone()))
            .collect();
        keys.sort_by(|a, b| a.0.cmp(&b.0));
        keys
    };
    before.len() == after.len() && key(before) == key(after)
}

/// Write re-embedded records and the new identity, unless the collection
/// changed since `snapshot` was read. Returns whether it committed.
fn commit_migration(
    client: &dyn VectorClient,
    locks: &CollectionLockManager,
    name: &str,
    embeddings: &dyn Embeddings,
    snapshot: &[VectorRecord],
    migrated: Vec<VectorRecord>,
    width: Option<usize>,
) -> Result<bool, ApiError> {
    let lock = locks.get_lock(name);
    let _guard = lock.write();
    let current = client.get_all(name).map_err(ApiError::from_storage)?;
    if !same_records(snapshot, &current) {
        return Ok(false);
    }
    let info = client
        .get_collection(name)?
        .ok_or_else(|| ApiError::NotFound(format!("collection {}", name)))?;
    client.upsert(name, migrated).map_err(ApiError::from_storage)?;
    client
        .update_collection_metadata(name, identity_metadata(embeddings, info.metadata, width))
        .map_err(ApiError::from_storage)?;
    Ok(true)
}

fn join_error(e: tokio::task::JoinError) -> ApiError {
    ApiError::StorageError(StorageError::Database(format!("blocking task failed: {}", e)))
}

/// Handle on one named collection with a bound embedding function.
#[derive(Clone)]
pub struct CollectionIndex {
    client: Arc<dyn VectorClient>,
    name: String,
    embeddings: Arc<dyn Embeddings>,
    locks: Arc<CollectionLockManager>,
}

impl CollectionIndex {
    /// Open or create `name`. Without `embeddings`, binds [`HashingEmbeddings`].
    ///
    /// `metadata` is only applied when the collection is created.
    pub fn open(
        client: Arc<dyn VectorClient>,
        name: &str,
        embeddings: Option<Arc<dyn Embeddings>>,
        metadata: Option<Metadata>,
    ) -> Result<Self, ApiError> {
        Self::open_with_locks(client, name, embeddings, metadata, shared_locks())
    }

    /// Open `name` only if it already exists; `NotFound` otherwise.
    pub fn open_existing(
        client: Arc<dyn VectorClient>,
        name: &str,
        embeddings: Option<Arc<dyn Embeddings>>,
    ) -> Result<Self, ApiError> {
        Self::open_inner(client, name, embeddings, None, shared_locks(), false)
    }

    pub fn open_with_locks(
        client: Arc<dyn VectorClient>,
        name: &str,
        embeddings: Option<Arc<dyn Embeddings>>,
        metadata: Option<Metadata>,
        locks: Arc<CollectionLockManager>,
    ) -> Result<Self, ApiError> {
        Self::open_inner(client, name, embeddings, metadata, locks, true)
    }

    fn open_inner(
        client: Arc<dyn VectorClient>,
        name: &str,
        embeddings: Option<Arc<dyn Embeddings>>,
        metadata: Option<Metadata>,
        locks: Arc<CollectionLockManager>,
        create: bool,
    ) -> Result<Self, ApiError> {
        let _timer = ExecutionTimer::new("collection.open");
        let embeddings: Arc<dyn Embeddings> =
            embeddings.unwrap_or_else(|| Arc::new(HashingEmbeddings::default()));
        let identity = embeddings.identity();

        let lock = locks.get_lock(name);
        let _guard = lock.write();

        let info = if create {
            let desired =
                identity_metadata(embeddings.as_ref(), metadata.unwrap_or_default(), None);
            client.get_or_create_collection(name, desired)?
        } else {
            client
                .get_collection(name)?
                .ok_or_else(|| ApiError::NotFound(format!("collection {}", name)))?
        };
        check_identity(name, &info.metadata, embeddings.as_ref())?;

        let recorded = info.metadata.contains_key(EMBEDDING_FN_KEY);
        let width_missing = stored_dimensions(&info.metadata).is_none();
        if !recorded || width_missing {
            // Predates identity or width tracking: record it now, from the
            // stored vectors when there are any.
            let observed = observed_width(client.as_ref(), name)?;
            if let Some(width) = embeddings.dimensions() {
                check_width(name, observed, embeddings.as_ref(), width)?;
            }
            let upgraded = identity_metadata(embeddings.as_ref(), info.metadata, observed);
            if stored_dimensions(&upgraded).is_some() || !recorded {
                client.update_collection_metadata(name, upgraded)?;
                info!(collection = name, embedding_fn = %identity, "Recorded embedding identity");
            }
        }

        debug!(collection = name, embedding_fn = %identity, "Opened collection");
        Ok(Self {
            client,
            name: name.to_string(),
            embeddings,
            locks,
        })
    }

    /// Re-embed every document of an existing collection with `embeddings`
    /// and rewrite its identity metadata.
    ///
    /// Records are re-embedded outside the collection lock. If the collection
    /// changed meanwhile, the snapshot is taken again.
    pub async fn migrate(
        client: Arc<dyn VectorClient>,
        name: &str,
        embeddings: Arc<dyn Embeddings>,
    ) -> Result<Self, ApiError> {
        let locks = shared_locks();
        if client.get_collection(name)?.is_none() {
            return Err(ApiError::NotFound(format!("collection {}", name)));
        }

        for attempt in 1..=MIGRATE_ATTEMPTS {
            let records = {
                let lock = locks.get_lock(name);
                let _guard = lock.read();
                client.get_all(name).map_err(ApiError::from_storage)?
            };
            let documents: Vec<String> = records.iter().map(|r| r.document.clone()).collect();
            let vectors = embeddings.embed_documents(&documents).await?;
            if vectors.len() != records.len() {
                return Err(ApiError::Embedding(format!(
                    "expected {} embeddings, got {}",
                    records.len(),
                    vectors.len()
                )));
            }
            let width = uniform_width(&vectors)?;
            if let (Some(width), Some(declared)) = (width, embeddings.dimensions()) {
                check_width(name, Some(declared), embeddings.as_ref(), width)?;
            }

            let migrated: Vec<VectorRecord> = records
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(record, embedding)| VectorRecord { embedding, ..record })
                .collect();
            let count = migrated.len();
            let committed = commit_migration(
                client.as_ref(),
                &locks,
                name,
                embeddings.as_ref(),
                &records,
                migrated,
                width,
            )?;
            if !committed {
                warn!(collection = name, attempt, "Collection changed during migration");
                continue;
            }

            info!(
                collection = name,
                embedding_fn = %embeddings.identity(),
                records = count,
                "Migrated collection"
            );
            return Ok(Self {
                client,
                name: name.to_string(),
                embeddings,
                locks,
            });
        }

        Err(ApiError::StorageError(StorageError::Database(format!(
            "collection {} kept changing during migration",
            name
        ))))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn embeddings(&self) -> &Arc<dyn Embeddings> {
        &self.embeddings
    }

    /// Embed and upsert `texts`. Returns the ids written.
    pub async fn add_texts(
        &self,
        texts: &[String],
        metadatas: Option<Vec<Metadata>>,
        ids: Option<Vec<String>>,
    ) -> Result<Vec<String>, ApiError> {
        if let Some(metadatas) = &metadatas {
            if metadatas.len() != texts.len() {
                return Err(ApiError::InvalidArgument(format!(
                    "{} metadatas for {} texts",
                    metadatas.len(),
                    texts.len()
                )));
            }
        }
        if let Some(ids) = &ids {
            if ids.len() != texts.len() {
                return Err(ApiError::InvalidArgument(format!(
                    "{} ids for {} texts",
                    ids.len(),
                    texts.len()
                )));
            }
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.embeddings.embed_documents(texts).await?;
        if vectors.len() != texts.len() {
            return Err(ApiError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        let width = uniform_width(&vectors)?;
        let ids = ids.unwrap_or_else(|| texts.iter().map(|t| document_id(t)).collect());
        let mut metadatas = metadatas.map(Vec::into_iter);
        let records: Vec<VectorRecord> = texts
            .iter()
            .zip(vectors)
            .zip(&ids)
            .map(|((document, embedding), id)| VectorRecord {
                id: id.clone(),
                embedding,
                document: document.clone(),
                metadata: metadatas
                    .as_mut()
                    .and_then(Iterator::next)
                    .unwrap_or_default(),
            })
            .collect();

        let lock = self.locks.get_lock(&self.name);
        let _guard = lock.write();
        let metadata = self.metadata()?;
        check_identity(&self.name, &metadata, self.embeddings.as_ref())?;
        if let Some(width) = width {
            check_width(&self.name, stored_dimensions(&metadata), self.embeddings.as_ref(), width)?;
            if stored_dimensions(&metadata).is_none() {
                let mut recorded = metadata;
                recorded.insert(DIMENSIONS_KEY.to_string(), Value::from(width));
                self.client.update_collection_metadata(&self.name, recorded)?;
                debug!(collection = %self.name, dimensions = width, "Recorded collection width");
            }
        }
        self.client
            .upsert(&self.name, records)
            .map_err(ApiError::from_storage)?;
        Ok(ids)
    }

    /// The `k` records closest to `query`.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&WhereFilter>,
    ) -> Result<Vec<ScoredRecord>, ApiError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embeddings.embed_query(query).await?;
        let lock = self.locks.get_lock(&self.name);
        let _guard = lock.read();
        let metadata = self.metadata()?;
        check_identity(&self.name, &metadata, self.embeddings.as_ref())?;
        check_width(
            &self.name,
            stored_dimensions(&metadata),
            self.embeddings.as_ref(),
            embedding.len(),
        )?;
        self.client
            .query(&self.name, &embedding, k, filter)
            .map_err(ApiError::from_storage)
    }

    /// Delete records by id and/or metadata filter. At least one is required.
    pub fn delete(
        &self,
        ids: Option<&[String]>,
        filter: Option<&WhereFilter>,
    ) -> Result<usize, ApiError> {
        delete_records(&*self.client, &self.locks, &self.name, ids, filter)
    }

    pub async fn delete_async(
        &self,
        ids: Option<Vec<String>>,
        filter: Option<WhereFilter>,
    ) -> Result<usize, ApiError> {
        let client = self.client.clone();
        let locks = self.locks.clone();
        let name = self.name.clone();
        tokio::task::spawn_blocking(move || {
            delete_records(&*client, &locks, &name, ids.as_deref(), filter.as_ref())
        })
        .await
        .map_err(join_error)?
    }

    /// Delete records from a named collection without binding an embedding function.
    pub async fn delete_in_named_collection_async(
        client: Arc<dyn VectorClient>,
        name: String,
        ids: Option<Vec<String>>,
        filter: Option<WhereFilter>,
    ) -> Result<usize, ApiError> {
        tokio::task::spawn_blocking(move || {
            delete_records(&*client, &shared_locks(), &name, ids.as_deref(), filter.as_ref())
        })
        .await
        .map_err(join_error)?
    }

    /// Drop this collection and all its records. Irreversible.
    pub fn delete_collection(&self) -> Result<(), ApiError> {
        drop_collection(&*self.client, &self.locks, &self.name)
    }

    pub async fn delete_collection_async(&self) -> Result<(), ApiError> {
        Self::delete_named_collection_async(self.client.clone(), self.name.clone()).await
    }

    /// Drop a collection by name without opening it.
    pub fn delete_named_collection(client: &dyn VectorClient, name: &str) -> Result<(), ApiError> {
        drop_collection(client, &shared_locks(), name)
    }

    pub async fn delete_named_collection_async(
        client: Arc<dyn VectorClient>,
        name: String,
    ) -> Result<(), ApiError> {
        tokio::task::spawn_blocking(move || {
            drop_collection(&*client, &shared_locks(), &name)
        })
        .await
        .map_err(join_error)?
    }

    /// Current record count, read from the store.
    pub fn count(&self) -> Result<usize, ApiError> {
        let _timer = ExecutionTimer::new("collection.count");
        let lock = self.locks.get_lock(&self.name);
        let _guard = lock.read();
        self.client.count(&self.name).map_err(ApiError::from_storage)
    }

    pub async fn count_async(&self) -> Result<usize, ApiError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.count())
            .await
            .map_err(join_error)?
    }

    /// Names and metadata of every collection. No embedding function is built.
    pub fn list_collections(client: &dyn VectorClient) -> Result<Vec<CollectionInfo>, ApiError> {
        Ok(client.list_collections()?)
    }

    pub fn metadata(&self) -> Result<Metadata, ApiError> {
        self.client
            .get_collection(&self.name)?
            .map(|info| info.metadata)
            .ok_or_else(|| ApiError::NotFound(format!("collection {}", self.name)))
    }

    pub fn description(&self) -> Result<Option<String>, ApiError> {
        Ok(self
            .metadata()?
            .get(DESCRIPTION_KEY)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Retrieval tool over this collection, named `search_<collection>`.
    pub fn retrieval_tool(&self, description: Option<String>, return_direct: bool) -> RetrievalTool {
        RetrievalTool::new(self.clone(), description, return_direct)
    }
}

impl std::fmt::Debug for CollectionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionIndex")
            .field("name", &self.name)
            .field("embedding_fn", &self.embeddings.identity())
            .finish()
    }
}

fn delete_records(
    client: &dyn VectorClient,
    locks: &CollectionLockManager,
    name: &str,
    ids: Option<&[String]>,
    filter: Option<&WhereFilter>,
) -> Result<usize, ApiError> {
    if ids.is_none() && filter.is_none() {
        return Err(ApiError::InvalidArgument(
            "delete requires ids or a where filter".to_string(),
        ));
    }
    let lock = locks.get_lock(name);
    let _guard = lock.write();
    let removed = client
        .delete(name, ids, filter)
        .map_err(ApiError::from_storage)?;
    debug!(collection = name, removed, "Deleted records");
    Ok(removed)
}

fn drop_collection(
    client: &dyn VectorClient,
    locks: &CollectionLockManager,
    name: &str,
) -> Result<(), ApiError> {
    {
        let lock = locks.get_lock(name);
        let _guard = lock.write();
        client
            .delete_collection(name)
            .map_err(ApiError::from_storage)?;
    }
    locks.forget(name);
    info!(collection = name, "Deleted collection");
    Ok(())
}
