//! Embedding functions.
//!
//! A collection records the identity of the function that produced its
//! vectors. The identity is the fully qualified Rust type name. Two
//! differently configured instances of the same type share an identity and
//! are told apart by `model_name` and `dimensions`.

use crate::error::ApiError;
use crate::types::Embedding;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use unicode_normalization::UnicodeNormalization;

/// Dimensionality of the default embedding function.
pub const DEFAULT_DIMENSIONS: usize = 384;

#[async_trait]
pub trait Embeddings: Send + Sync {
    /// Fully qualified identity of the embedding function.
    fn identity(&self) -> String;

    /// Model name, when the function is backed by a named model.
    fn model_name(&self) -> Option<String> {
        None
    }

    /// Width of the vectors this function produces, when known up front.
    fn dimensions(&self) -> Option<usize> {
        None
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>, ApiError>;

    async fn embed_query(&self, text: &str) -> Result<Embedding, ApiError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ApiError::Embedding("embedding function returned no vector".to_string()))
    }
}

/// Identity string for an embedding type.
pub fn identity_of<T: ?Sized>() -> String {
    std::any::type_name::<T>().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    Hashing,
    Http,
}

/// Embedding settings under `[index.embeddings]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub provider: EmbeddingProvider,
    pub model: Option<String>,
    /// Base URL of an OpenAI-compatible API, e.g. `http://localhost:11434/v1`
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Vector width. Hashing defaults to 384; HTTP learns it from the first response.
    pub dimensions: Option<usize>,
    pub timeout_ms: u64,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hashing,
            model: None,
            endpoint: None,
            api_key: None,
            dimensions: None,
            timeout_ms: 30_000,
        }
    }
}

/// Build the embedding function described by `config`.
pub fn from_config(config: &EmbeddingsConfig) -> Result<Arc<dyn Embeddings>, ApiError> {
    match config.provider {
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbeddings::new(
            config.dimensions.unwrap_or(DEFAULT_DIMENSIONS),
        )?)),
        EmbeddingProvider::Http => {
            let endpoint = config.endpoint.clone().ok_or_else(|| {
                ApiError::ConfigError("index.embeddings.endpoint is required for http".to_string())
            })?;
            let model = config.model.clone().ok_or_else(|| {
                ApiError::ConfigError("index.embeddings.model is required for http".to_string())
            })?;
            let http = HttpEmbeddings::new(
                endpoint,
                model,
                config.api_key.clone(),
                Duration::from_millis(config.timeout_ms),
            )?;
            Ok(Arc::new(match config.dimensions {
                Some(dimensions) => http.with_dimensions(dimensions),
                None => http,
            }))
        }
    }
}

/// Local feature-hashing embeddings.
///
/// Text is NFKC-normalized and lowercased, split into alphanumeric tokens,
/// and every token plus every adjacent token pair is hashed with blake3 into
/// a signed bucket. The result is L2-normalized, so cosine similarity tracks
/// shared vocabulary. Deterministic across processes and platforms.
#[derive(Debug, Clone)]
pub struct HashingEmbeddings {
    dimensions: usize,
}

impl HashingEmbeddings {
    pub fn new(dimensions: usize) -> Result<Self, ApiError> {
        if dimensions == 0 {
            return Err(ApiError::InvalidArgument(
                "embedding dimensions must be positive".to_string(),
            ));
        }
        Ok(Self { dimensions })
    }

    pub fn embed(&self, text: &str) -> Embedding {
        let normalized: String = text.nfkc().collect::<String>().to_lowercase();
        let tokens: Vec<&str> = normalized
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let mut vector = vec![0f32; self.dimensions];
        for token in &tokens {
            self.accumulate(&mut vector, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let joined = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, joined.as_bytes(), 0.5);
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let digest = blake3::hash(feature);
        let bytes = digest.as_bytes();
        let mut index = [0u8; 8];
        index.copy_from_slice(&bytes[..8]);
        let bucket = (u64::from_le_bytes(index) % self.dimensions as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbeddings {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

#[async_trait]
impl Embeddings for HashingEmbeddings {
    fn identity(&self) -> String {
        identity_of::<Self>()
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>, ApiError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Embeddings served by an OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbeddings {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    /// Configured, or fixed by the first response
    dimensions: OnceLock<usize>,
}

impl HttpEmbeddings {
    const BATCH_SIZE: usize = 64;

    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Embedding(format!("cannot create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            dimensions: OnceLock::new(),
        })
    }

    /// Expect vectors of exactly `dimensions` entries.
    pub fn with_dimensions(self, dimensions: usize) -> Self {
        let _ = self.dimensions.set(dimensions);
        self
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Embedding>, ApiError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: batch,
            encoding_format: "float",
        };
        let mut builder = self
            .client
            .post(format!("{}/embeddings", self.endpoint))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Embedding(format!("request failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Embedding(format!("HTTP {}: {}", status, body)));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Embedding(format!("invalid response: {}", e)))?;
        if parsed.data.len() != batch.len() {
            return Err(ApiError::Embedding(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);
        let vectors: Vec<Embedding> = parsed.data.into_iter().map(|d| d.embedding).collect();
        if let Some(first) = vectors.first() {
            let width = *self.dimensions.get_or_init(|| first.len());
            if let Some(bad) = vectors.iter().find(|v| v.len() != width) {
                return Err(ApiError::Embedding(format!(
                    "model {} returned {} dimensions, expected {}",
                    self.model,
                    bad.len(),
                    width
                )));
            }
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embeddings for HttpEmbeddings {
    fn identity(&self) -> String {
        identity_of::<Self>()
    }

    fn model_name(&self) -> Option<String> {
        Some(self.model.clone())
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions.get().copied()
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>, ApiError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(Self::BATCH_SIZE) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}
