//! Vector collections that remember their embedding function.

pub mod client;
pub mod collection;
pub mod commands;
pub mod embeddings;
pub mod tool;

pub use client::{open_vector_client, CollectionInfo, ScoredRecord, VectorClient, VectorRecord};
#[cfg(feature = "vector-store")]
pub use client::SledVectorClient;
pub use collection::CollectionIndex;
pub use commands::IndexCommandService;
pub use embeddings::{Embeddings, EmbeddingsConfig, HashingEmbeddings, HttpEmbeddings};
pub use tool::RetrievalTool;
