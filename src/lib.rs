//! Steward: Interactive Agent Lifecycle Management
//!
//! Tracks discoverable, loaded and active agents behind a single lifecycle
//! controller, and wraps a vector store so every collection records the
//! embedding function that produced its vectors.

pub mod agent;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod timing;
pub mod tooling;
pub mod types;

pub use agent::{AgentManager, AgentState, StopOutcome};
pub use error::{ApiError, StorageError};
pub use index::{CollectionIndex, Embeddings, VectorClient};
