//! Provider abstractions for embeddings and vector storage
//!
//! Both providers are constructed once at startup and shared across all
//! concurrent jobs.

pub mod embedding;
pub mod local;
pub mod openai;
pub mod qdrant;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use local::LocalEmbedder;
pub use openai::OpenAiEmbedder;
pub use qdrant::QdrantStore;
pub use vector_store::VectorStore;

use std::sync::Arc;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::Result;

/// Build the embedding provider selected by configuration.
pub async fn embedding_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.backend {
        EmbeddingBackend::OpenAi => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        EmbeddingBackend::Local => Ok(Arc::new(LocalEmbedder::new(config).await?)),
    }
}
