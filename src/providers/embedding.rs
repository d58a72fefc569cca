//! Embedding provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Trait for generating text embeddings.
///
/// Implementations:
/// - `OpenAiEmbedder`: remote OpenAI-compatible embeddings API
/// - `LocalEmbedder`: local ONNX model (all-MiniLM-L6-v2)
///
/// One instance is shared across all concurrent jobs, so implementations
/// must be safe to call from multiple tasks. Both variants are deterministic
/// for identical input text and model configuration.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate one embedding per input text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimensionality of the vectors this provider produces
    fn dimensions(&self) -> usize;

    /// Provider name for logging
    fn name(&self) -> &str;
}
