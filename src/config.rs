//! Configuration for the ingestion worker

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main worker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Job processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Text chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Embedding provider configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    /// Vector database configuration
    #[serde(default)]
    pub vector_db: VectorDbConfig,
}

impl IngestConfig {
    /// Read configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&raw)
            .map_err(|e| Error::config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Load configuration from an optional file, then apply environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(key) = get("OPENAI_API_KEY") {
            self.embeddings.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.embeddings.base_url = url;
        }
        if let Some(backend) = get("EMBEDDING_BACKEND") {
            self.embeddings.backend = match backend.to_lowercase().as_str() {
                "openai" => EmbeddingBackend::OpenAi,
                "local" => EmbeddingBackend::Local,
                other => {
                    return Err(Error::config(format!(
                        "EMBEDDING_BACKEND must be 'openai' or 'local', got '{other}'"
                    )))
                }
            };
        }
        if let Some(url) = get("QDRANT_URL") {
            self.vector_db.url = url;
        }
        if let Some(collection) = get("QDRANT_COLLECTION") {
            self.vector_db.collection = collection;
        }
        if let Some(key) = get("QDRANT_API_KEY") {
            self.vector_db.api_key = Some(key);
        }
        if let Some(concurrency) = get("INGEST_CONCURRENCY") {
            self.processing.concurrency = concurrency.parse().map_err(|_| {
                Error::config(format!(
                    "INGEST_CONCURRENCY must be a positive integer, got '{concurrency}'"
                ))
            })?;
        }
        Ok(())
    }

    /// Validate settings that must hold before the worker starts
    pub fn validate(&self) -> Result<()> {
        if self.processing.concurrency == 0 {
            return Err(Error::config("processing.concurrency must be at least 1"));
        }
        if self.processing.queue_capacity == 0 {
            return Err(Error::config("processing.queue_capacity must be at least 1"));
        }
        if self.chunking.chunk_size == 0 {
            return Err(Error::config("chunking.chunk_size must be greater than 0"));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::config("embeddings.batch_size must be at least 1"));
        }
        if self.embeddings.backend == EmbeddingBackend::OpenAi
            && self
                .embeddings
                .api_key
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .is_empty()
        {
            return Err(Error::config(
                "the openai embedding backend requires an API key (set OPENAI_API_KEY)",
            ));
        }
        Ok(())
    }
}

/// Job processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Maximum number of jobs processed simultaneously
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Timeout for a single job in seconds; a timed-out job is failed and
    /// reported retryable
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,
    /// Capacity of the in-process delivery channel
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_concurrency() -> usize {
    num_cpus::get().clamp(1, 8)
}
fn default_job_timeout() -> u64 {
    300
}
fn default_queue_capacity() -> usize {
    1024
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            job_timeout_secs: default_job_timeout(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters of context carried over between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Boundary the chunker prefers to split on
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_delimiter() -> String {
    "\n\n".to_string()
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            delimiter: default_delimiter(),
        }
    }
}

/// Embedding backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Remote OpenAI-compatible embeddings API
    #[default]
    OpenAi,
    /// Local ONNX model
    Local,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Which provider variant to use
    #[serde(default)]
    pub backend: EmbeddingBackend,
    /// Model name; defaults per backend when unset
    #[serde(default)]
    pub model: Option<String>,
    /// Vector dimensionality; defaults per backend when unset
    #[serde(default)]
    pub dimensions: Option<usize>,
    /// API key for the remote backend
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL of the remote embeddings API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    /// Number of texts sent per embedding request/inference batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Request timeout in seconds (remote backend)
    #[serde(default = "default_embed_timeout")]
    pub timeout_secs: u64,
    /// Maximum token sequence length (local backend)
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Cache directory for downloaded models (local backend)
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_embed_timeout() -> u64 {
    60
}
fn default_max_length() -> usize {
    256
}
fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("doc-ingest")
        .join("models")
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model: None,
            dimensions: None,
            api_key: None,
            base_url: default_openai_base_url(),
            batch_size: default_batch_size(),
            timeout_secs: default_embed_timeout(),
            max_length: default_max_length(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl EmbeddingConfig {
    /// Model name, falling back to the backend's default
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(match self.backend {
            EmbeddingBackend::OpenAi => "text-embedding-3-small",
            EmbeddingBackend::Local => "all-MiniLM-L6-v2",
        })
    }

    /// Vector dimensionality, falling back to the backend's default
    pub fn dimensions(&self) -> usize {
        self.dimensions.unwrap_or(match self.backend {
            EmbeddingBackend::OpenAi => 1536,
            EmbeddingBackend::Local => 384,
        })
    }
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDbConfig {
    /// Qdrant base URL
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    /// Collection that ingested vectors are written to
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Optional API key sent with every request
    #[serde(default)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}
fn default_collection() -> String {
    "documents".to_string()
}
fn default_store_timeout() -> u64 {
    30
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
            timeout_secs: default_store_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> IngestConfig {
        let mut config = IngestConfig::default();
        config.embeddings.api_key = Some("sk-test".to_string());
        config
    }

    #[test]
    fn defaults_validate_with_api_key() {
        valid_config().validate().unwrap();
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = valid_config();
        config.processing.concurrency = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let mut config = valid_config();
        config.chunking.chunk_size = 100;
        config.chunking.chunk_overlap = 100;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn openai_backend_requires_api_key() {
        let mut config = IngestConfig::default();
        config.embeddings.api_key = None;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.embeddings.backend = EmbeddingBackend::Local;
        config.validate().unwrap();
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = IngestConfig::default();
        config
            .apply_env_from(|key| match key {
                "OPENAI_API_KEY" => Some("sk-from-env".to_string()),
                "QDRANT_URL" => Some("http://qdrant:6333".to_string()),
                "QDRANT_COLLECTION" => Some("uploads".to_string()),
                "EMBEDDING_BACKEND" => Some("local".to_string()),
                "INGEST_CONCURRENCY" => Some("3".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.embeddings.api_key.as_deref(), Some("sk-from-env"));
        assert_eq!(config.vector_db.url, "http://qdrant:6333");
        assert_eq!(config.vector_db.collection, "uploads");
        assert_eq!(config.embeddings.backend, EmbeddingBackend::Local);
        assert_eq!(config.processing.concurrency, 3);
    }

    #[test]
    fn invalid_env_values_are_rejected() {
        let mut config = IngestConfig::default();
        let err = config
            .apply_env_from(|key| (key == "INGEST_CONCURRENCY").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = config
            .apply_env_from(|key| (key == "EMBEDDING_BACKEND").then(|| "remote".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn backend_defaults_differ() {
        let openai = EmbeddingConfig::default();
        assert_eq!(openai.model(), "text-embedding-3-small");
        assert_eq!(openai.dimensions(), 1536);

        let local = EmbeddingConfig {
            backend: EmbeddingBackend::Local,
            ..Default::default()
        };
        assert_eq!(local.model(), "all-MiniLM-L6-v2");
        assert_eq!(local.dimensions(), 384);
    }

    #[test]
    fn parses_toml_sections() {
        let config: IngestConfig = toml::from_str(
            r#"
            [processing]
            concurrency = 2

            [chunking]
            chunk_size = 500
            chunk_overlap = 50

            [embeddings]
            backend = "local"

            [vector_db]
            collection = "papers"
            "#,
        )
        .unwrap();
        assert_eq!(config.processing.concurrency, 2);
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.embeddings.backend, EmbeddingBackend::Local);
        assert_eq!(config.vector_db.collection, "papers");
    }
}
