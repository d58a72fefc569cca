//! Error types for the ingestion worker

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ingestion worker errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Job payload could not be decoded
    #[error("Malformed job payload: {0}")]
    MalformedJob(String),

    /// Source file does not exist
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Source file is not a document of the expected type
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Document content could not be parsed
    #[error("Failed to parse '{path}': {message}")]
    Parse { path: String, message: String },

    /// Embedding API rejected the configured credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Embedding API throttled the request
    #[error("Rate limited by embedding API: {0}")]
    RateLimit(String),

    /// Transport-level failure talking to the embedding API
    #[error("Network error: {0}")]
    Network(String),

    /// Local embedding model could not be initialized
    #[error("Failed to load embedding model: {0}")]
    ModelLoad(String),

    /// Embedding generation failed
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Vector batch does not match the collection's dimensionality
    #[error("collection '{collection}' stores {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    /// Vector store is unreachable
    #[error("Vector store unreachable: {0}")]
    Connection(String),

    /// Vector store rejected the request
    #[error("Vector store error: {0}")]
    VectorDb(String),

    /// Job exceeded its processing deadline
    #[error("Job timed out after {0}s")]
    JobTimeout(u64),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a parse error
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector store error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Whether the failure is transient and worth redelivering.
    ///
    /// The worker never retries on its own; this classification is reported
    /// to the queue so its retry/backoff policy can decide.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RateLimit(_) | Error::Network(_) | Error::Connection(_) | Error::JobTimeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(Error::Network("connection reset".into()).is_retryable());
        assert!(Error::RateLimit("429".into()).is_retryable());
        assert!(Error::Connection("refused".into()).is_retryable());
        assert!(Error::JobTimeout(300).is_retryable());
    }

    #[test]
    fn permanent_errors_are_not_retryable() {
        assert!(!Error::MalformedJob("missing path".into()).is_retryable());
        assert!(!Error::UnsupportedFormat("txt".into()).is_retryable());
        assert!(!Error::parse("a.pdf", "corrupt").is_retryable());
        assert!(!Error::Authentication("bad key".into()).is_retryable());
    }
}
