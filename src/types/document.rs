//! Document, chunk, and vector record types

use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Metadata attached to a page-level document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Source file path as referenced by the job
    pub source: String,
    /// Page number within the source file (1-indexed)
    pub page: u32,
    /// SHA-256 of the extracted page text, for deduplication and debugging
    pub content_hash: String,
}

/// One page of extracted text from a source file
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub text: String,
    pub metadata: DocumentMetadata,
}

impl RawDocument {
    /// Create a page-level document, hashing its content
    pub fn new(source: impl Into<String>, page: u32, text: String) -> Self {
        let content_hash = hash_content(&text);
        Self {
            text,
            metadata: DocumentMetadata {
                source: source.into(),
                page,
                content_hash,
            },
        }
    }
}

/// Metadata attached to a chunk, copied from its parent document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub page: u32,
    pub content_hash: String,
    /// Position of the chunk within its parent document
    pub chunk_index: u32,
}

/// A bounded slice of document text prepared for embedding
#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Derive a chunk from its parent document's metadata
    pub fn derived(parent: &DocumentMetadata, text: String, chunk_index: u32) -> Self {
        Self {
            text,
            metadata: ChunkMetadata {
                source: parent.source.clone(),
                page: parent.page,
                content_hash: parent.content_hash.clone(),
                chunk_index,
            },
        }
    }

    /// Deterministic record identity: the same source, page, and chunk index
    /// always map to the same UUID, so re-ingestion overwrites instead of
    /// duplicating.
    pub fn record_id(&self) -> Uuid {
        let key = format!(
            "{}:{}:{}",
            self.metadata.source, self.metadata.page, self.metadata.chunk_index
        );
        Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
    }
}

/// The unit persisted in the vector store, 1:1 with a chunk
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl VectorRecord {
    /// Pair a chunk with its embedding
    pub fn from_chunk(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.record_id(),
            vector,
            text: chunk.text,
            metadata: chunk.metadata,
        }
    }

    /// Payload stored alongside the vector
    pub fn payload(&self) -> serde_json::Value {
        json!({
            "text": self.text,
            "source": self.metadata.source,
            "page": self.metadata.page,
            "chunk_index": self.metadata.chunk_index,
            "content_hash": self.metadata.content_hash,
        })
    }
}

/// Hash content for deduplication
pub(crate) fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk(source: &str, page: u32, index: u32) -> Chunk {
        let doc = RawDocument::new(source, page, "some page text".to_string());
        Chunk::derived(&doc.metadata, "some page text".to_string(), index)
    }

    #[test]
    fn record_id_is_deterministic() {
        let a = sample_chunk("docs/report.pdf", 1, 0);
        let b = sample_chunk("docs/report.pdf", 1, 0);
        assert_eq!(a.record_id(), b.record_id());
    }

    #[test]
    fn record_id_distinguishes_position() {
        let base = sample_chunk("docs/report.pdf", 1, 0);
        assert_ne!(base.record_id(), sample_chunk("docs/report.pdf", 1, 1).record_id());
        assert_ne!(base.record_id(), sample_chunk("docs/report.pdf", 2, 0).record_id());
        assert_ne!(base.record_id(), sample_chunk("docs/other.pdf", 1, 0).record_id());
    }

    #[test]
    fn chunk_copies_parent_metadata() {
        let doc = RawDocument::new("a.pdf", 3, "page three".to_string());
        let chunk = Chunk::derived(&doc.metadata, "page".to_string(), 7);
        assert_eq!(chunk.metadata.source, "a.pdf");
        assert_eq!(chunk.metadata.page, 3);
        assert_eq!(chunk.metadata.content_hash, doc.metadata.content_hash);
        assert_eq!(chunk.metadata.chunk_index, 7);
    }

    #[test]
    fn payload_carries_text_and_metadata() {
        let chunk = sample_chunk("a.pdf", 1, 2);
        let record = VectorRecord::from_chunk(chunk, vec![0.1, 0.2]);
        let payload = record.payload();
        assert_eq!(payload["text"], "some page text");
        assert_eq!(payload["source"], "a.pdf");
        assert_eq!(payload["page"], 1);
        assert_eq!(payload["chunk_index"], 2);
    }
}
