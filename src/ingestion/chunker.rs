//! Text chunking with fixed-size overlap

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, RawDocument};

/// Splits page-level documents into bounded, overlapping chunks.
///
/// Splitting is greedy on a delimiter (paragraph breaks by default): a chunk
/// ends at the last delimiter that fits inside `chunk_size`, and a
/// delimiter-free run longer than `chunk_size` is hard-split at a character
/// boundary. Every chunk after the first starts with exactly the last
/// `chunk_overlap` characters of its predecessor, which keeps context
/// continuous across chunk boundaries for embedding.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk size in characters
    chunk_size: usize,
    /// Characters carried over from the previous chunk
    overlap: usize,
    /// Preferred split boundary
    delimiter: Vec<char>,
}

impl TextChunker {
    /// Create a chunker. `chunk_size` must be positive and `chunk_overlap`
    /// strictly smaller than it.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than 0"));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::config(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap: chunk_overlap,
            delimiter: "\n\n".chars().collect(),
        })
    }

    /// Replace the default paragraph-break delimiter
    pub fn with_delimiter(mut self, delimiter: &str) -> Self {
        self.delimiter = delimiter.chars().collect();
        self
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Ok(Self::new(config.chunk_size, config.chunk_overlap)?.with_delimiter(&config.delimiter))
    }

    /// Split documents into chunks, preserving order and copying metadata
    /// from each parent document.
    pub fn split(&self, documents: &[RawDocument]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for document in documents {
            for (index, text) in self.split_text(&document.text).into_iter().enumerate() {
                chunks.push(Chunk::derived(&document.metadata, text, index as u32));
            }
        }
        chunks
    }

    /// Split one text into overlapping pieces. Indices are `char` positions,
    /// never byte offsets.
    fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut pieces = Vec::new();
        let mut start = 0;

        loop {
            let window_end = (start + self.chunk_size).min(total);
            let end = if window_end == total {
                total
            } else {
                self.find_break(&chars, start, window_end)
            };

            pieces.push(chars[start..end].iter().collect());
            if end == total {
                break;
            }
            start = end - self.overlap;
        }

        pieces
    }

    /// Find where the chunk starting at `start` should end. Prefers the last
    /// delimiter inside the window; a break must land past the overlap
    /// region so every step makes progress.
    fn find_break(&self, chars: &[char], start: usize, window_end: usize) -> usize {
        let delimiter = &self.delimiter;
        if !delimiter.is_empty() && window_end - start > delimiter.len() {
            let mut candidate = window_end - delimiter.len();
            loop {
                if chars[candidate..candidate + delimiter.len()] == delimiter[..] {
                    let end = candidate + delimiter.len();
                    if end > start + self.overlap {
                        return end;
                    }
                    break;
                }
                if candidate == start + 1 {
                    break;
                }
                candidate -= 1;
            }
        }
        window_end
    }
}
