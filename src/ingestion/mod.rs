//! Document loading and text chunking

mod chunker;
mod loader;

pub use chunker::TextChunker;
pub use loader::PdfLoader;
