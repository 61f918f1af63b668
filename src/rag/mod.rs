//! Retrieval-augmented generation core.
//!
//! This module owns the retrieval pipeline:
//! - `chunker`: splits documents into overlapping windows
//! - `embedder`: maps text to unit-length vectors via a pluggable provider
//! - `index`: searchable vector index with an HNSW and a flat matrix variant
//! - `store`: per-key durable collection of chunk/vector pairs
//! - `ingest` / `retrieve`: the two operations the rest of the app calls

pub mod chunker;
pub mod embedder;
pub mod index;
pub mod ingest;
pub mod retrieve;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use chunker::chunk_text;
pub use embedder::{EmbeddingProvider, HttpEmbedder};
pub use ingest::IngestionService;
pub use retrieve::RetrievalService;
pub use store::{SearchHit, VectorStore};

/// Chunking and retrieval parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks
    pub chunk_overlap: usize,
    /// Default number of chunks returned per query
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            chunk_overlap: 200,
            top_k: 5,
        }
    }
}

impl RetrievalConfig {
    /// Reads the `rag` section of the app config, falling back to defaults
    /// for missing fields.
    pub fn from_config(config: &Value) -> Self {
        let defaults = Self::default();
        let section = config.get("rag");

        let read = |key: &str, fallback: usize| {
            section
                .and_then(|v| v.get(key))
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .unwrap_or(fallback)
        };

        Self {
            chunk_size: read("chunk_size", defaults.chunk_size),
            chunk_overlap: read("chunk_overlap", defaults.chunk_overlap),
            top_k: read("top_k", defaults.top_k),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_config_reads_rag_section() {
        let config = json!({
            "rag": { "chunk_size": 50, "chunk_overlap": 10, "top_k": 2 }
        });

        let retrieval = RetrievalConfig::from_config(&config);
        assert_eq!(retrieval.chunk_size, 50);
        assert_eq!(retrieval.chunk_overlap, 10);
        assert_eq!(retrieval.top_k, 2);
    }

    #[test]
    fn from_config_falls_back_to_defaults() {
        let retrieval = RetrievalConfig::from_config(&json!({}));
        assert_eq!(retrieval.chunk_size, 1200);
        assert_eq!(retrieval.chunk_overlap, 200);
        assert_eq!(retrieval.top_k, 5);
    }
}
