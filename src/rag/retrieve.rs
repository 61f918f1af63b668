//! Query-time retrieval.

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::rag::embedder::EmbeddingProvider;
use crate::rag::store::VectorStore;

#[derive(Clone)]
pub struct RetrievalService {
    vector_root: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl RetrievalService {
    pub fn new(vector_root: PathBuf, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            vector_root,
            embedder,
        }
    }

    /// Resolve `key` to its store and return the `top_k` closest chunk
    /// texts for `query`, best first.
    ///
    /// An empty key short-circuits to an empty result without touching
    /// storage; retrieval only makes sense after an ingestion produced a key.
    pub async fn retrieve(
        &self,
        key: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<String>, ApiError> {
        if key.is_empty() {
            return Ok(Vec::new());
        }

        let store = VectorStore::open(&self.vector_root, key, self.embedder.clone()).await;
        let hits = store.search(query, top_k).await?;
        Ok(hits.into_iter().map(|hit| hit.text).collect())
    }
}
