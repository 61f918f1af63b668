//! Per-key durable vector store.
//!
//! Each store owns one directory under the vector root, named by its key:
//! `chunks.json` holds the ordered chunk texts and `index.bin` the serialized
//! vector index. A store that fails to load for any reason (missing files,
//! bad header, count mismatch) resets to an empty valid state instead of
//! propagating the error; re-ingestion repopulates it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::rag::embedder::EmbeddingProvider;
use crate::rag::index::{self, VectorIndex};

const CHUNKS_FILE: &str = "chunks.json";
const INDEX_FILE: &str = "index.bin";

/// One ranked search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub text: String,
    pub score: f32,
}

pub struct VectorStore {
    key: String,
    dir: PathBuf,
    texts: Vec<String>,
    index: Option<Box<dyn VectorIndex>>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl VectorStore {
    /// Open the store for `key`, loading prior state when present.
    ///
    /// Never fails: a corrupted or partially written store is discarded with
    /// a warning and the store starts empty.
    pub async fn open(root: &Path, key: &str, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let dir = root.join(key);
        let _ = tokio::fs::create_dir_all(&dir).await;

        let mut store = Self {
            key: key.to_string(),
            dir,
            texts: Vec::new(),
            index: None,
            embedder,
        };

        if let Err(err) = store.load().await {
            tracing::warn!(
                "Discarding unreadable vector store '{}': {}",
                store.key,
                err
            );
            store.texts.clear();
            store.index = None;
        }

        store
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    async fn load(&mut self) -> Result<(), ApiError> {
        let chunks_path = self.dir.join(CHUNKS_FILE);
        if !chunks_path.exists() {
            return Ok(());
        }

        let raw = tokio::fs::read_to_string(&chunks_path)
            .await
            .map_err(ApiError::internal)?;
        let texts: Vec<String> = serde_json::from_str(&raw).map_err(ApiError::internal)?;

        let bytes = tokio::fs::read(self.dir.join(INDEX_FILE))
            .await
            .map_err(ApiError::internal)?;
        let (written_by, loaded) = index::decode(&bytes)?;

        if loaded.len() != texts.len() {
            return Err(ApiError::Internal(format!(
                "store holds {} chunks but {} vectors",
                texts.len(),
                loaded.len()
            )));
        }

        tracing::debug!(
            "Loaded vector store '{}' ({} chunks, written by {:?}, serving via {:?})",
            self.key,
            texts.len(),
            written_by,
            loaded.kind()
        );

        self.index = if texts.is_empty() { None } else { Some(loaded) };
        self.texts = texts;
        Ok(())
    }

    async fn persist(&self) -> Result<(), ApiError> {
        let chunks_json = serde_json::to_string(&self.texts).map_err(ApiError::internal)?;
        tokio::fs::write(self.dir.join(CHUNKS_FILE), chunks_json)
            .await
            .map_err(ApiError::internal)?;

        let bytes = match &self.index {
            Some(index) => index::encode(index.as_ref()),
            None => index::encode(index::build_index(0).as_ref()),
        };
        tokio::fs::write(self.dir.join(INDEX_FILE), bytes)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }

    /// Replace the store contents with `chunks`. The only operation that
    /// discards prior contents.
    pub async fn build(&mut self, chunks: Vec<String>) -> Result<(), ApiError> {
        let vectors = if chunks.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed(&chunks).await?
        };

        let index = match vectors.first() {
            Some(first) => {
                let mut index = index::build_index(first.len());
                index.add(&vectors)?;
                Some(index)
            }
            None => None,
        };

        tracing::debug!(
            "Built vector store '{}' with {} chunks ({})",
            self.key,
            chunks.len(),
            self.embedder.model()
        );

        self.texts = chunks;
        self.index = index;
        self.persist().await
    }

    /// Append `chunks` without discarding prior contents. No-op on empty
    /// input; equivalent to `build` when the store is empty.
    pub async fn add(&mut self, chunks: Vec<String>) -> Result<(), ApiError> {
        if chunks.is_empty() {
            return Ok(());
        }
        if self.texts.is_empty() {
            return self.build(chunks).await;
        }

        let vectors = self.embedder.embed(&chunks).await?;
        let index = self.index.as_mut().ok_or_else(|| {
            ApiError::Internal("vector index missing for populated store".to_string())
        })?;
        index.add(&vectors)?;

        self.texts.extend(chunks);
        self.persist().await
    }

    /// Top-k chunks by similarity to `query`, descending, ties broken by
    /// ingestion order. An empty store or `k == 0` yields an empty result.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, ApiError> {
        if k == 0 || self.texts.is_empty() {
            return Ok(Vec::new());
        }
        let index = match &self.index {
            Some(index) => index,
            None => return Ok(Vec::new()),
        };

        let mut embedded = self.embedder.embed(&[query.to_string()]).await?;
        let query_vector = embedded.pop().ok_or_else(|| {
            ApiError::Internal("embedding backend returned no vector for query".to_string())
        })?;

        let ranked = index.search(&query_vector, k)?;
        Ok(ranked
            .into_iter()
            .filter_map(|(id, score)| {
                self.texts.get(id).map(|text| SearchHit {
                    text: text.clone(),
                    score,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::testing::MockEmbedder;
    use tempfile::TempDir;

    fn embedder() -> Arc<dyn EmbeddingProvider> {
        Arc::new(MockEmbedder::new(256))
    }

    fn docs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn build_and_search_ranks_similar_chunks_first() {
        let dir = TempDir::new().unwrap();
        let mut store = VectorStore::open(dir.path(), "k1", embedder()).await;

        store
            .build(docs(&[
                "shipping rates for express delivery",
                "warranty covers manufacturing defects",
                "express delivery takes two days",
            ]))
            .await
            .unwrap();

        let hits = store.search("express delivery", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
        assert!(hits.iter().all(|h| h.text.contains("express delivery")));
    }

    #[tokio::test]
    async fn empty_store_and_zero_k_return_empty() {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::open(dir.path(), "empty", embedder()).await;

        assert!(store.is_empty());
        assert!(store.search("anything", 5).await.unwrap().is_empty());

        let mut store = store;
        store.build(docs(&["one chunk"])).await.unwrap();
        assert!(store.search("one chunk", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_returns_at_most_store_size() {
        let dir = TempDir::new().unwrap();
        let mut store = VectorStore::open(dir.path(), "small", embedder()).await;
        store.build(docs(&["alpha", "beta"])).await.unwrap();

        let hits = store.search("alpha", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn add_appends_without_discarding() {
        let dir = TempDir::new().unwrap();
        let mut store = VectorStore::open(dir.path(), "grow", embedder()).await;

        store.build(docs(&["refund window is thirty days"])).await.unwrap();
        store.add(docs(&["tracking updates arrive hourly"])).await.unwrap();
        assert_eq!(store.len(), 2);

        store.add(Vec::new()).await.unwrap();
        assert_eq!(store.len(), 2);

        let hits = store.search("tracking updates", 1).await.unwrap();
        assert_eq!(hits[0].text, "tracking updates arrive hourly");
    }

    #[tokio::test]
    async fn add_on_empty_store_behaves_like_build() {
        let dir = TempDir::new().unwrap();
        let mut store = VectorStore::open(dir.path(), "seed", embedder()).await;

        store.add(docs(&["first chunk"])).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.search("first chunk", 1).await.unwrap()[0].text,
            "first chunk"
        );
    }

    #[tokio::test]
    async fn reloaded_store_returns_identical_ranking() {
        let dir = TempDir::new().unwrap();
        let chunks = docs(&[
            "returns are accepted within thirty days",
            "tracking numbers update every evening",
            "damaged items qualify for a full refund",
        ]);

        let before = {
            let mut store = VectorStore::open(dir.path(), "persist", embedder()).await;
            store.build(chunks).await.unwrap();
            store.search("thirty day returns", 3).await.unwrap()
        };

        let reloaded = VectorStore::open(dir.path(), "persist", embedder()).await;
        assert_eq!(reloaded.len(), 3);
        let after = reloaded.search("thirty day returns", 3).await.unwrap();

        let texts_before: Vec<&str> = before.iter().map(|h| h.text.as_str()).collect();
        let texts_after: Vec<&str> = after.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts_before, texts_after);
    }

    #[tokio::test]
    async fn corrupted_index_file_resets_store_and_rebuild_recovers() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = VectorStore::open(dir.path(), "corrupt", embedder()).await;
            store.build(docs(&["original content"])).await.unwrap();
        }

        let index_path = dir.path().join("corrupt").join(INDEX_FILE);
        tokio::fs::write(&index_path, b"not an index").await.unwrap();

        let mut store = VectorStore::open(dir.path(), "corrupt", embedder()).await;
        assert!(store.is_empty());
        assert!(store.search("original content", 3).await.unwrap().is_empty());

        store.build(docs(&["fresh content"])).await.unwrap();
        let hits = store.search("fresh content", 1).await.unwrap();
        assert_eq!(hits[0].text, "fresh content");
    }

    #[tokio::test]
    async fn chunk_and_vector_count_mismatch_resets_store() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = VectorStore::open(dir.path(), "skew", embedder()).await;
            store.build(docs(&["a", "b", "c"])).await.unwrap();
        }

        // Drop a chunk from the text table while leaving the vectors intact.
        let chunks_path = dir.path().join("skew").join(CHUNKS_FILE);
        tokio::fs::write(&chunks_path, r#"["a","b"]"#).await.unwrap();

        let store = VectorStore::open(dir.path(), "skew", embedder()).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn missing_index_file_resets_store() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = VectorStore::open(dir.path(), "half", embedder()).await;
            store.build(docs(&["something"])).await.unwrap();
        }

        tokio::fs::remove_file(dir.path().join("half").join(INDEX_FILE))
            .await
            .unwrap();

        let store = VectorStore::open(dir.path(), "half", embedder()).await;
        assert!(store.is_empty());
    }
}
