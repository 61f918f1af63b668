//! Test doubles for the retrieval pipeline.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::core::errors::ApiError;
use crate::rag::embedder::{l2_normalize, EmbeddingProvider};

/// Deterministic bag-of-words embedder.
///
/// Tokens are hashed into a fixed number of buckets and counted, then the
/// vector is normalized. Texts sharing words score higher than unrelated
/// texts, which is enough to exercise ranking end to end without a model.
pub(crate) struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub(crate) fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    fn model(&self) -> &str {
        "mock-bag-of-words"
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(inputs
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; self.dimension];
                for token in text.to_lowercase().split_whitespace() {
                    let token = token.trim_matches(|c: char| !c.is_alphanumeric());
                    if token.is_empty() {
                        continue;
                    }
                    let mut hasher = DefaultHasher::new();
                    token.hash(&mut hasher);
                    vector[(hasher.finish() as usize) % self.dimension] += 1.0;
                }
                l2_normalize(&vector)
            })
            .collect())
    }
}
