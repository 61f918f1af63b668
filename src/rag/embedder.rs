//! Embedding provider abstraction.
//!
//! The production implementation calls an OpenAI-compatible `/v1/embeddings`
//! endpoint (llama-server, LM Studio, or a hosted API). Returned vectors are
//! normalized to unit length so that inner product equals cosine similarity,
//! and the model dimension is pinned on first use for the process lifetime.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::errors::ApiError;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the embedding model behind this provider.
    fn model(&self) -> &str;

    /// Embed each input string into a unit-length vector, same order as the
    /// inputs.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;
}

/// Scale a vector to unit length. Zero vectors are returned unchanged.
pub fn l2_normalize(vector: &[f32]) -> Vec<f32> {
    let magnitude: f32 = vector.iter().map(|&x| x * x).sum::<f32>().sqrt();

    if magnitude == 0.0 || !magnitude.is_finite() {
        return vector.to_vec();
    }

    vector.iter().map(|&x| x / magnitude).collect()
}

static SHARED_EMBEDDER: OnceLock<Arc<HttpEmbedder>> = OnceLock::new();

#[derive(Debug)]
pub struct HttpEmbedder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: Client,
    dimension: OnceLock<usize>,
}

impl HttpEmbedder {
    const DEFAULT_BASE_URL: &'static str = "http://127.0.0.1:8090";

    /// Build an embedder from the `embedding` config section.
    ///
    /// Fails with a configuration error (not a transport error) when the
    /// model is unset, so ingestion aborts before any chunk is processed.
    pub fn from_config(config: &Value) -> Result<Self, ApiError> {
        let section = config.get("embedding");

        let model = section
            .and_then(|v| v.get("model"))
            .and_then(|v| v.as_str())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ApiError::Configuration(
                    "embedding.model is not set; configure an embedding model before ingesting"
                        .to_string(),
                )
            })?;

        let base_url = section
            .and_then(|v| v.get("base_url"))
            .and_then(|v| v.as_str())
            .unwrap_or(Self::DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        let api_key = section
            .and_then(|v| v.get("api_key"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            base_url,
            model: model.to_string(),
            api_key,
            client: Client::new(),
            dimension: OnceLock::new(),
        })
    }

    /// Process-wide cached instance.
    ///
    /// The first caller pays construction and configuration validation; later
    /// callers reuse the same embedder. Initialization is guarded, so
    /// concurrent first calls cannot double-initialize.
    pub fn shared(config: &Value) -> Result<Arc<Self>, ApiError> {
        if let Some(existing) = SHARED_EMBEDDER.get() {
            return Ok(existing.clone());
        }

        let built = Arc::new(Self::from_config(config)?);
        Ok(SHARED_EMBEDDER.get_or_init(|| built).clone())
    }

    /// Vector dimension, once known from the first successful embed call.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": inputs,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await.map_err(ApiError::internal)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!(
                "embedding request failed ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;

        let mut embeddings = Vec::with_capacity(inputs.len());
        if let Some(data) = payload["data"].as_array() {
            for item in data {
                if let Some(vals) = item["embedding"].as_array() {
                    let vector: Vec<f32> = vals
                        .iter()
                        .filter_map(|v| v.as_f64().map(|f| f as f32))
                        .collect();
                    embeddings.push(l2_normalize(&vector));
                }
            }
        }

        if embeddings.len() != inputs.len() {
            return Err(ApiError::Internal(format!(
                "embedding backend returned {} vectors for {} inputs",
                embeddings.len(),
                inputs.len()
            )));
        }

        let expected = *self.dimension.get_or_init(|| embeddings[0].len());
        if let Some(bad) = embeddings.iter().find(|v| v.len() != expected) {
            return Err(ApiError::Internal(format!(
                "embedding dimension changed: expected {}, got {}",
                expected,
                bad.len()
            )));
        }

        Ok(embeddings)
    }
}
