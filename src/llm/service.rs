//! Provider resolution and the single-turn chat entry point.

use std::env;
use std::sync::Arc;

use serde_json::Value;

use super::openai::OpenAiCompatProvider;
use super::provider::LlmProvider;
use super::types::{ChatMessage, ChatRequest};
use crate::core::errors::ApiError;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f64 = 0.3;

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai";
const LOCAL_BASE_URL: &str = "http://127.0.0.1:8088";

#[derive(Clone)]
pub struct LlmService {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
}

impl std::fmt::Debug for LlmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmService")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl LlmService {
    /// Resolve the chat backend from the `llm` config section.
    ///
    /// Hosted providers require an API key (config `llm.api_key`, or the
    /// provider's conventional environment variable); a missing key is a
    /// configuration error, not a runtime one.
    pub fn from_config(config: &Value) -> Result<Self, ApiError> {
        let section = config.get("llm");

        let provider_name = section
            .and_then(|v| v.get("provider"))
            .and_then(|v| v.as_str())
            .unwrap_or("openai")
            .to_lowercase();

        let model = section
            .and_then(|v| v.get("model"))
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_MODEL)
            .to_string();

        let temperature = section
            .and_then(|v| v.get("temperature"))
            .and_then(|v| v.as_f64())
            .unwrap_or(DEFAULT_TEMPERATURE);

        let base_override = section
            .and_then(|v| v.get("base_url"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let config_key = section
            .and_then(|v| v.get("api_key"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty());

        let provider: Arc<dyn LlmProvider> = match provider_name.as_str() {
            "openai" => {
                let key = require_key(config_key, "OPENAI_API_KEY")?;
                Arc::new(OpenAiCompatProvider::new(
                    "openai",
                    base_override.unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
                    Some(key),
                ))
            }
            "groq" => {
                let key = require_key(config_key, "GROQ_API_KEY")?;
                Arc::new(OpenAiCompatProvider::new(
                    "groq",
                    base_override.unwrap_or_else(|| GROQ_BASE_URL.to_string()),
                    Some(key),
                ))
            }
            "local" | "lmstudio" => Arc::new(OpenAiCompatProvider::new(
                "local",
                base_override.unwrap_or_else(|| LOCAL_BASE_URL.to_string()),
                config_key,
            )),
            other => {
                return Err(ApiError::Configuration(format!(
                    "unknown LLM provider: {}",
                    other
                )))
            }
        };

        Ok(Self {
            provider,
            model,
            temperature,
        })
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Normalized single-turn chat: one system prompt, one user prompt.
    pub async fn chat(&self, system: &str, user: &str) -> Result<String, ApiError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(system),
            ChatMessage::user(user),
        ])
        .with_temperature(self.temperature);

        self.provider.chat(request, &self.model).await
    }

    pub async fn health_check(&self) -> bool {
        self.provider.health_check().await.unwrap_or(false)
    }
}

fn require_key(config_key: Option<String>, env_var: &str) -> Result<String, ApiError> {
    config_key
        .or_else(|| env::var(env_var).ok().filter(|s| !s.is_empty()))
        .ok_or_else(|| {
            ApiError::Configuration(format!(
                "llm.api_key is not set and {} is empty",
                env_var
            ))
        })
}
