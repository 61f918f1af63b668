use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::prompt::{build_system_prompt, build_user_prompt, ResponseMode};
use crate::rag::RetrievalConfig;
use crate::search;
use crate::state::AppState;

const WEB_RESULT_LIMIT: usize = 5;
const DEFAULT_USE_CASE: &str = "Universal Shipment Tracking & Warranty Support";

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub top_k: Option<i64>,
    #[serde(default)]
    pub mode: Option<ResponseMode>,
    #[serde(default)]
    pub use_case: Option<String>,
    /// Force web search on or off; unset falls back to the heuristic.
    #[serde(default)]
    pub web_search: Option<bool>,
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let question = payload.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".to_string()));
    }

    let config = state.config.load_config()?;
    let retrieval_config = RetrievalConfig::from_config(&config);

    let top_k = payload
        .top_k
        .unwrap_or(retrieval_config.top_k as i64)
        .max(0) as usize;
    let key = payload.key.unwrap_or_default();

    let rag_chunks = state.retrieval.retrieve(&key, question, top_k).await?;

    let wants_web = payload
        .web_search
        .unwrap_or_else(|| should_search(question, &rag_chunks));
    let web_results = if wants_web {
        match search::web_search(&config, question, WEB_RESULT_LIMIT).await {
            Ok(results) => results,
            Err(err) => {
                // Non-fatal: answer from retrieved context alone.
                tracing::warn!("Web search unavailable: {}", err);
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let use_case = payload
        .use_case
        .or_else(|| {
            config
                .get("assistant")
                .and_then(|v| v.get("use_case"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| DEFAULT_USE_CASE.to_string());
    let mode = payload.mode.unwrap_or_default();

    let system = build_system_prompt(&use_case);
    let user = build_user_prompt(question, &rag_chunks, &web_results, mode);

    let answer = state.llm.chat(&system, &user).await?;

    Ok(Json(json!({
        "answer": answer,
        "rag_chunks": rag_chunks,
        "web_results": web_results,
    })))
}

/// Search the web when the question smells time-sensitive or shipment
/// related, or when retrieval came back empty.
fn should_search(question: &str, rag_chunks: &[String]) -> bool {
    let lowered = question.to_lowercase();
    lowered.contains("latest") || lowered.contains("track") || rag_chunks.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_triggers_on_keywords_or_empty_retrieval() {
        let chunks = vec!["some context".to_string()];

        assert!(should_search("what are the LATEST delays", &chunks));
        assert!(should_search("track my parcel", &chunks));
        assert!(should_search("anything at all", &[]));
        assert!(!should_search("what is the return policy", &chunks));
    }
}
