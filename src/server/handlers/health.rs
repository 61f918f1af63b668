use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::rag::index::accelerated_available;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let llm_reachable = state.llm.health_check().await;

    Json(json!({
        "status": "ok",
        "llm_provider": state.llm.provider_name(),
        "llm_model": state.llm.model(),
        "llm_reachable": llm_reachable,
        "accelerated_index": accelerated_available(),
    }))
}
