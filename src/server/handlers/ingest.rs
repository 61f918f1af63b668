use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    /// Already-decoded document texts; file parsing happens client-side.
    pub documents: Vec<String>,
}

pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IngestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.documents.is_empty() {
        return Err(ApiError::BadRequest(
            "documents must not be empty".to_string(),
        ));
    }

    let key = state.ingestion.ingest(&payload.documents).await?;
    Ok(Json(json!({ "key": key })))
}
