//! `/chat`: classify, dispatch and wrap the answer

use axum::Json;
use axum::extract::State;
use chrono::Local;
use healthsense_core::{ChatMessage, validate_message};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::server::GatewayState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub timestamp: String,
    pub agent_used: String,
}

pub async fn chat_handler(
    State(state): State<GatewayState>,
    ApiJson(request): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message =
        validate_message(&request.message).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let outcome = state
        .orchestrator
        .process_query(message, &request.history)
        .await;
    debug!(
        "Chat answered by {} (success: {})",
        outcome.agent_used, outcome.success
    );

    Ok(Json(ChatResponse {
        response: outcome.response,
        timestamp: Local::now().to_rfc3339(),
        agent_used: outcome.agent_used,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub session_id: Option<String>,
}

/// History is never stored server-side
pub async fn history_handler(ApiQuery(query): ApiQuery<HistoryQuery>) -> Json<Value> {
    debug!("History requested for session {:?}", query.session_id);
    Json(json!({
        "success": true,
        "history": [],
        "message": "Chat history feature coming soon",
    }))
}

pub async fn clear_history_handler(ApiPath(session_id): ApiPath<String>) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": format!("Chat history cleared for session {}", session_id),
    }))
}
