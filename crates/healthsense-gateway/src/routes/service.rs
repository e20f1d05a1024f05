//! Service health and the legacy single-agent endpoints

use axum::Json;
use axum::extract::State;
use healthsense_core::IntentCategory;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::server::GatewayState;

pub async fn health_handler(State(state): State<GatewayState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "model": state.model,
        "api_key_set": state.api_key_set,
        "frontend_available": state.frontend_available(),
        "agents": {
            "emergency": state.agent_ready(IntentCategory::Emergency),
            "hospital": state.agent_ready(IntentCategory::Hospital),
            "doctor": state.agent_ready(IntentCategory::Doctor),
            "diagnostic": state.agent_ready(IntentCategory::Diagnostic),
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub response: String,
    pub agent: &'static str,
}

async fn ask_hospital_agent(
    state: &GatewayState,
    request: &QueryRequest,
    unavailable: &str,
) -> Result<Json<QueryResponse>, ApiError> {
    let agent = state
        .agents
        .hospital
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable(unavailable.to_string()))?;
    if request.query.trim().is_empty() {
        return Err(ApiError::bad_request("Query cannot be empty"));
    }

    let result = agent.compare_hospitals(&request.query).await;
    if !result.success {
        return Err(ApiError::Internal(result.text_or("Unknown error").to_string()));
    }
    Ok(Json(QueryResponse {
        response: result.text_or("").to_string(),
        agent: "hospital_comparison",
    }))
}

/// Superseded by `/api/hospitals`
pub async fn compare_hospitals_handler(
    State(state): State<GatewayState>,
    ApiJson(request): ApiJson<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    ask_hospital_agent(&state, &request, "Hospital service unavailable").await
}

/// Superseded by `/chat`
pub async fn query_handler(
    State(state): State<GatewayState>,
    ApiJson(request): ApiJson<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    ask_hospital_agent(&state, &request, "Service unavailable").await
}
