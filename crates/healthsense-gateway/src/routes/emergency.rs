//! `/api/emergency*`: emergency rooms and ambulance services by ZIP code

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{agent_payload, present};
use crate::error::{ApiError, require};
use crate::extract::ApiQuery;
use crate::server::GatewayState;

const SERVICE: &str = "Emergency";

#[derive(Debug, Deserialize)]
pub struct ZipQuery {
    pub zipcode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmergencyResponse {
    pub success: bool,
    pub hospitals: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn required_zip(query: &ZipQuery) -> Result<&str, ApiError> {
    present(&query.zipcode).ok_or_else(|| ApiError::bad_request("ZIP code is required"))
}

pub async fn list_handler(
    State(state): State<GatewayState>,
    ApiQuery(query): ApiQuery<ZipQuery>,
) -> Result<Json<EmergencyResponse>, ApiError> {
    let agent = require(&state.agents.emergency, SERVICE)?;
    let zip = required_zip(&query)?;

    let result = agent.find_emergency_services(zip).await;
    let response = if result.success {
        EmergencyResponse {
            success: true,
            hospitals: Vec::new(),
            message: Some(result.text_or("").to_string()),
            error: None,
        }
    } else {
        EmergencyResponse {
            success: false,
            hospitals: Vec::new(),
            message: None,
            error: Some(result.text_or("Failed to fetch emergency services").to_string()),
        }
    };
    Ok(Json(response))
}

pub async fn ambulance_handler(
    State(state): State<GatewayState>,
    ApiQuery(query): ApiQuery<ZipQuery>,
) -> Result<Json<Value>, ApiError> {
    let agent = require(&state.agents.emergency, SERVICE)?;
    let result = agent.find_ambulance_services(present(&query.zipcode)).await;
    Ok(Json(Value::Object(agent_payload(
        &result,
        "message",
        "No ambulance services found",
        "Failed to fetch ambulance services",
    ))))
}

pub async fn nearest_handler(
    State(state): State<GatewayState>,
    ApiQuery(query): ApiQuery<ZipQuery>,
) -> Result<Json<Value>, ApiError> {
    let agent = require(&state.agents.emergency, SERVICE)?;
    let zip = required_zip(&query)?;

    let result = agent.get_nearest_emergency(zip).await;
    Ok(Json(Value::Object(agent_payload(
        &result,
        "facility",
        "No emergency facility found",
        "Failed to find nearest emergency facility",
    ))))
}

#[cfg(test)]
mod tests {
    use crate::server::{GatewayServer, ServiceAgents};
    use crate::testing::{EchoProvider, all_agents, get, send, state_with};
    use axum::Router;
    use axum::http::StatusCode;
    use serde_json::json;

    fn router(agents: ServiceAgents) -> Router {
        GatewayServer::new("127.0.0.1:0".parse().unwrap(), state_with(agents)).router()
    }

    #[tokio::test]
    async fn test_list_by_zip() {
        let (status, body) = send(
            router(all_agents(EchoProvider::up())),
            get("/api/emergency?zipcode=10001"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "success": true,
                "hospitals": [],
                "message": "echo: Find all emergency services in zip code 10001"
            })
        );
    }

    #[tokio::test]
    async fn test_list_failure() {
        let (status, body) = send(
            router(all_agents(EchoProvider::down())),
            get("/api/emergency?zipcode=10001"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "upstream down");
        assert!(body.get("message").is_none());
    }

    #[tokio::test]
    async fn test_zip_required() {
        for uri in ["/api/emergency", "/api/emergency?zipcode=%20", "/api/emergency/nearest"] {
            let (status, body) = send(router(all_agents(EchoProvider::up())), get(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["detail"], "ZIP code is required");
        }
    }

    #[tokio::test]
    async fn test_unavailable_checked_first() {
        let (status, body) = send(router(ServiceAgents::default()), get("/api/emergency")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["detail"], "Emergency service is currently unavailable");
    }

    #[tokio::test]
    async fn test_ambulance_optional_zip() {
        let (_, body) = send(
            router(all_agents(EchoProvider::up())),
            get("/api/emergency/ambulance"),
        )
        .await;
        assert_eq!(body["message"], "echo: Show me all hospitals with ambulance services");

        let (_, body) = send(
            router(all_agents(EchoProvider::up())),
            get("/api/emergency/ambulance?zipcode=60601"),
        )
        .await;
        assert_eq!(
            body["message"],
            "echo: Show me all hospitals with ambulance services in zip code 60601"
        );
    }

    #[tokio::test]
    async fn test_nearest() {
        let (status, body) = send(
            router(all_agents(EchoProvider::up())),
            get("/api/emergency/nearest?zipcode=94105"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["facility"],
            "echo: What is the nearest emergency facility to zip code 94105?"
        );
    }
}
