//! healthsense-gateway: JSON HTTP API in front of the HealthSense agents
//!
//! Exposes the chat dispatcher, one route family per backing agent, service
//! health and the static frontend.

pub mod error;
pub mod extract;
pub mod frontend;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use server::{GatewayServer, GatewayState, ServiceAgents};

#[cfg(test)]
pub(crate) mod testing {
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    use healthsense_core::providers::{
        LlmContent, LlmMessage, LlmProvider, LlmResponse, LlmResponseBlock, LlmUsage, StopReason,
    };
    use healthsense_core::tools::ToolDefinition;
    use healthsense_core::{
        DataFrame, DiagnosticInfoAgent, DoctorInfoAgent, EmergencyServicesAgent,
        HospitalComparisonAgent, SqlDatabase,
    };

    use crate::server::{GatewayState, ServiceAgents};

    /// Answers every prompt with `echo: {prompt}`, or fails when `down`
    pub struct EchoProvider {
        down: bool,
    }

    impl EchoProvider {
        pub fn up() -> Arc<Self> {
            Arc::new(Self { down: false })
        }

        pub fn down() -> Arc<Self> {
            Arc::new(Self { down: true })
        }
    }

    #[async_trait]
    impl LlmProvider for EchoProvider {
        fn provider_name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-model"
        }

        async fn chat(
            &self,
            messages: &[LlmMessage],
            _tools: &[ToolDefinition],
            _system: &str,
        ) -> Result<LlmResponse> {
            if self.down {
                bail!("upstream down");
            }
            let prompt = match messages.first().map(|m| &m.content) {
                Some(LlmContent::Text(text)) => text.clone(),
                _ => String::new(),
            };
            Ok(LlmResponse {
                blocks: vec![LlmResponseBlock::Text {
                    text: format!("echo: {}", prompt),
                }],
                stop_reason: StopReason::EndTurn,
                usage: LlmUsage::default(),
            })
        }
    }

    fn frame() -> DataFrame {
        DataFrame::new(
            vec!["Name".to_string(), "City".to_string()],
            vec![vec!["City Care".to_string(), "Springfield".to_string()]],
        )
        .unwrap()
    }

    /// All four agents over empty in-memory data
    pub fn all_agents(provider: Arc<dyn LlmProvider>) -> ServiceAgents {
        let db = Arc::new(SqlDatabase::open_in_memory().unwrap());
        ServiceAgents {
            emergency: Some(Arc::new(EmergencyServicesAgent::from_database(
                provider.clone(),
                db.clone(),
            ))),
            doctor: Some(Arc::new(DoctorInfoAgent::from_database(
                provider.clone(),
                db,
            ))),
            diagnostic: Some(Arc::new(DiagnosticInfoAgent::from_frame(
                provider.clone(),
                frame(),
            ))),
            hospital: Some(Arc::new(HospitalComparisonAgent::from_frame(
                provider,
                frame(),
            ))),
        }
    }

    pub fn state_with(services: ServiceAgents) -> GatewayState {
        GatewayState::new(services, "gpt-4o-mini", true)
    }

    pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    pub fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }
}
