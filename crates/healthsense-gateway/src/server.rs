//! Gateway HTTP server: Axum router over the agents and the dispatcher

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use healthsense_core::{
    AgentOrchestrator, AgentRoster, DiagnosticInfoAgent, DoctorInfoAgent, EmergencyServicesAgent,
    HospitalComparisonAgent, IntentCategory,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::frontend;
use crate::routes::{chat, doctors, emergency, hospitals, lab_tests, service};

/// Concrete agents, each optional; a missing one turns its routes into 503s
#[derive(Clone, Default)]
pub struct ServiceAgents {
    pub emergency: Option<Arc<EmergencyServicesAgent>>,
    pub doctor: Option<Arc<DoctorInfoAgent>>,
    pub diagnostic: Option<Arc<DiagnosticInfoAgent>>,
    pub hospital: Option<Arc<HospitalComparisonAgent>>,
}

impl ServiceAgents {
    /// The same agents, as the dispatcher sees them
    pub fn roster(&self) -> AgentRoster {
        let mut roster = AgentRoster::new();
        if let Some(agent) = &self.emergency {
            roster = roster.with_emergency(agent.clone());
        }
        if let Some(agent) = &self.doctor {
            roster = roster.with_doctor(agent.clone());
        }
        if let Some(agent) = &self.diagnostic {
            roster = roster.with_diagnostic(agent.clone());
        }
        if let Some(agent) = &self.hospital {
            roster = roster.with_hospital(agent.clone());
        }
        roster
    }
}

/// Shared state for all handlers
#[derive(Clone)]
pub struct GatewayState {
    pub orchestrator: Arc<AgentOrchestrator>,
    pub agents: ServiceAgents,
    pub model: String,
    pub api_key_set: bool,
    pub static_dir: Option<PathBuf>,
}

impl GatewayState {
    pub fn new(agents: ServiceAgents, model: impl Into<String>, api_key_set: bool) -> Self {
        Self {
            orchestrator: Arc::new(AgentOrchestrator::new(agents.roster())),
            agents,
            model: model.into(),
            api_key_set,
            static_dir: None,
        }
    }

    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    pub fn frontend_available(&self) -> bool {
        self.static_dir.as_ref().is_some_and(|dir| dir.is_dir())
    }

    pub fn agent_ready(&self, category: IntentCategory) -> bool {
        self.orchestrator.agents().is_ready(category)
    }
}

/// The gateway server
pub struct GatewayServer {
    state: GatewayState,
    bind: SocketAddr,
}

impl GatewayServer {
    pub fn new(bind: SocketAddr, state: GatewayState) -> Self {
        Self { state, bind }
    }

    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        let api = Router::new()
            .route("/emergency", get(emergency::list_handler))
            .route("/emergency/ambulance", get(emergency::ambulance_handler))
            .route("/emergency/nearest", get(emergency::nearest_handler))
            .route("/hospitals", get(hospitals::list_handler))
            .route("/hospitals/compare", get(hospitals::compare_handler))
            .route("/hospitals/specialties", get(hospitals::specialty_handler))
            .route("/doctors", get(doctors::list_handler))
            .route("/doctors/specialties", get(doctors::specialties_handler))
            .route("/doctors/{doctor_id}/slots", get(doctors::slots_handler))
            .route("/appointments", post(doctors::appointment_handler))
            .route("/tests", get(lab_tests::list_handler))
            .route("/tests/packages", get(lab_tests::packages_handler))
            .route("/tests/categories", get(lab_tests::categories_handler))
            .route("/tests/condition/{condition}", get(lab_tests::condition_handler))
            .route("/tests/{test_name}", get(lab_tests::details_handler))
            .route("/book-test", post(lab_tests::book_handler));

        let router = Router::new()
            .route("/chat", post(chat::chat_handler))
            .route("/chat/history", get(chat::history_handler))
            .route("/chat/history/{session_id}", delete(chat::clear_history_handler))
            .route("/health", get(service::health_handler))
            .route("/compare-hospitals", post(service::compare_hospitals_handler))
            .route("/query", post(service::query_handler))
            .nest("/api", api);

        frontend::mount(router, self.state.static_dir.as_deref())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Serve until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.bind).await?;
        info!("Gateway listening on {}", self.bind);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;

        info!("Gateway stopped");
        Ok(())
    }

    /// Start the server in the background, returning a handle
    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.run(cancel).await })
    }
}
