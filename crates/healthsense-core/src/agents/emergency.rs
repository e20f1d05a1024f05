//! Emergency facilities and ambulance availability, answered over SQL

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::runtime::{AgentRuntimeConfig, ToolAgent};
use super::{HealthAgent, SQL_AGENT_PREAMBLE};
use crate::providers::LlmProvider;
use crate::store::SqlDatabase;
use crate::tools::{ToolRegistry, sql_tools};
use crate::types::{AgentResult, IntentCategory};

pub const EMERGENCY_TABLE: &str = "emergency_directory";

const EMERGENCY_TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS emergency_directory (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    zip_code TEXT NOT NULL,
    hospital_name TEXT NOT NULL,
    ambulance_available TEXT NOT NULL
)";

const EMERGENCY_GUIDANCE: &str = "
Use the LIKE operator when matching zip codes or hospital names.
Focus on finding the nearest emergency services based on zip code.
Prioritize hospitals with ambulance availability.";

pub struct EmergencyServicesAgent {
    runtime: ToolAgent,
    db: Arc<SqlDatabase>,
}

impl EmergencyServicesAgent {
    /// Create the directory table and load it from `csv_path` when present
    pub fn new(provider: Arc<dyn LlmProvider>, db: Arc<SqlDatabase>, csv_path: &Path) -> Result<Self> {
        let loaded = db.load_table(EMERGENCY_TABLE_DDL, csv_path, EMERGENCY_TABLE)?;
        info!("Emergency directory ready ({} records loaded)", loaded);
        Ok(Self::from_database(provider, db))
    }

    /// Use a database that already holds the directory table
    pub fn from_database(provider: Arc<dyn LlmProvider>, db: Arc<SqlDatabase>) -> Self {
        let mut tools = ToolRegistry::new();
        tools.register_all(sql_tools(db.clone()));

        let runtime = ToolAgent::new(
            IntentCategory::Emergency.agent_label(),
            provider,
            tools,
            format!("{}\n{}", SQL_AGENT_PREAMBLE, EMERGENCY_GUIDANCE),
        );
        Self { runtime, db }
    }

    pub fn with_config(mut self, config: AgentRuntimeConfig) -> Self {
        self.runtime = self.runtime.with_config(config);
        self
    }

    pub fn database(&self) -> &Arc<SqlDatabase> {
        &self.db
    }

    pub async fn ask(&self, input: &str) -> AgentResult {
        self.runtime.query(input).await
    }

    pub async fn find_emergency_services(&self, zip_code: &str) -> AgentResult {
        self.ask(&format!("Find all emergency services in zip code {}", zip_code))
            .await
    }

    pub async fn find_ambulance_services(&self, zip_code: Option<&str>) -> AgentResult {
        let prompt = match zip_code.filter(|z| !z.trim().is_empty()) {
            Some(zip) => format!(
                "Show me all hospitals with ambulance services in zip code {}",
                zip
            ),
            None => "Show me all hospitals with ambulance services".to_string(),
        };
        self.ask(&prompt).await
    }

    pub async fn get_nearest_emergency(&self, zip_code: &str) -> AgentResult {
        self.ask(&format!(
            "What is the nearest emergency facility to zip code {}?",
            zip_code
        ))
        .await
    }

    pub async fn check_ambulance_availability(&self, hospital_name: &str) -> AgentResult {
        self.ask(&format!(
            "Does {} have ambulance service available?",
            hospital_name
        ))
        .await
    }
}

#[async_trait]
impl HealthAgent for EmergencyServicesAgent {
    fn name(&self) -> &str {
        self.runtime.name()
    }

    async fn query(&self, input: &str) -> Result<AgentResult> {
        Ok(self.ask(input).await)
    }
}
