//! Doctors, appointment slots and booking, answered over SQL with write access

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

pub const DOCTORS_TABLE: &str = "doctors";
pub const SLOTS_TABLE: &str = "slots";

const DOCTORS_TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS doctors (
    id INTEGER,
    name TEXT NOT NULL,
    specialization TEXT NOT NULL,
    contact TEXT NOT NULL
)";

const SLOTS_TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS slots (
    id INTEGER,
    doctor_id INTEGER NOT NULL,
    datetime TEXT NOT NULL,
    is_available BOOLEAN NOT NULL
)";

const DOCTOR_GUIDANCE: &str = "
Use the LIKE operator with lowercase when matching a name.
When a user requests to book slots, delete the corresponding row from the slots table.";

pub struct DoctorInfoAgent {
    runtime: ToolAgent,
    db: Arc<SqlDatabase>,
}

impl DoctorInfoAgent {
    /// Create both tables and load each from its CSV when present
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        db: Arc<SqlDatabase>,
        doctors_csv: &Path,
        slots_csv: &Path,
    ) -> Result<Self> {
        let doctors = db.load_table(DOCTORS_TABLE_DDL, doctors_csv, DOCTORS_TABLE)?;
        let slots = db.load_table(SLOTS_TABLE_DDL, slots_csv, SLOTS_TABLE)?;
        info!(
            "Appointment database ready ({} doctors, {} slots loaded)",
            doctors, slots
        );
        Ok(Self::from_database(provider, db))
    }

    pub fn from_database(provider: Arc<dyn LlmProvider>, db: Arc<SqlDatabase>) -> Self {
        let mut tools = ToolRegistry::new();
        tools.register_all(sql_tools(db.clone()));

        let runtime = ToolAgent::new(
            IntentCategory::Doctor.agent_label(),
            provider,
            tools,
            format!("{}\n{}", SQL_AGENT_PREAMBLE, DOCTOR_GUIDANCE),
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

    pub async fn get_available_doctors(&self, specialization: Option<&str>) -> AgentResult {
        let prompt = match specialization.filter(|s| !s.trim().is_empty()) {
            Some(s) => format!("Show me all doctors specialized in {}", s),
            None => "Show me all available doctors".to_string(),
        };
        self.ask(&prompt).await
    }

    pub async fn get_available_slots(&self, doctor_name: Option<&str>) -> AgentResult {
        let prompt = match doctor_name.filter(|d| !d.trim().is_empty()) {
            Some(d) => format!("Show me available appointment slots for Dr. {}", d),
            None => "Show me all available appointment slots".to_string(),
        };
        self.ask(&prompt).await
    }

    /// Books by having the model delete the matching slot row
    pub async fn book_appointment(&self, doctor_name: &str, slot_time: &str) -> AgentResult {
        self.ask(&format!("Book {} slot for Dr. {}", slot_time, doctor_name))
            .await
    }

    pub async fn get_doctor_info(&self, doctor_name: &str) -> AgentResult {
        self.ask(&format!("Tell me about Dr. {}", doctor_name)).await
    }
}

#[async_trait]
impl HealthAgent for DoctorInfoAgent {
    fn name(&self) -> &str {
        self.runtime.name()
    }

    async fn query(&self, input: &str) -> Result<AgentResult> {
        Ok(self.ask(input).await)
    }
}
