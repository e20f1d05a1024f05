//! Backing agents: each owns one dataset and answers through an LLM tool loop

use anyhow::Result;
use async_trait::async_trait;

use crate::types::AgentResult;

pub mod diagnostic;
pub mod doctor;
pub mod emergency;
pub mod hospital;
pub mod runtime;

pub use diagnostic::{DatasetInfo, DiagnosticInfoAgent};
pub use doctor::DoctorInfoAgent;
pub use emergency::EmergencyServicesAgent;
pub use hospital::HospitalComparisonAgent;
pub use runtime::{AgentRuntimeConfig, ToolAgent};

/// What the dispatcher needs from an agent.
///
/// `query` reports ordinary failures through `AgentResult::failure`; an
/// `Err` means the agent itself broke and is reported as a dispatch error.
#[async_trait]
pub trait HealthAgent: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }

    async fn query(&self, input: &str) -> Result<AgentResult>;
}

/// Guidance shared by the SQL-backed agents
pub(crate) const SQL_AGENT_PREAMBLE: &str = "\
You are an agent designed to interact with a SQLite database.
Given an input question, create a syntactically correct SQLite query to run, then look at \
the results of the query and return the answer.
Unless the user asks for a specific number of results, limit your query to at most 10 rows.
Never query for all the columns of a table, only ask for the relevant columns.
Always start by listing the tables with sql_db_list_tables, then look at the schema of the \
relevant tables with sql_db_schema before writing a query.
If a query fails, rewrite it and try again.";
