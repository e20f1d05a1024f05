//! HealthSense core: intent classification, agent dispatch and the LLM-backed
//! agents that answer hospital, doctor, lab-test and emergency questions.

pub mod agents;
pub mod classifier;
pub mod dispatcher;
pub mod providers;
pub mod store;
pub mod tools;
pub mod types;

pub use agents::{
    AgentRuntimeConfig, DatasetInfo, DiagnosticInfoAgent, DoctorInfoAgent,
    EmergencyServicesAgent, HealthAgent, HospitalComparisonAgent, ToolAgent,
};
pub use classifier::{ClassificationRule, QueryClassifier, classify_query};
pub use dispatcher::{AgentOrchestrator, AgentRoster, CAPABILITIES_RESPONSE};
pub use providers::{LlmProvider, ModelRouter, OpenAiProvider};
pub use store::{DataFrame, SqlDatabase};
pub use types::{
    AgentResult, ChatMessage, ChatRole, DispatchOutcome, IntentCategory, ValidationError,
    validate_message,
};
