//! Routes a classified message to the matching backing agent
//!
//! The orchestrator never fails: agent failures become apology text, and
//! errors or panics raised by an agent become an "Error Handler" outcome.

use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::agents::HealthAgent;
use crate::classifier::QueryClassifier;
use crate::types::{
    AgentResult, ChatMessage, DispatchOutcome, ERROR_HANDLER_LABEL, GENERAL_ASSISTANT_LABEL,
    IntentCategory,
};

/// Canned reply when no specialized agent can answer
pub const CAPABILITIES_RESPONSE: &str = "I'm your AI health assistant. I can help you with:

🏥 Finding and comparing hospitals
👨‍⚕️ Searching for doctors and booking appointments
🔬 Browsing lab tests and health screening packages
🚨 Locating emergency services
💊 Answering general health-related questions

What would you like to know more about?";

/// Shown when an agent succeeds without producing text
pub const NO_RESPONSE_TEXT: &str = "I'm sorry, I couldn't generate a proper response.";

/// The agents available to the dispatcher. An empty slot means the agent
/// failed to start.
#[derive(Clone, Default)]
pub struct AgentRoster {
    emergency: Option<Arc<dyn HealthAgent>>,
    doctor: Option<Arc<dyn HealthAgent>>,
    diagnostic: Option<Arc<dyn HealthAgent>>,
    hospital: Option<Arc<dyn HealthAgent>>,
}

impl AgentRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_emergency(mut self, agent: Arc<dyn HealthAgent>) -> Self {
        self.emergency = Some(agent);
        self
    }

    pub fn with_doctor(mut self, agent: Arc<dyn HealthAgent>) -> Self {
        self.doctor = Some(agent);
        self
    }

    pub fn with_diagnostic(mut self, agent: Arc<dyn HealthAgent>) -> Self {
        self.diagnostic = Some(agent);
        self
    }

    pub fn with_hospital(mut self, agent: Arc<dyn HealthAgent>) -> Self {
        self.hospital = Some(agent);
        self
    }

    /// The agent serving `category`; `General` never has one
    pub fn get(&self, category: IntentCategory) -> Option<&Arc<dyn HealthAgent>> {
        match category {
            IntentCategory::Emergency => self.emergency.as_ref(),
            IntentCategory::Doctor => self.doctor.as_ref(),
            IntentCategory::Diagnostic => self.diagnostic.as_ref(),
            IntentCategory::Hospital => self.hospital.as_ref(),
            IntentCategory::General => None,
        }
    }

    /// Present and reporting itself available
    pub fn is_ready(&self, category: IntentCategory) -> bool {
        self.get(category).is_some_and(|a| a.is_available())
    }
}

impl std::fmt::Debug for AgentRoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRoster")
            .field("emergency", &self.emergency.is_some())
            .field("doctor", &self.doctor.is_some())
            .field("diagnostic", &self.diagnostic.is_some())
            .field("hospital", &self.hospital.is_some())
            .finish()
    }
}

/// Classifier plus roster
#[derive(Debug, Clone)]
pub struct AgentOrchestrator {
    classifier: QueryClassifier,
    agents: AgentRoster,
}

impl AgentOrchestrator {
    pub fn new(agents: AgentRoster) -> Self {
        Self {
            classifier: QueryClassifier::default(),
            agents,
        }
    }

    pub fn with_classifier(mut self, classifier: QueryClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn agents(&self) -> &AgentRoster {
        &self.agents
    }

    pub fn classify(&self, message: &str) -> IntentCategory {
        self.classifier.classify(message)
    }

    /// Answer one message. `history` is accepted for API compatibility but
    /// does not influence routing.
    pub async fn process_query(&self, message: &str, history: &[ChatMessage]) -> DispatchOutcome {
        let category = self.classify(message);
        debug!(
            "Dispatching {} message ({} history entries)",
            category,
            history.len()
        );

        let agent = match self.agents.get(category) {
            Some(agent) if agent.is_available() => agent,
            Some(_) => {
                warn!("{} agent is unavailable, using general reply", category);
                return general_outcome();
            }
            None => {
                if category != IntentCategory::General {
                    warn!("{} agent is not configured, using general reply", category);
                }
                return general_outcome();
            }
        };

        let label = category.agent_label();
        info!("Routing query to {}", label);

        match AssertUnwindSafe(agent.query(message)).catch_unwind().await {
            Ok(Ok(result)) => DispatchOutcome {
                response: render_result(&result),
                agent_used: label.to_string(),
                success: true,
            },
            Ok(Err(e)) => {
                error!("{} raised an error: {}", label, e);
                error_outcome(&e.to_string())
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!("{} panicked: {}", label, reason);
                error_outcome(&reason)
            }
        }
    }
}

fn general_outcome() -> DispatchOutcome {
    DispatchOutcome {
        response: CAPABILITIES_RESPONSE.to_string(),
        agent_used: GENERAL_ASSISTANT_LABEL.to_string(),
        success: true,
    }
}

fn error_outcome(reason: &str) -> DispatchOutcome {
    DispatchOutcome {
        response: format!(
            "I apologize, but I encountered an error processing your request: {}",
            reason
        ),
        agent_used: ERROR_HANDLER_LABEL.to_string(),
        success: false,
    }
}

fn render_result(result: &AgentResult) -> String {
    if result.success {
        result.text_or(NO_RESPONSE_TEXT).to_string()
    } else {
        format!("I encountered an error: {}", result.text_or("Unknown error"))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "agent panicked".to_string()
    }
}
