//! Shared types for healthsense-core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who authored a message in the conversation history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One element of the caller-supplied conversation history.
/// Never persisted server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Coarse classification of a user message, used to pick the answering agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentCategory {
    Emergency,
    Doctor,
    Diagnostic,
    Hospital,
    General,
}

impl IntentCategory {
    /// Every category, in routing priority order
    pub const ALL: [IntentCategory; 5] = [
        Self::Emergency,
        Self::Doctor,
        Self::Diagnostic,
        Self::Hospital,
        Self::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Doctor => "doctor",
            Self::Diagnostic => "diagnostic",
            Self::Hospital => "hospital",
            Self::General => "general",
        }
    }

    /// Label reported as `agent_used` when this category's agent answers
    pub fn agent_label(&self) -> &'static str {
        match self {
            Self::Emergency => "Emergency Services Agent",
            Self::Doctor => "Doctor Information Agent",
            Self::Diagnostic => "Diagnostic Information Agent",
            Self::Hospital => "Hospital Comparison Agent",
            Self::General => GENERAL_ASSISTANT_LABEL,
        }
    }
}

impl std::fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `agent_used` label when no specialized agent answered
pub const GENERAL_ASSISTANT_LABEL: &str = "General Assistant";

/// `agent_used` label when dispatch itself failed
pub const ERROR_HANDLER_LABEL: &str = "Error Handler";

/// Uniform result of every backing-agent call.
///
/// `output` is meaningful when `success` is true, `error` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResult {
    pub success: bool,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }

    /// The output on success, the error on failure, or `fallback` when the
    /// meaningful field is missing
    pub fn text_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        let text = if self.success {
            self.output.as_deref()
        } else {
            self.error.as_deref()
        };
        text.unwrap_or(fallback)
    }
}

/// What the dispatcher hands back to the HTTP layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub response: String,
    pub agent_used: String,
    pub success: bool,
}

/// Input rejected before it reaches the classifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Message cannot be empty")]
    EmptyMessage,
}

/// Reject empty or whitespace-only messages.
///
/// Returns the message untouched (not trimmed) so routing sees exactly what
/// the caller sent.
pub fn validate_message(message: &str) -> Result<&str, ValidationError> {
    if message.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    Ok(message)
}
