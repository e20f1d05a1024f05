//! Provider-agnostic types for LLM tool-use conversations

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::ToolDefinition;

/// Message sent to an LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: LlmContent,
}

impl LlmMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: LlmRole::User,
            content: LlmContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: LlmRole::Assistant,
            content: LlmContent::Text(text.into()),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    User,
    Assistant,
    System,
}

/// Content of a message: plain text or structured blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LlmContent {
    Text(String),
    Blocks(Vec<LlmBlock>),
}

/// A single block within a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LlmBlock {
    Text { text: String },
    ToolCall { id: String, name: String, input: Value },
    ToolResult { tool_call_id: String, content: String },
}

/// Provider-agnostic response
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub blocks: Vec<LlmResponseBlock>,
    pub stop_reason: StopReason,
    pub usage: LlmUsage,
}

impl LlmResponse {
    /// All text blocks joined by newlines
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                LlmResponseBlock::Text { text } => Some(text.as_str()),
                LlmResponseBlock::ToolCall { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Convert into the block form used when replaying the turn
    pub fn to_blocks(&self) -> Vec<LlmBlock> {
        self.blocks
            .iter()
            .map(|b| match b {
                LlmResponseBlock::Text { text } => LlmBlock::Text { text: text.clone() },
                LlmResponseBlock::ToolCall { id, name, input } => LlmBlock::ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                },
            })
            .collect()
    }
}

/// A block in the response
#[derive(Debug, Clone)]
pub enum LlmResponseBlock {
    Text { text: String },
    ToolCall { id: String, name: String, input: Value },
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    Unknown,
}

/// Token usage from a single API call
#[derive(Debug, Clone, Copy, Default)]
pub struct LlmUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Trait that all LLM providers implement
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g. "openai")
    fn provider_name(&self) -> &str;

    /// Model identifier (e.g. "gpt-3.5-turbo")
    fn model(&self) -> &str;

    /// Send a chat request with optional tools and system prompt
    async fn chat(
        &self,
        messages: &[LlmMessage],
        tools: &[ToolDefinition],
        system: &str,
    ) -> Result<LlmResponse>;
}

impl std::fmt::Display for LlmRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

impl StopReason {
    /// Whether the model wants to call tools
    pub fn is_tool_use(&self) -> bool {
        matches!(self, Self::ToolUse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_role_display() {
        assert_eq!(LlmRole::User.to_string(), "user");
        assert_eq!(LlmRole::Assistant.to_string(), "assistant");
        assert_eq!(LlmRole::System.to_string(), "system");
    }

    #[test]
    fn test_response_text_skips_tool_calls() {
        let resp = LlmResponse {
            blocks: vec![
                LlmResponseBlock::Text {
                    text: "Checking the directory".to_string(),
                },
                LlmResponseBlock::ToolCall {
                    id: "call_1".to_string(),
                    name: "sql_db_list_tables".to_string(),
                    input: serde_json::json!({}),
                },
                LlmResponseBlock::Text {
                    text: "now".to_string(),
                },
            ],
            stop_reason: StopReason::ToolUse,
            usage: LlmUsage::default(),
        };
        assert_eq!(resp.text(), "Checking the directory\nnow");
        assert_eq!(resp.to_blocks().len(), 3);
        assert!(resp.stop_reason.is_tool_use());
    }

    #[test]
    fn test_message_constructors() {
        let msg = LlmMessage::user("hello");
        assert_eq!(msg.role, LlmRole::User);
        assert!(matches!(msg.content, LlmContent::Text(ref t) if t == "hello"));
        assert_eq!(LlmMessage::assistant("hi").role, LlmRole::Assistant);
    }
}
