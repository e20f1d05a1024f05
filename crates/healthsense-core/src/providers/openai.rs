//! OpenAI Chat Completions provider (gpt-3.5-turbo, gpt-4o, ...)
//!
//! Also works against any server exposing the same `/v1/chat/completions`
//! endpoint. Tool results are sent as `tool` role messages and tool calls
//! come back as JSON-encoded argument strings.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::tools::ToolDefinition;

use super::types::{
    LlmBlock, LlmContent, LlmMessage, LlmProvider, LlmResponse, LlmResponseBlock, LlmRole,
    LlmUsage, StopReason,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI provider
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        max_tokens: u32,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_tokens,
            temperature: 0.0,
        })
    }

    /// Sampling temperature; agents run deterministic by default
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn request<'a>(
        &'a self,
        messages: &[LlmMessage],
        tools: &'a [ToolDefinition],
        system: &str,
    ) -> CompletionRequest<'a> {
        let mut wire = vec![WireMessage::text(WireRole::System, system)];
        for message in messages {
            encode_message(message, &mut wire);
        }

        CompletionRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: wire,
            tools: tools.iter().map(ToolSpec::from).collect(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[LlmMessage],
        tools: &[ToolDefinition],
        system: &str,
    ) -> Result<LlmResponse> {
        let request = self.request(messages, tools, system);
        debug!(
            "OpenAI request: model={}, messages={}, tools={}",
            request.model,
            request.messages.len(),
            request.tools.len()
        );

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to OpenAI API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "OpenAI API request failed with status {}: {}",
                status,
                api_error_message(&body)
            );
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI API response")?;
        completion.into_llm_response()
    }
}

/// Append the wire form of one conversation message.
///
/// A user turn carrying tool results expands into one `tool` message per
/// result, followed by any plain text it also held.
fn encode_message(message: &LlmMessage, out: &mut Vec<WireMessage>) {
    let blocks = match (&message.role, &message.content) {
        (LlmRole::System, _) => return,
        (LlmRole::User, LlmContent::Text(text)) => {
            out.push(WireMessage::text(WireRole::User, text));
            return;
        }
        (LlmRole::Assistant, LlmContent::Text(text)) => {
            out.push(WireMessage::text(WireRole::Assistant, text));
            return;
        }
        (_, LlmContent::Blocks(blocks)) => blocks,
    };

    let text = joined_text(blocks);
    if message.role == LlmRole::Assistant {
        let calls: Vec<ToolCall> = blocks
            .iter()
            .filter_map(|block| match block {
                LlmBlock::ToolCall { id, name, input } => Some(ToolCall::Function {
                    id: id.clone(),
                    function: FunctionCall {
                        name: name.clone(),
                        arguments: input.to_string(),
                    },
                }),
                _ => None,
            })
            .collect();
        out.push(WireMessage {
            role: WireRole::Assistant,
            content: text,
            tool_calls: calls,
            tool_call_id: None,
        });
        return;
    }

    out.extend(blocks.iter().filter_map(|block| match block {
        LlmBlock::ToolResult {
            tool_call_id,
            content,
        } => Some(WireMessage {
            role: WireRole::Tool,
            content: Some(content.clone()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.clone()),
        }),
        _ => None,
    }));
    if let Some(text) = text {
        out.push(WireMessage::text(WireRole::User, &text));
    }
}

fn joined_text(blocks: &[LlmBlock]) -> Option<String> {
    let parts: Vec<&str> = blocks
        .iter()
        .filter_map(|block| match block {
            LlmBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("\n"))
}

/// Model-supplied arguments; anything but a JSON object becomes `{}`
fn parse_arguments(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        _ => Value::Object(Map::new()),
    }
}

/// Pull `error.message` out of an OpenAI error body, else return it as is
fn api_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if body.trim().is_empty() => "Unknown error".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

// Request side

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSpec<'a>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum WireRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: WireRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    fn text(role: WireRole, text: &str) -> Self {
        Self {
            role,
            content: Some(text.to_string()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ToolCall {
    Function { id: String, function: FunctionCall },
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    /// JSON-encoded object
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ToolSpec<'a> {
    Function { function: FunctionSpec<'a> },
}

#[derive(Debug, Serialize)]
struct FunctionSpec<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

impl<'a> From<&'a ToolDefinition> for ToolSpec<'a> {
    fn from(tool: &'a ToolDefinition) -> Self {
        ToolSpec::Function {
            function: FunctionSpec {
                name: &tool.name,
                description: &tool.description,
                parameters: &tool.input_schema,
            },
        }
    }
}

// Response side

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
    #[serde(default)]
    finish_reason: Option<FinishReason>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ReplyToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ReplyToolCall {
    id: String,
    function: FunctionCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl CompletionResponse {
    fn into_llm_response(self) -> Result<LlmResponse> {
        let usage = self.usage.unwrap_or_default();
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("OpenAI response had no choices"))?;
        debug!("OpenAI response: finish_reason={:?}", choice.finish_reason);

        let text = choice
            .message
            .content
            .filter(|text| !text.is_empty())
            .map(|text| LlmResponseBlock::Text { text });
        let calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| LlmResponseBlock::ToolCall {
                input: parse_arguments(&call.function.arguments),
                id: call.id,
                name: call.function.name,
            });

        let stop_reason = match choice.finish_reason {
            Some(FinishReason::Stop) => StopReason::EndTurn,
            Some(FinishReason::ToolCalls) => StopReason::ToolUse,
            Some(FinishReason::Length) => StopReason::MaxTokens,
            Some(FinishReason::Other) | None => StopReason::Unknown,
        };

        Ok(LlmResponse {
            blocks: text.into_iter().chain(calls).collect(),
            stop_reason,
            usage: LlmUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        })
    }
}
