//! Tool-use conversation loop shared by every agent

use anyhow::{Result, anyhow};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::providers::{LlmBlock, LlmContent, LlmMessage, LlmProvider, LlmResponseBlock, LlmRole};
use crate::tools::{ToolExecutor, ToolRegistry};
use crate::types::AgentResult;

/// Tool results longer than this are cut before going back to the model
const MAX_TOOL_OUTPUT: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentRuntimeConfig {
    /// Wall-clock budget for one query, tool calls included
    pub query_timeout: Duration,
    /// Model round-trips before giving up
    pub max_iterations: usize,
}

impl Default for AgentRuntimeConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(300),
            max_iterations: 10,
        }
    }
}

/// An LLM with a system prompt and a set of tools
pub struct ToolAgent {
    name: String,
    provider: Arc<dyn LlmProvider>,
    tools: ToolRegistry,
    system_prompt: String,
    config: AgentRuntimeConfig,
}

impl ToolAgent {
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn LlmProvider>,
        tools: ToolRegistry,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            tools,
            system_prompt: system_prompt.into(),
            config: AgentRuntimeConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AgentRuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn config(&self) -> &AgentRuntimeConfig {
        &self.config
    }

    /// Answer `input`, folding every failure into the result
    pub async fn query(&self, input: &str) -> AgentResult {
        if input.trim().is_empty() {
            return AgentResult::failure("Query cannot be empty");
        }

        let timeout = self.config.query_timeout;
        match tokio::time::timeout(timeout, self.run(input)).await {
            Ok(Ok(text)) if text.trim().is_empty() => {
                warn!("{} produced an empty answer", self.name);
                AgentResult {
                    success: true,
                    output: None,
                    error: None,
                }
            }
            Ok(Ok(text)) => AgentResult::success(text),
            Ok(Err(e)) => {
                warn!("{} failed: {}", self.name, e);
                AgentResult::failure(e.to_string())
            }
            Err(_) => {
                warn!("{} timed out after {:?}", self.name, timeout);
                AgentResult::failure(format!(
                    "Agent timed out after {} seconds",
                    timeout.as_secs()
                ))
            }
        }
    }

    /// Run the tool loop until the model answers without calling tools
    pub async fn run(&self, input: &str) -> Result<String> {
        let tool_defs = self.tools.list_tools();
        let mut conversation = vec![LlmMessage::user(input)];

        for iteration in 1..=self.config.max_iterations {
            debug!("{} tool loop iteration {}", self.name, iteration);

            let response = self
                .provider
                .chat(&conversation, &tool_defs, &self.system_prompt)
                .await?;

            conversation.push(LlmMessage {
                role: LlmRole::Assistant,
                content: LlmContent::Blocks(response.to_blocks()),
            });

            let calls: Vec<_> = response
                .blocks
                .iter()
                .filter_map(|b| match b {
                    LlmResponseBlock::ToolCall { id, name, input } => Some((id, name, input)),
                    LlmResponseBlock::Text { .. } => None,
                })
                .collect();

            if calls.is_empty() {
                if response.stop_reason.is_tool_use() {
                    return Err(anyhow!("Stop reason was tool_use but no tool calls found"));
                }
                debug!(
                    "{} finished after {} iterations (stop={:?})",
                    self.name, iteration, response.stop_reason
                );
                return Ok(response.text());
            }

            let mut results = Vec::with_capacity(calls.len());
            for (id, name, input) in calls {
                info!("{} executing tool: {}", self.name, name);
                let output = match self.tools.execute(name, input.clone()).await {
                    Ok(output) => output,
                    Err(e) => format!("Error: {}", e),
                };
                results.push(LlmBlock::ToolResult {
                    tool_call_id: id.clone(),
                    content: truncate_output(output),
                });
            }

            conversation.push(LlmMessage {
                role: LlmRole::User,
                content: LlmContent::Blocks(results),
            });
        }

        warn!(
            "{} exceeded maximum iterations ({})",
            self.name, self.config.max_iterations
        );
        Err(anyhow!(
            "Agent stopped after {} iterations without an answer",
            self.config.max_iterations
        ))
    }
}

fn truncate_output(mut output: String) -> String {
    if output.len() <= MAX_TOOL_OUTPUT {
        return output;
    }
    let mut cut = MAX_TOOL_OUTPUT;
    while !output.is_char_boundary(cut) {
        cut -= 1;
    }
    output.truncate(cut);
    output.push_str("\n[Output truncated]");
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{ScriptedProvider, text_response, tool_call};
    use crate::providers::{LlmProvider, LlmResponse, LlmUsage, StopReason};
    use crate::tools::{ToolDefinition, ToolHandler, json_schema};
    use async_trait::async_trait;
    use serde_json::Value;

    struct CountTool;

    #[async_trait]
    impl ToolHandler for CountTool {
        fn name(&self) -> &str {
            "count_rows"
        }
        fn description(&self) -> &str {
            "Count rows"
        }
        fn input_schema(&self) -> Value {
            json_schema(serde_json::json!({}), vec![])
        }
        async fn execute(&self, input: Value) -> Result<String> {
            if input.get("fail").is_some() {
                return Err(anyhow!("table is locked"));
            }
            Ok("42".to_string())
        }
    }

    fn agent(provider: Arc<dyn LlmProvider>) -> ToolAgent {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(CountTool));
        ToolAgent::new("Test Agent", provider, tools, "You count rows.")
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("Hello")]));
        let result = agent(provider.clone()).query("hi").await;
        assert_eq!(result, AgentResult::success("Hello"));
        assert_eq!(provider.systems.lock().unwrap()[0], "You count rows.");
        assert_eq!(provider.tool_names.lock().unwrap()[0], vec!["count_rows"]);
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call("c1", "count_rows", serde_json::json!({})),
            text_response("There are 42 rows."),
        ]));
        let result = agent(provider.clone()).query("how many rows?").await;
        assert_eq!(result.output.as_deref(), Some("There are 42 rows."));

        // user, assistant(tool call), user(tool result)
        let transcripts = provider.transcripts.lock().unwrap();
        let second = &transcripts[1];
        assert_eq!(second.len(), 3);
        assert!(matches!(
            &second[2].content,
            LlmContent::Blocks(blocks)
                if matches!(&blocks[0], LlmBlock::ToolResult { tool_call_id, content }
                    if tool_call_id == "c1" && content == "42")
        ));
    }

    #[tokio::test]
    async fn test_tool_error_fed_back() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call("c1", "count_rows", serde_json::json!({"fail": true})),
            text_response("The table is locked."),
        ]));
        let result = agent(provider.clone()).query("count").await;
        assert!(result.success);

        let transcripts = provider.transcripts.lock().unwrap();
        assert!(matches!(
            &transcripts[1][2].content,
            LlmContent::Blocks(blocks)
                if matches!(&blocks[0], LlmBlock::ToolResult { content, .. }
                    if content == "Error: table is locked")
        ));
    }

    #[tokio::test]
    async fn test_empty_query_rejected_without_llm_call() {
        let provider = Arc::new(ScriptedProvider::answering("unused"));
        let result = agent(provider.clone()).query("   ").await;
        assert_eq!(result, AgentResult::failure("Query cannot be empty"));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_error_becomes_failure() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let result = agent(provider).query("hello").await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("script exhausted"));
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let provider = Arc::new(ScriptedProvider::new(
            (0..5)
                .map(|i| tool_call(&format!("c{}", i), "count_rows", serde_json::json!({})))
                .collect(),
        ));
        let agent = agent(provider.clone()).with_config(AgentRuntimeConfig {
            max_iterations: 3,
            ..AgentRuntimeConfig::default()
        });
        let result = agent.query("loop forever").await;
        assert_eq!(
            result.error.as_deref(),
            Some("Agent stopped after 3 iterations without an answer")
        );
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_answer_has_no_output() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("  ")]));
        let result = agent(provider).query("hello").await;
        assert!(result.success);
        assert!(result.output.is_none());
    }

    struct SlowProvider;

    #[async_trait]
    impl LlmProvider for SlowProvider {
        fn provider_name(&self) -> &str {
            "slow"
        }
        fn model(&self) -> &str {
            "slow"
        }
        async fn chat(
            &self,
            _messages: &[LlmMessage],
            _tools: &[ToolDefinition],
            _system: &str,
        ) -> Result<LlmResponse> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(LlmResponse {
                blocks: vec![],
                stop_reason: StopReason::EndTurn,
                usage: LlmUsage::default(),
            })
        }
    }

    #[tokio::test]
    async fn test_timeout() {
        let agent = agent(Arc::new(SlowProvider)).with_config(AgentRuntimeConfig {
            query_timeout: Duration::from_secs(1),
            max_iterations: 10,
        });
        let result = agent.query("hello").await;
        assert_eq!(
            result,
            AgentResult::failure("Agent timed out after 1 seconds")
        );
    }

    #[test]
    fn test_truncate_output() {
        assert_eq!(truncate_output("short".to_string()), "short");
        let long = "é".repeat(MAX_TOOL_OUTPUT);
        let cut = truncate_output(long);
        assert!(cut.ends_with("\n[Output truncated]"));
        assert!(cut.len() <= MAX_TOOL_OUTPUT + "\n[Output truncated]".len());
    }
}
