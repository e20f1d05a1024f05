//! Lab tests, prices and screening packages, answered over a dataframe

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::HealthAgent;
use super::runtime::{AgentRuntimeConfig, ToolAgent};
use crate::providers::LlmProvider;
use crate::store::DataFrame;
use crate::tools::{ToolRegistry, dataframe_tools};
use crate::types::{AgentResult, IntentCategory};

const DIAGNOSTIC_SYSTEM_PROMPT: &str = "\
You are a highly skilled healthcare assistant with expertise in suggesting health screening \
tests and packages. You assess hospitals against a user's conditions, preferences and needs, \
using the lab test table available through your tools.

When comparing hospitals or giving lab test information:
- Condition-specific comparison: focus on each hospital's expertise with the user's condition.
- Hospital features: mention reputation, technology, facilities and specialized care.
- Location and accessibility: consider proximity to the user and ease of travel.
- Cost and insurance: compare prices and coverage options.
- Patient feedback: use reviews and ratings when the data has them.
- Personalized recommendation: give a clear suggestion based on the user's priorities.
- Lab test information: give accurate test names, prices, availability and the hospitals \
offering them.

Carefully look at each column name (call dataframe_info first) to understand what to output.
Always provide concise, accurate and helpful information.";

/// Shape of the loaded lab-test table, without involving the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub success: bool,
    pub rows: usize,
    pub columns: Vec<String>,
    pub sample: Vec<Map<String, Value>>,
}

pub struct DiagnosticInfoAgent {
    runtime: ToolAgent,
    frame: Arc<DataFrame>,
}

impl DiagnosticInfoAgent {
    /// Load the lab-test CSV; a missing file is an error
    pub fn new(provider: Arc<dyn LlmProvider>, csv_path: &Path) -> Result<Self> {
        let frame = DataFrame::from_csv(csv_path)
            .with_context(|| format!("Diagnostic data unavailable at {}", csv_path.display()))?;
        info!(
            "Loaded {} diagnostic records (columns: {})",
            frame.len(),
            frame.columns().join(", ")
        );
        Ok(Self::from_frame(provider, frame))
    }

    pub fn from_frame(provider: Arc<dyn LlmProvider>, frame: DataFrame) -> Self {
        let frame = Arc::new(frame);
        let mut tools = ToolRegistry::new();
        tools.register_all(dataframe_tools(frame.clone()));

        let runtime = ToolAgent::new(
            IntentCategory::Diagnostic.agent_label(),
            provider,
            tools,
            DIAGNOSTIC_SYSTEM_PROMPT,
        );
        Self { runtime, frame }
    }

    pub fn with_config(mut self, config: AgentRuntimeConfig) -> Self {
        self.runtime = self.runtime.with_config(config);
        self
    }

    pub async fn ask(&self, input: &str) -> AgentResult {
        self.runtime.query(input).await
    }

    pub async fn get_lab_test_info(&self, test_name: &str) -> AgentResult {
        self.ask(&format!(
            "Tell me about the {} test. What hospitals offer it and what's the price?",
            test_name
        ))
        .await
    }

    pub async fn find_tests_by_condition(&self, condition: &str) -> AgentResult {
        self.ask(&format!("What lab tests are recommended for {}?", condition))
            .await
    }

    pub async fn compare_test_prices(&self, test_name: &str) -> AgentResult {
        self.ask(&format!(
            "Compare the prices for {} across different hospitals. Show me the cheapest options.",
            test_name
        ))
        .await
    }

    pub async fn get_health_screening_packages(&self) -> AgentResult {
        self.ask("What health screening packages are available? List the comprehensive ones.")
            .await
    }

    /// `None` or a non-positive price asks for the cheapest tests overall
    pub async fn find_affordable_tests(&self, max_price: Option<f64>) -> AgentResult {
        let prompt = match max_price.filter(|p| *p > 0.0) {
            Some(price) => format!("Show me all lab tests that cost less than ${}", price),
            None => "Show me the most affordable lab tests available".to_string(),
        };
        self.ask(&prompt).await
    }

    pub fn get_dataset_info(&self) -> DatasetInfo {
        DatasetInfo {
            success: true,
            rows: self.frame.len(),
            columns: self.frame.columns().to_vec(),
            sample: self.frame.records(3),
        }
    }
}

#[async_trait]
impl HealthAgent for DiagnosticInfoAgent {
    fn name(&self) -> &str {
        self.runtime.name()
    }

    async fn query(&self, input: &str) -> Result<AgentResult> {
        Ok(self.ask(input).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{ScriptedProvider, text_response, tool_call};

    fn frame() -> DataFrame {
        let columns = ["Hospital", "Test_Name", "Price"].map(String::from).to_vec();
        let rows = [
            ["City Care", "Lipid Profile", "45"],
            ["Mercy General", "HbA1c", "30"],
            ["Lakeside", "Lipid Profile", "38"],
            ["Lakeside", "Full Body Checkup", "120"],
        ]
        .iter()
        .map(|r| r.map(String::from).to_vec())
        .collect();
        DataFrame::new(columns, rows).unwrap()
    }

    #[test]
    fn test_missing_csv_is_error() {
        let result = DiagnosticInfoAgent::new(
            Arc::new(ScriptedProvider::answering("ok")),
            Path::new("/nonexistent/Hospital_Information_with_Lab_Tests.csv"),
        );
        let err = result.err().unwrap();
        assert!(format!("{:#}", err).contains("CSV file not found"));
    }

    #[test]
    fn test_dataset_info_without_llm() {
        let provider = Arc::new(ScriptedProvider::answering("ok"));
        let agent = DiagnosticInfoAgent::from_frame(provider.clone(), frame());
        let info = agent.get_dataset_info();
        assert_eq!(info.rows, 4);
        assert_eq!(info.columns, vec!["Hospital", "Test_Name", "Price"]);
        assert_eq!(info.sample.len(), 3);
        assert_eq!(info.sample[1]["Price"], Value::from(30));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_helper_prompts() {
        let provider = Arc::new(ScriptedProvider::answering("ok"));
        let agent = DiagnosticInfoAgent::from_frame(provider.clone(), frame());

        agent.get_lab_test_info("HbA1c").await;
        agent.find_tests_by_condition("diabetes").await;
        agent.compare_test_prices("Lipid Profile").await;
        agent.get_health_screening_packages().await;
        agent.find_affordable_tests(Some(50.0)).await;
        agent.find_affordable_tests(None).await;

        assert_eq!(
            *provider.prompts.lock().unwrap(),
            vec![
                "Tell me about the HbA1c test. What hospitals offer it and what's the price?",
                "What lab tests are recommended for diabetes?",
                "Compare the prices for Lipid Profile across different hospitals. Show me the cheapest options.",
                "What health screening packages are available? List the comprehensive ones.",
                "Show me all lab tests that cost less than $50",
                "Show me the most affordable lab tests available",
            ]
        );
    }

    #[tokio::test]
    async fn test_answers_with_dataframe_tools() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call(
                "c1",
                "dataframe_filter",
                serde_json::json!({"column": "Test_Name", "contains": "lipid"}),
            ),
            text_response("Lakeside is cheapest at $38."),
        ]));
        let agent = DiagnosticInfoAgent::from_frame(provider.clone(), frame());
        let result = agent.compare_test_prices("Lipid Profile").await;
        assert_eq!(result.output.as_deref(), Some("Lakeside is cheapest at $38."));
        assert_eq!(
            provider.tool_names.lock().unwrap()[0],
            vec![
                "dataframe_filter",
                "dataframe_info",
                "dataframe_sort",
                "dataframe_unique"
            ]
        );

        let transcripts = provider.transcripts.lock().unwrap();
        let tool_result = format!("{:?}", transcripts[1][2]);
        assert!(tool_result.contains("Lakeside | Lipid Profile | 38"));
        assert!(!tool_result.contains("HbA1c"));
    }
}
