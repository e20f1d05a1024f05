//! Hospital comparison over the general-information table

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::HealthAgent;
use super::runtime::{AgentRuntimeConfig, ToolAgent};
use crate::providers::LlmProvider;
use crate::store::DataFrame;
use crate::tools::{ToolRegistry, dataframe_tools};
use crate::types::{AgentResult, IntentCategory};

const HOSPITAL_SYSTEM_PROMPT: &str = "\
You are a Hospital Information Analyst, an expert in evaluating hospital data, patient \
reviews and healthcare metrics. Your goal is to compare hospitals based on the parameters \
the user cares about: location, specialties, ratings, capacity and services.

Inspect the hospital table with your tools before answering. Quote the figures you rely on, \
say plainly when the data does not cover something, and end with a short recommendation.";

pub struct HospitalComparisonAgent {
    runtime: ToolAgent,
    frame: Arc<DataFrame>,
}

impl HospitalComparisonAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, csv_path: &Path) -> Result<Self> {
        let frame = DataFrame::from_csv(csv_path)
            .with_context(|| format!("Hospital data unavailable at {}", csv_path.display()))?;
        info!("Loaded {} hospital records", frame.len());
        Ok(Self::from_frame(provider, frame))
    }

    pub fn from_frame(provider: Arc<dyn LlmProvider>, frame: DataFrame) -> Self {
        let frame = Arc::new(frame);
        let mut tools = ToolRegistry::new();
        tools.register_all(dataframe_tools(frame.clone()));

        let runtime = ToolAgent::new(
            IntentCategory::Hospital.agent_label(),
            provider,
            tools,
            HOSPITAL_SYSTEM_PROMPT,
        );
        Self { runtime, frame }
    }

    pub fn with_config(mut self, config: AgentRuntimeConfig) -> Self {
        self.runtime = self.runtime.with_config(config);
        self
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub async fn compare_hospitals(&self, query: &str) -> AgentResult {
        self.runtime.query(query).await
    }
}

#[async_trait]
impl HealthAgent for HospitalComparisonAgent {
    fn name(&self) -> &str {
        self.runtime.name()
    }

    async fn query(&self, input: &str) -> Result<AgentResult> {
        Ok(self.compare_hospitals(input).await)
    }
}
