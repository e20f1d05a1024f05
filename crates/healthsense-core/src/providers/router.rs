//! Retrying provider wrapper with optional failover

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::tools::ToolDefinition;

use super::types::{LlmMessage, LlmProvider, LlmResponse};

/// Wraps one or more providers. Transient errors are retried with
/// exponential backoff; anything else moves straight to the next provider.
pub struct ModelRouter {
    /// Index 0 is the primary
    providers: Vec<Arc<dyn LlmProvider>>,
    /// Attempts per provider, including the first
    max_attempts: u32,
    base_retry_delay: Duration,
}

impl ModelRouter {
    pub fn single(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            providers: vec![provider],
            max_attempts: 1,
            base_retry_delay: Duration::from_millis(500),
        }
    }

    pub fn with_failover(providers: Vec<Arc<dyn LlmProvider>>) -> Result<Self> {
        if providers.is_empty() {
            return Err(anyhow!("ModelRouter requires at least one provider"));
        }
        Ok(Self {
            providers,
            max_attempts: 2,
            base_retry_delay: Duration::from_millis(500),
        })
    }

    /// Retries after the first attempt; `0` disables retrying
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_attempts = retries.saturating_add(1);
        self
    }

    pub fn with_base_retry_delay(mut self, delay: Duration) -> Self {
        self.base_retry_delay = delay;
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    fn primary(&self) -> Option<&Arc<dyn LlmProvider>> {
        self.providers.first()
    }
}

#[async_trait]
impl LlmProvider for ModelRouter {
    fn provider_name(&self) -> &str {
        self.primary().map(|p| p.provider_name()).unwrap_or("unknown")
    }

    fn model(&self) -> &str {
        self.primary().map(|p| p.model()).unwrap_or("unknown")
    }

    async fn chat(
        &self,
        messages: &[LlmMessage],
        tools: &[ToolDefinition],
        system: &str,
    ) -> Result<LlmResponse> {
        let mut last_error = None;

        for (idx, provider) in self.providers.iter().enumerate() {
            for attempt in 0..self.max_attempts {
                debug!(
                    "Calling {} ({}) attempt {}/{}",
                    provider.provider_name(),
                    provider.model(),
                    attempt + 1,
                    self.max_attempts,
                );

                match provider.chat(messages, tools, system).await {
                    Ok(response) => {
                        if idx > 0 {
                            info!(
                                "Request served by failover provider {} ({})",
                                provider.provider_name(),
                                provider.model()
                            );
                        }
                        return Ok(response);
                    }
                    Err(e) => {
                        let retryable = is_retryable_error(&e.to_string());
                        warn!(
                            "{} ({}) failed on attempt {} (retryable={}): {}",
                            provider.provider_name(),
                            provider.model(),
                            attempt + 1,
                            retryable,
                            e,
                        );
                        last_error = Some(e);

                        if !retryable {
                            break;
                        }
                        if attempt + 1 < self.max_attempts {
                            let delay = self.base_retry_delay * 2u32.saturating_pow(attempt);
                            debug!("Backing off for {:?}", delay);
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("All providers failed")))
    }
}

/// Rate limits, 5xx responses, and network hiccups are worth another try
fn is_retryable_error(err: &str) -> bool {
    const PATTERNS: &[&str] = &[
        "429",
        "500",
        "502",
        "503",
        "504",
        "rate limit",
        "rate_limit",
        "overloaded",
        "timeout",
        "timed out",
        "connection reset",
        "connection refused",
        "temporarily unavailable",
    ];
    let lower = err.to_lowercase();
    PATTERNS.iter().any(|p| lower.contains(p))
}
