use std::sync::Arc;

use voltsight_llm::provider::{ChatMessage, CompletionRequest, LlmProvider};

use crate::config::DashboardCfg;
use crate::insight::prompt::{self, InsightDepth};
use crate::insight::{InsightError, schema};
use crate::types::{BatteryInsight, BatteryStats};

/// Request/response wrapper around the generative-text provider.
#[derive(Clone)]
pub struct InsightClient {
    provider: Arc<dyn LlmProvider>,
    /// Used for [`InsightDepth::Deep`]; falls back to `provider`.
    deep_provider: Option<Arc<dyn LlmProvider>>,
    max_tokens: u32,
    deep_max_tokens: u32,
    temperature: f32,
}

impl InsightClient {
    pub fn new(provider: Arc<dyn LlmProvider>, cfg: &DashboardCfg) -> Self {
        Self {
            provider,
            deep_provider: None,
            max_tokens: cfg.insight_max_tokens,
            deep_max_tokens: cfg.deep_max_tokens,
            temperature: cfg.insight_temperature,
        }
    }

    pub fn with_deep_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.deep_provider = Some(provider);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn request(&self, stats: &BatteryStats, depth: InsightDepth) -> CompletionRequest {
        CompletionRequest {
            messages: vec![
                ChatMessage::system(prompt::system_prompt()),
                ChatMessage::user(prompt::build_prompt(stats, depth)),
            ],
            max_tokens: match depth {
                InsightDepth::Quick => self.max_tokens,
                InsightDepth::Deep => self.deep_max_tokens,
            },
            temperature: self.temperature,
            json_mode: true,
        }
    }

    /// One request, no retry.
    pub async fn fetch(
        &self,
        stats: &BatteryStats,
        depth: InsightDepth,
    ) -> Result<BatteryInsight, InsightError> {
        let provider = match depth {
            InsightDepth::Deep => self.deep_provider.as_ref().unwrap_or(&self.provider),
            InsightDepth::Quick => &self.provider,
        };
        let response = provider.complete(self.request(stats, depth)).await?;
        tracing::debug!(
            provider = provider.name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "insight response received"
        );
        schema::parse_insight(&response.content)
    }
}
