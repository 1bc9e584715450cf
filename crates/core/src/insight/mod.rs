pub mod client;
pub mod debounce;
pub mod orchestrator;
pub mod prompt;
pub mod schema;

use voltsight_llm::provider::LlmError;

pub use client::InsightClient;
pub use debounce::InsightDebouncer;
pub use orchestrator::{InsightOrchestrator, InsightOutcome, OutcomeReceiver};
pub use prompt::InsightDepth;

/// Everything that can go wrong between sending the prompt and holding a
/// validated insight.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InsightError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("schema violation: {0}")]
    Schema(String),
}
