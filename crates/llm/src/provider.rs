use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A single message in a conversation.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    /// Wire name shared by every chat API we speak.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

/// LLM completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the provider to constrain output to a single JSON object
    /// (ignored by providers without a JSON mode).
    pub json_mode: bool,
}

/// LLM completion response.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Concatenation of all text the model produced.
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Error type for LLM operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("rate limited")]
    RateLimited,
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("empty response")]
    EmptyResponse,
}

/// Trait for LLM providers (OpenAI, Claude, Gemini, etc.)
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>>;
}

/// Test provider. Returns a fixed response or a fixed error and counts calls.
#[derive(Debug, Clone)]
pub struct MockProvider {
    outcome: Result<String, LlmError>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            outcome: Ok(response.into()),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a mock whose every call fails with `error`.
    pub fn failing(error: LlmError) -> Self {
        Self {
            outcome: Err(error),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Hold every call for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared call counter. Clones of the mock share the same counter.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.outcome.clone();
        let delay = self.delay;
        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            outcome.map(|content| CompletionResponse {
                content,
                input_tokens: 10,
                output_tokens: 20,
            })
        })
    }
}
