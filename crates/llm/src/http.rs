//! reqwest-backed providers for hosted chat models.
//!
//! Every vendor we talk to speaks one of two dialects: the `chat/completions`
//! shape (OpenAI, Gemini's compatibility endpoint, DeepSeek, local proxies) or
//! Anthropic's Messages API. The vendor is picked from the model name.

use crate::provider::{CompletionRequest, CompletionResponse, LlmError, LlmProvider, Role};
use serde::Deserialize;
use serde_json::{Value, json};
use std::future::Future;
use std::pin::Pin;

const ANTHROPIC_VERSION: &str = "2023-06-01";

const MODEL_VAR: &str = "VOLTSIGHT_LLM_MODEL";
const DEEP_MODEL_VAR: &str = "VOLTSIGHT_LLM_DEEP_MODEL";
const API_KEY_VAR: &str = "VOLTSIGHT_LLM_API_KEY";
const BASE_URL_VAR: &str = "VOLTSIGHT_LLM_BASE_URL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    ChatCompletions,
    Messages,
}

impl Dialect {
    fn path(self) -> &'static str {
        match self {
            Dialect::ChatCompletions => "/chat/completions",
            Dialect::Messages => "/v1/messages",
        }
    }
}

/// A hosted model vendor and how to reach it.
#[derive(Debug, PartialEq, Eq)]
pub struct Vendor {
    pub name: &'static str,
    prefixes: &'static [&'static str],
    base_url: &'static str,
    pub dialect: Dialect,
    /// Understands `response_format: {"type": "json_object"}`.
    json_mode: bool,
}

static VENDORS: &[Vendor] = &[
    Vendor {
        name: "openai",
        prefixes: &["gpt-", "o1-", "o3-", "o4-"],
        base_url: "https://api.openai.com/v1",
        dialect: Dialect::ChatCompletions,
        json_mode: true,
    },
    Vendor {
        name: "anthropic",
        prefixes: &["claude-"],
        base_url: "https://api.anthropic.com",
        dialect: Dialect::Messages,
        json_mode: false,
    },
    Vendor {
        name: "google",
        prefixes: &["gemini-"],
        base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
        dialect: Dialect::ChatCompletions,
        json_mode: true,
    },
    Vendor {
        name: "deepseek",
        prefixes: &["deepseek-"],
        base_url: "https://api.deepseek.com",
        dialect: Dialect::ChatCompletions,
        json_mode: true,
    },
];

/// Anything unrecognised is assumed to be an OpenAI-compatible server.
static FALLBACK: Vendor = Vendor {
    name: "unknown",
    prefixes: &[],
    base_url: "https://api.openai.com/v1",
    dialect: Dialect::ChatCompletions,
    json_mode: false,
};

impl Vendor {
    /// Case-insensitive prefix match on the model name.
    pub fn for_model(model: &str) -> &'static Vendor {
        let model = model.to_ascii_lowercase();
        VENDORS
            .iter()
            .find(|v| v.prefixes.iter().any(|p| model.starts_with(p)))
            .unwrap_or(&FALLBACK)
    }
}

pub struct HttpProvider {
    vendor: &'static Vendor,
    model: String,
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpProvider {
    /// `base_url` overrides the vendor default; a trailing slash is tolerated.
    pub fn new(model: String, api_key: String, base_url: Option<String>) -> Self {
        let vendor = Vendor::for_model(&model);
        let base = base_url.as_deref().unwrap_or(vendor.base_url).trim_end_matches('/');
        let endpoint = format!("{base}{}", vendor.dialect.path());
        Self { vendor, model, api_key, endpoint, client: reqwest::Client::new() }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn body(&self, request: &CompletionRequest) -> Value {
        match self.vendor.dialect {
            Dialect::ChatCompletions => {
                let messages: Vec<Value> = request
                    .messages
                    .iter()
                    .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
                    .collect();
                let mut body = json!({
                    "model": self.model,
                    "messages": messages,
                    "max_tokens": request.max_tokens,
                    "temperature": request.temperature,
                });
                if request.json_mode && self.vendor.json_mode {
                    body["response_format"] = json!({ "type": "json_object" });
                }
                body
            }
            Dialect::Messages => {
                // System prompts travel outside the message list here.
                let (system, turns): (Vec<_>, Vec<_>) =
                    request.messages.iter().partition(|m| m.role == Role::System);
                let messages: Vec<Value> = turns
                    .iter()
                    .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
                    .collect();
                let mut body = json!({
                    "model": self.model,
                    "max_tokens": request.max_tokens,
                    "temperature": request.temperature,
                    "messages": messages,
                });
                if !system.is_empty() {
                    let joined: Vec<&str> = system.iter().map(|m| m.content.as_str()).collect();
                    body["system"] = Value::String(joined.join("\n\n"));
                }
                body
            }
        }
    }

    async fn send(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.body(&request);
        let builder = self.client.post(&self.endpoint).json(&body);
        let builder = match self.vendor.dialect {
            Dialect::ChatCompletions => builder.bearer_auth(&self.api_key),
            Dialect::Messages => builder
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
        };

        tracing::debug!(vendor = self.vendor.name, model = %self.model, "sending completion");
        let resp = builder.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                LlmError::Unavailable(e.to_string())
            } else {
                LlmError::RequestFailed(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }
        let reply: Reply = resp
            .json()
            .await
            .map_err(|e| LlmError::RequestFailed(format!("malformed reply: {e}")))?;
        reply.into_response()
    }
}

impl LlmProvider for HttpProvider {
    fn name(&self) -> &str {
        self.vendor.name
    }

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        Box::pin(self.send(request))
    }
}

fn status_error(status: reqwest::StatusCode, body: String) -> LlmError {
    match status.as_u16() {
        429 => LlmError::RateLimited,
        500..=599 => LlmError::Unavailable(format!("{status}: {body}")),
        _ => LlmError::RequestFailed(format!("{status}: {body}")),
    }
}

/// Both dialects' reply bodies. Each vendor fills only its own fields.
#[derive(Deserialize)]
struct Reply {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    content: Vec<Block>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Block {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default, alias = "prompt_tokens")]
    input_tokens: u32,
    #[serde(default, alias = "completion_tokens")]
    output_tokens: u32,
}

impl Reply {
    fn into_response(self) -> Result<CompletionResponse, LlmError> {
        let content = match self.choices.into_iter().next() {
            Some(choice) => choice.message.content.unwrap_or_default(),
            None => self
                .content
                .into_iter()
                .filter(|b| b.kind == "text")
                .map(|b| b.text)
                .collect(),
        };
        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        let (input_tokens, output_tokens) =
            self.usage.map_or((0, 0), |u| (u.input_tokens, u.output_tokens));
        Ok(CompletionResponse { content, input_tokens, output_tokens })
    }
}

/// Provider for the model named in `model_var`, sharing the key and base URL
/// variables. `None` when the model or key is unset.
pub fn from_model_var(model_var: &str) -> Option<HttpProvider> {
    let model = std::env::var(model_var).ok().filter(|m| !m.trim().is_empty())?;
    let api_key = std::env::var(API_KEY_VAR).ok()?;
    let base_url = std::env::var(BASE_URL_VAR).ok();
    Some(HttpProvider::new(model, api_key, base_url))
}

/// Provider for automatic insights.
pub fn from_env() -> Option<HttpProvider> {
    from_model_var(MODEL_VAR)
}

/// Provider for manual deep analysis.
pub fn deep_from_env() -> Option<HttpProvider> {
    from_model_var(DEEP_MODEL_VAR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ChatMessage;

    fn request(json_mode: bool) -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage::system("be brief"), ChatMessage::user("battery at 40%")],
            max_tokens: 200,
            temperature: 0.4,
            json_mode,
        }
    }

    fn provider(model: &str) -> HttpProvider {
        HttpProvider::new(model.into(), "key".into(), None)
    }

    #[test]
    fn vendor_from_model_prefix() {
        assert_eq!(Vendor::for_model("gpt-4o").name, "openai");
        assert_eq!(Vendor::for_model("o4-mini").name, "openai");
        assert_eq!(Vendor::for_model("Claude-Sonnet-4-6").name, "anthropic");
        assert_eq!(Vendor::for_model("GEMINI-2.0-flash").name, "google");
        assert_eq!(Vendor::for_model("deepseek-chat").name, "deepseek");
        assert_eq!(Vendor::for_model("llama-3").name, "unknown");
    }

    #[test]
    fn endpoint_follows_dialect() {
        assert_eq!(provider("gpt-4o").endpoint(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(provider("claude-sonnet-4-6").endpoint(), "https://api.anthropic.com/v1/messages");
        assert_eq!(
            provider("gemini-2.0-flash").endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
        );

        let proxied = HttpProvider::new(
            "llama-3".into(),
            "key".into(),
            Some("http://localhost:11434/v1/".into()),
        );
        assert_eq!(proxied.endpoint(), "http://localhost:11434/v1/chat/completions");
        assert_eq!(proxied.name(), "unknown");
    }

    #[test]
    fn json_mode_only_where_supported() {
        let body = provider("gemini-2.0-flash").body(&request(true));
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");

        assert!(provider("gemini-2.0-flash").body(&request(false)).get("response_format").is_none());
        assert!(provider("llama-3").body(&request(true)).get("response_format").is_none());
    }

    #[test]
    fn messages_dialect_lifts_system_prompt() {
        let body = provider("claude-sonnet-4-6").body(&request(true));
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn reply_text_from_either_dialect() {
        let chat: Reply = serde_json::from_value(json!({
            "choices": [{ "message": { "content": "{\"status\":\"ok\"}" } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 7 }
        }))
        .unwrap();
        let resp = chat.into_response().unwrap();
        assert_eq!(resp.content, "{\"status\":\"ok\"}");
        assert_eq!((resp.input_tokens, resp.output_tokens), (12, 7));

        let messages: Reply = serde_json::from_value(json!({
            "content": [
                { "type": "text", "text": "part one " },
                { "type": "thinking", "thinking": "..." },
                { "type": "text", "text": "part two" }
            ]
        }))
        .unwrap();
        let resp = messages.into_response().unwrap();
        assert_eq!(resp.content, "part one part two");
        assert_eq!(resp.input_tokens, 0);
    }

    #[test]
    fn blank_reply_is_an_error() {
        let reply: Reply =
            serde_json::from_value(json!({ "choices": [{ "message": { "content": null } }] }))
                .unwrap();
        assert!(matches!(reply.into_response(), Err(LlmError::EmptyResponse)));
    }

    #[test]
    fn status_codes_map_to_errors() {
        use reqwest::StatusCode;
        assert!(matches!(status_error(StatusCode::TOO_MANY_REQUESTS, String::new()), LlmError::RateLimited));
        assert!(matches!(status_error(StatusCode::BAD_GATEWAY, "down".into()), LlmError::Unavailable(_)));
        assert!(matches!(status_error(StatusCode::UNAUTHORIZED, "bad key".into()), LlmError::RequestFailed(_)));
    }
}
