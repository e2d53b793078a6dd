//! OpenRouter chat-completions backend.

use super::service::{LlmCall, LlmCaller, LlmFuture};
use crate::Message;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// OpenRouter chat completions endpoint (OpenAI-compatible).
pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Model used when the role does not name one.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Serialize, Debug)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct RawCompletion {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawMessage,
}

#[derive(Deserialize, Debug)]
struct RawMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

#[derive(Deserialize, Debug)]
struct UsageInfo {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

/// Async HTTP client for the OpenRouter chat completions API.
///
/// Model, temperature and max tokens come from the call's role, falling back
/// to the client defaults.
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    referer: String,
    title: String,
    default_model: String,
    url: String,
}

impl OpenRouterClient {
    /// Create a client with the given API key and default headers.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("agent-tools/0.1")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            referer: "https://github.com/agent-tools-rs/agent-tools".into(),
            title: "agent-tools".into(),
            default_model: DEFAULT_MODEL.into(),
            url: OPENROUTER_URL.into(),
        })
    }

    /// Override the Referer and X-Title attribution headers.
    pub fn with_headers(mut self, referer: impl Into<String>, title: impl Into<String>) -> Self {
        self.referer = referer.into();
        self.title = title.into();
        self
    }

    /// Model used for roles without a `model` setting.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Point the client at another OpenAI-compatible endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn complete(&self, call: LlmCall) -> Result<String, String> {
        if call.stream {
            debug!("Streaming requested; OpenRouterClient always waits for the full reply");
        }
        let body = CompletionRequest {
            model: call.role.model.as_deref().unwrap_or(&self.default_model),
            messages: &call.messages,
            max_tokens: call.role.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: call.role.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        };
        debug!(
            "LLM request: model={}, messages={}, max_tokens={}, temp={}",
            body.model,
            body.messages.len(),
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(&body).map_or(0, |s| s.len())
        );

        let start = Instant::now();
        let resp = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;
        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("OpenRouter API HTTP {status}: {text}"));
        }

        let parsed: RawCompletion =
            serde_json::from_str(&text).map_err(|e| format!("failed to parse response: {e}"))?;
        if let Some(err) = parsed.error {
            return Err(format!("OpenRouter API error: {}", err.message));
        }
        if let Some(usage) = &parsed.usage {
            debug!(
                "Token usage: prompt={}, completion={}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
            );
        }

        parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| "OpenRouter API returned no choices".to_string())
    }
}

impl LlmCaller for OpenRouterClient {
    fn call(&self, call: LlmCall) -> LlmFuture<'_> {
        Box::pin(self.complete(call))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::RoleConfig;

    #[test]
    fn request_body_uses_role_settings() {
        let messages = vec![Message::system("s"), Message::user("u")];
        let role = RoleConfig::new("s").with_model("m").with_max_tokens(10);
        let body = CompletionRequest {
            model: role.model.as_deref().unwrap_or(DEFAULT_MODEL),
            messages: &messages,
            max_tokens: role.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: role.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["max_tokens"], 10);
        assert_eq!(json["messages"][1]["role"], "user");
    }

    #[test]
    fn completion_parses_first_choice() {
        let raw: RawCompletion = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "hi"}}],
                "usage": {"prompt_tokens": 3, "completion_tokens": 1}}"#,
        )
        .unwrap();
        let content = raw.choices.unwrap().remove(0).message.content;
        assert_eq!(content.as_deref(), Some("hi"));
    }

    #[test]
    fn builder_overrides() {
        let client = OpenRouterClient::new("key")
            .unwrap()
            .with_default_model("x/y")
            .with_url("http://127.0.0.1:1/v1/chat/completions");
        assert_eq!(client.default_model, "x/y");
        assert!(client.url.starts_with("http://127.0.0.1"));
    }
}
