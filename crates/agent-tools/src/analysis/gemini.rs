//! Task analysis through the Gemini `generateContent` REST API.
//!
//! Without an API key the analyzer runs offline on length and wording
//! heuristics, so it can be configured unconditionally.

use super::task::TaskKind;
use super::{
    AnalyzerFuture, Exchange, TaskAnalyzer, TaskStatus, contains_any, history_summary,
    original_request, status_keyword,
};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
/// Environment variable consulted when no key is configured.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// The latest reply is cut to this many characters in the analysis prompt.
const PROMPT_REPLY_CHARS: usize = 500;

const HEURISTIC_COMPLETION_INDICATORS: &[&str] = &[
    "希望这对你有帮助",
    "希望这解答了你的问题",
    "如有其他问题",
    "希望对你有所帮助",
    "总结一下",
    "总而言之",
    "hope this helps",
    "to summarize",
    "in summary",
];

const VERDICT_COMPLETED_HINTS: &[&str] = &["完成", "完整", "足够", "finished", "sufficient"];
const VERDICT_NEEDS_INFO_HINTS: &[&str] = &["更多信息", "提供", "问题", "more information", "question"];

/// Settings for [`GeminiTaskAnalyzer`].
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// API key; falls back to `GEMINI_API_KEY` when `None`.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.into(),
            base_url: GEMINI_BASE_URL.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl GeminiConfig {
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Analyzer backed by a Gemini model, or by offline heuristics without a key.
///
/// API failures are logged and yield [`TaskStatus::Continue`].
pub struct GeminiTaskAnalyzer {
    client: reqwest::Client,
    config: GeminiConfig,
    api_key: Option<String>,
}

impl GeminiTaskAnalyzer {
    pub fn new(config: GeminiConfig) -> Result<Self, String> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(GEMINI_API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            warn!("No Gemini API key configured, using heuristic task analysis");
        }
        Self::build(config, api_key)
    }

    /// An analyzer that never calls the API, regardless of environment.
    pub fn heuristic() -> Self {
        Self {
            client: reqwest::Client::new(),
            config: GeminiConfig::default(),
            api_key: None,
        }
    }

    fn build(config: GeminiConfig, api_key: Option<String>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// Whether verdicts come from heuristics rather than the API.
    pub fn is_heuristic(&self) -> bool {
        self.api_key.is_none()
    }

    pub fn build_prompt(history: &[Exchange], last_response: &str) -> String {
        let request = original_request(history);
        format!(
            "Analyze whether the AI reply below completed the user's request.\n\n\
             Original request: {request}\n\n\
             Task type: {}\n\n\
             Conversation summary:\n{}\n\n\
             Latest AI reply:\n{}\n\n\
             Judge the reply by whether it:\n\
             1. answers the request directly and completely\n\
             2. contains all necessary details\n\
             3. leaves content that still needs explaining or expanding\n\
             4. asks the user for more information\n\n\
             Return only one of these statuses, without explanation:\n\
             COMPLETED - the task is done, no further interaction needed\n\
             NEEDS_MORE_INFO - the user must provide more information\n\
             CONTINUE - the task is in progress and the AI should continue",
            TaskKind::detect(request),
            history_summary(history),
            crate::preview(last_response, PROMPT_REPLY_CHARS),
        )
    }

    /// Offline verdict used when no API key is available.
    pub fn heuristic_status(history: &[Exchange], last_response: &str) -> TaskStatus {
        let length = last_response.chars().count();
        if length < 100 {
            return TaskStatus::NeedsMoreInfo;
        }
        if contains_any(&last_response.to_lowercase(), HEURISTIC_COMPLETION_INDICATORS) {
            return TaskStatus::Completed;
        }
        if last_response.matches("- ").count() > 3 {
            return TaskStatus::Completed;
        }
        let request = history.first().map_or("", |e| e.question.as_str());
        let complete = match TaskKind::detect(request) {
            TaskKind::Factual => length > 300,
            TaskKind::Explanation => length > 500,
            TaskKind::Code => last_response.contains("```") && length > 600,
            TaskKind::Creative => false,
        };
        if complete {
            TaskStatus::Completed
        } else {
            TaskStatus::Continue
        }
    }

    /// Map Gemini's reply text to a status.
    pub fn parse_verdict(verdict: &str) -> TaskStatus {
        if let Some(status) = status_keyword(verdict) {
            return status;
        }
        let lower = verdict.to_lowercase();
        if contains_any(&lower, VERDICT_COMPLETED_HINTS) {
            TaskStatus::Completed
        } else if contains_any(&lower, VERDICT_NEEDS_INFO_HINTS) {
            TaskStatus::NeedsMoreInfo
        } else {
            TaskStatus::Continue
        }
    }

    fn request_body(prompt: &str) -> Value {
        json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": 0,
                "topP": 0.95,
                "maxOutputTokens": 100
            }
        })
    }

    async fn generate(&self, api_key: &str, prompt: &str) -> Result<String, String> {
        let url = format!(
            "{}/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let mut url =
            reqwest::Url::parse(&url).map_err(|e| format!("invalid Gemini url '{url}': {e}"))?;
        url.query_pairs_mut().append_pair("key", api_key);

        let resp = self
            .client
            .post(url)
            .json(&Self::request_body(prompt))
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;
        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| format!("failed to parse response: {e}"))?;

        if let Some(message) = body["error"]["message"].as_str() {
            return Err(format!("Gemini API error: {message}"));
        }
        if !status.is_success() {
            return Err(format!("Gemini API HTTP {status}"));
        }
        response_text(&body).ok_or_else(|| "Gemini response has no text".to_string())
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(body: &Value) -> Option<String> {
    let parts = body["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    Some(text.trim().to_string())
}

impl TaskAnalyzer for GeminiTaskAnalyzer {
    fn analyze<'a>(&'a self, history: &'a [Exchange], last_response: &'a str) -> AnalyzerFuture<'a> {
        Box::pin(async move {
            let Some(api_key) = self.api_key.as_deref() else {
                return Self::heuristic_status(history, last_response);
            };
            let prompt = Self::build_prompt(history, last_response);
            match self.generate(api_key, &prompt).await {
                Ok(verdict) => {
                    debug!("[analyzer] gemini verdict: {verdict}");
                    Self::parse_verdict(&verdict)
                }
                Err(e) => {
                    warn!("[analyzer] gemini analysis failed, assuming CONTINUE: {e}");
                    TaskStatus::Continue
                }
            }
        })
    }
}
