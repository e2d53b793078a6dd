//! Extraction of reasoning text and tool calls from model replies.
//!
//! Models are asked (see [`ToolManager::tool_instructions`]) to explain
//! themselves in prose and end with a fenced JSON block:
//!
//! ````text
//! I'll fetch the listing first.
//! ```json
//! {"tool_calls": [{"tool_name": "api_call", "parameters": {"url": "...", "method": "GET"}}]}
//! ```
//! ````
//!
//! [`DefaultResponseParser`] reads whatever calls the last such block holds.
//! [`ApiCallResponseParser`] is stricter and only accepts calls that carry a
//! `url` and `method`.
//!
//! [`ToolManager::tool_instructions`]: crate::tools::ToolManager::tool_instructions

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::{debug, warn};

/// A tool invocation requested by the model.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ParsedToolCall {
    pub tool_name: String,
    #[serde(default = "empty_object")]
    pub parameters: Value,
}

impl ParsedToolCall {
    pub fn new(tool_name: impl Into<String>, parameters: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters,
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Normalized view of a model reply.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct ParsedResponse {
    /// The model's natural-language reasoning.
    pub thought: String,
    /// Requested tool calls, if the reply contained any.
    pub tool_calls: Option<Vec<ParsedToolCall>>,
    /// Free-form content output. Not populated by the built-in parsers.
    pub content: Option<String>,
    /// Parameters of an `api_call` request, surfaced for convenience.
    pub api_call: Option<Value>,
}

/// Turns a raw model reply into a [`ParsedResponse`]. Parsing never fails:
/// malformed structure degrades to a reply with only a `thought`.
pub trait ResponseParser: Send + Sync {
    fn parse(&self, response: &str) -> ParsedResponse;
}

// ── ApiCallResponseParser ──────────────────────────────────────────

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```.*?```").unwrap_or_else(|e| panic!("invalid fence pattern: {e}"))
});

static TOOL_CALLS_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"```(?:json)?\s*(\{\s*"tool_calls"[\s\S]*?\})\s*```"#)
        .unwrap_or_else(|e| panic!("invalid tool_calls pattern: {e}"))
});

/// Parser for replies that drive REST calls.
///
/// Each block contributes its first call whose `parameters` hold a string
/// `url` and `method`; a later block's call replaces an earlier one. Blocks
/// that fail to parse are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiCallResponseParser;

impl ApiCallResponseParser {
    fn is_valid_call(call: &Value) -> bool {
        let Some(obj) = call.as_object() else {
            return false;
        };
        if !obj.get("tool_name").is_some_and(Value::is_string) {
            return false;
        }
        let Some(params) = obj.get("parameters").and_then(Value::as_object) else {
            return false;
        };
        params.get("url").is_some_and(Value::is_string)
            && params.get("method").is_some_and(Value::is_string)
    }

    /// The first valid call of every parseable block, in reply order.
    fn valid_calls(response: &str) -> Vec<ParsedToolCall> {
        let mut found = Vec::new();
        for caps in TOOL_CALLS_BLOCK.captures_iter(response) {
            let Some(block) = caps.get(1) else { continue };
            let parsed: Value = match serde_json::from_str(block.as_str().trim()) {
                Ok(v) => v,
                Err(e) => {
                    debug!("Skipping unparseable tool_calls block: {e}");
                    continue;
                }
            };
            let Some(calls) = parsed.get("tool_calls").and_then(Value::as_array) else {
                continue;
            };
            if let Some(call) = calls.iter().find(|c| Self::is_valid_call(c))
                && let Ok(call) = serde_json::from_value::<ParsedToolCall>(call.clone())
            {
                found.push(call);
            }
        }
        found
    }
}

impl ResponseParser for ApiCallResponseParser {
    fn parse(&self, response: &str) -> ParsedResponse {
        debug!("Parsing reply ({} chars)", response.chars().count());

        let prose = FENCED_BLOCK.replace_all(response, "");
        let thought = prose
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let mut parsed = ParsedResponse {
            thought,
            ..ParsedResponse::default()
        };
        for call in Self::valid_calls(response) {
            if call.tool_name == "api_call" {
                debug!("Parsed api_call: {}", call.parameters);
                parsed.api_call = Some(call.parameters.clone());
            }
            parsed.tool_calls = Some(vec![call]);
        }
        parsed
    }
}

// ── DefaultResponseParser ──────────────────────────────────────────

const JSON_OPENER: &str = "```json";
const FENCE: &str = "```";

/// General-purpose parser: reads the last ```` ```json ```` block.
///
/// Text before the block is the thought. Without a JSON block, or when the
/// block does not parse, the whole reply (trimmed) is the thought.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResponseParser;

impl ResponseParser for DefaultResponseParser {
    fn parse(&self, response: &str) -> ParsedResponse {
        let whole = || ParsedResponse {
            thought: response.trim().to_string(),
            ..ParsedResponse::default()
        };

        let Some(close) = response.rfind(FENCE) else {
            return whole();
        };
        let Some(open) = response.get(..close).and_then(|head| head.rfind(JSON_OPENER)) else {
            return whole();
        };
        let body = response
            .get(open + JSON_OPENER.len()..close)
            .unwrap_or_default()
            .trim();
        debug!("Extracted JSON block ({} chars)", body.len());

        let value: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => {
                warn!("Tool-call block is not valid JSON: {e}");
                return whole();
            }
        };

        let tool_calls = match value.get("tool_calls").filter(|calls| !calls.is_null()) {
            Some(calls) => match serde_json::from_value::<Vec<ParsedToolCall>>(calls.clone()) {
                Ok(calls) => Some(calls),
                Err(e) => {
                    warn!("Malformed tool_calls entry: {e}");
                    return whole();
                }
            },
            None => None,
        };

        ParsedResponse {
            thought: response.get(..open).unwrap_or_default().trim().to_string(),
            tool_calls,
            content: None,
            api_call: None,
        }
    }
}
