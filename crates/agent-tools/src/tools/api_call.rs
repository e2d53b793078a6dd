//! REST API calls through a caller-supplied HTTP client.

use super::core::{Tool, ToolFuture, missing_params, param_str};
use super::result::ToolCallResult;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// HTTP methods accepted by [`ApiCallTool`].
pub const VALID_METHODS: &[&str] = &["DELETE", "GET", "HEAD", "OPTIONS", "PATCH", "POST", "PUT"];

/// Methods whose `body` parameter is sent as a JSON request body. Every
/// other method sends `params` as the query string instead.
const BODY_METHODS: &[&str] = &["POST", "PUT", "PATCH", "DELETE"];

/// User-Agent sent unless the caller overrides it via `headers`.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";

/// Typed parameters for `api_call`.
#[derive(Deserialize, JsonSchema)]
pub struct ApiCallArgs {
    /// Endpoint URL (e.g. 'https://api.example.com/v1/items').
    pub url: String,
    /// HTTP method: GET, POST, PUT, PATCH, DELETE, HEAD or OPTIONS.
    pub method: String,
    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// JSON body, sent for POST/PUT/PATCH/DELETE.
    #[serde(default)]
    pub body: Option<Value>,
    /// Query-string parameters, sent for GET/HEAD/OPTIONS.
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

/// Calls a REST endpoint and returns the decoded response.
///
/// The tool never builds its own HTTP client: the caller hands in a
/// `reqwest::Client` configured with whatever timeouts, proxies, or cookie
/// store the application needs.
pub struct ApiCallTool {
    client: reqwest::Client,
}

impl ApiCallTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Tool for ApiCallTool {
    fn description(&self) -> String {
        "Call a REST API endpoint and return the JSON (or text) response".into()
    }

    fn parameters_schema(&self) -> Value {
        crate::json_schema_for::<ApiCallArgs>()
    }

    fn validate_parameters(&self, params: &Value) -> Result<(), String> {
        let missing = missing_params(params, &["url", "method"]);
        if !missing.is_empty() {
            return Err(format!("missing required parameters: {}", missing.join(", ")));
        }
        let method = param_str(params, "method")
            .ok_or_else(|| "'method' must be a string".to_string())?
            .to_uppercase();
        if !VALID_METHODS.contains(&method.as_str()) {
            return Err(format!(
                "illegal HTTP method: {method}, allowed methods: {}",
                VALID_METHODS.join(", ")
            ));
        }
        Ok(())
    }

    fn execute(&self, params: &Value) -> ToolFuture<'_> {
        let params = params.clone();
        Box::pin(async move {
            let url = match param_str(&params, "url") {
                Some(u) if !u.is_empty() => u.to_string(),
                _ => return ToolCallResult::err("missing required parameter: url"),
            };
            let args: ApiCallArgs = match super::core::parse_params(&params) {
                Ok(a) => a,
                Err(failure) => return failure,
            };

            let method_name = args.method.to_uppercase();
            let method = match reqwest::Method::from_bytes(method_name.as_bytes()) {
                Ok(m) => m,
                Err(_) => return ToolCallResult::err(format!("illegal HTTP method: {method_name}")),
            };

            let mut target = match reqwest::Url::parse(&url) {
                Ok(u) => u,
                Err(e) => return ToolCallResult::err(format!("invalid url '{url}': {e}")),
            };
            let sends_body = BODY_METHODS.contains(&method_name.as_str());
            if !sends_body && !args.params.is_empty() {
                let mut pairs = target.query_pairs_mut();
                for (key, value) in query_pairs(&args.params) {
                    pairs.append_pair(&key, &value);
                }
            }

            let mut request = self.client.request(method, target);
            let overrides_agent = args
                .headers
                .keys()
                .any(|k| k.eq_ignore_ascii_case("user-agent"));
            if !overrides_agent {
                request = request.header(reqwest::header::USER_AGENT, DEFAULT_USER_AGENT);
            }
            for (key, value) in &args.headers {
                request = request.header(key.as_str(), value.as_str());
            }
            if sends_body && let Some(body) = &args.body {
                request = request.json(body);
            }

            debug!("api_call {method_name} {url}");
            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => return ToolCallResult::err(format!("request failed: {e}")),
            };

            let status = response.status();
            if !status.is_success() {
                return ToolCallResult::err(format!("request failed: HTTP {status}"));
            }

            match response.text().await {
                Ok(text) => ToolCallResult::ok(decode_body(&text)),
                Err(e) => ToolCallResult::err(format!("failed to read response: {e}")),
            }
        })
    }
}

/// Flatten query params to string pairs; strings are sent unquoted.
fn query_pairs(params: &BTreeMap<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

/// Decode a response body: JSON when possible, `{}` when empty, otherwise
/// `{"text": body}`.
fn decode_body(text: &str) -> Value {
    if text.is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::json!({ "text": text }))
}
