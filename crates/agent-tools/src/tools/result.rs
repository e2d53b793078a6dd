//! The uniform success/failure envelope returned by every tool call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a single tool invocation.
///
/// Tools never raise: failures (including "unknown tool" and parameter
/// validation errors raised by the [`ToolManager`](super::ToolManager)) are
/// reported through `success = false` and a human-readable `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Whether the call succeeded.
    pub success: bool,
    /// Payload on success; `null` on failure.
    pub result: Value,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Structured failure context (offending params, expected vs. actual).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ToolCallResult {
    /// A successful result carrying `result`.
    pub fn ok(result: impl Into<Value>) -> Self {
        Self {
            success: true,
            result: result.into(),
            error: None,
            details: None,
        }
    }

    /// A failed result with the given error message.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: Value::Null,
            error: Some(error.into()),
            details: None,
        }
    }

    /// Attach structured details (builder pattern).
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Compact JSON rendering, suitable for feeding back to a model.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"success":false,"result":null,"error":"unserializable result: {e}"}}"#)
        })
    }
}
