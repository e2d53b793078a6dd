//! The [`Tool`] trait and closure-backed [`FnTool`].
//!
//! A tool receives its parameters as a JSON object and produces a
//! [`ToolCallResult`]. Tools are registered under a name in a
//! [`ToolManager`](super::ToolManager), which owns lookup and dispatch.

use super::result::ToolCallResult;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`Tool::execute`].
///
/// Type alias to keep trait signatures and implementations readable.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = ToolCallResult> + Send + 'a>>;

// ── Tool trait ─────────────────────────────────────────────────────

/// An asynchronous capability an agent can invoke by name.
///
/// Implementors provide [`Tool::execute`]; everything else has a default.
/// Errors are reported through [`ToolCallResult::err`] rather than panics.
/// A tool that may be called concurrently with itself must be safe to do so;
/// the manager does not serialize calls.
///
/// # Example
///
/// ```ignore
/// struct Clock;
///
/// impl Tool for Clock {
///     fn execute(&self, _params: &Value) -> ToolFuture<'_> {
///         Box::pin(async { ToolCallResult::ok(json!({"unix": now()})) })
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// Execute the tool with the given parameters object.
    ///
    /// Uses a boxed future so that the trait is dyn-compatible.
    fn execute(&self, params: &Value) -> ToolFuture<'_>;

    /// Check parameters before execution. The manager skips `execute` and
    /// reports `"invalid parameters: <reason>"` when this returns `Err`.
    fn validate_parameters(&self, _params: &Value) -> Result<(), String> {
        Ok(())
    }

    /// One-line description advertised to the model.
    fn description(&self) -> String {
        String::new()
    }

    /// JSON Schema for the parameters object.
    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {}})
    }
}

// ── FnTool ────────────────────────────────────────────────────────

/// Type-erased async handler for [`FnTool`].
type ErasedToolHandler =
    Box<dyn Fn(Value) -> Pin<Box<dyn Future<Output = ToolCallResult> + Send>> + Send + Sync>;

/// A closure-backed tool.
///
/// Use for stateless capabilities; tools that hold clients or configuration
/// read better as a struct implementing [`Tool`].
///
/// ```ignore
/// let echo = FnTool::new(|params| async move { ToolCallResult::ok(params) })
///     .with_description("Return the parameters unchanged");
/// manager.register_tool("echo", echo);
/// ```
pub struct FnTool {
    handler: ErasedToolHandler,
    description: String,
    schema: Option<Value>,
}

impl FnTool {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolCallResult> + Send + 'static,
    {
        let erased = move |params: Value| -> Pin<Box<dyn Future<Output = ToolCallResult> + Send>> {
            Box::pin(handler(params))
        };
        Self {
            handler: Box::new(erased),
            description: String::new(),
            schema: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

impl Tool for FnTool {
    fn execute(&self, params: &Value) -> ToolFuture<'_> {
        (self.handler)(params.clone())
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn parameters_schema(&self) -> Value {
        self.schema
            .clone()
            .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}}))
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("description", &self.description)
            .finish()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate params against a JSON Schema.
///
/// Returns `None` if valid (or if the schema itself cannot be compiled), or
/// `Some(reason)` listing every violation.
pub fn validate_against_schema(schema: &Value, params: &Value) -> Option<String> {
    let validator = match jsonschema::validator_for(schema) {
        Ok(v) => v,
        Err(_) => return None,
    };

    let errors: Vec<String> = validator
        .iter_errors(params)
        .map(|e| format!("{}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(errors.join("; "))
    }
}

/// Parse a params object into a typed struct.
///
/// Returns a ready-made failure envelope so `execute` can bail with `?`-like
/// brevity:
///
/// ```ignore
/// let args: MyArgs = match parse_params(params) {
///     Ok(a) => a,
///     Err(failure) => return failure,
/// };
/// ```
pub fn parse_params<T: serde::de::DeserializeOwned>(params: &Value) -> Result<T, ToolCallResult> {
    serde_json::from_value(params.clone())
        .map_err(|e| ToolCallResult::err(format!("invalid parameters: {e}")))
}

/// Extract a string value from a params object.
pub fn param_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

/// Names from `required` that are absent from `params`, in order.
pub fn missing_params<'a>(params: &Value, required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|key| params.get(*key).is_none())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn fn_tool_runs_handler() {
        let tool = FnTool::new(|params| async move { ToolCallResult::ok(params) });
        let result = tool.execute(&json!({"x": 1})).await;
        assert_eq!(result, ToolCallResult::ok(json!({"x": 1})));
    }

    #[test]
    fn fn_tool_defaults() {
        let tool = FnTool::new(|_| async { ToolCallResult::ok(Value::Null) });
        assert_eq!(tool.description(), "");
        assert_eq!(tool.parameters_schema()["type"], "object");
        assert!(tool.validate_parameters(&json!({})).is_ok());
    }

    #[test]
    fn fn_tool_builder_overrides() {
        let tool = FnTool::new(|_| async { ToolCallResult::ok(Value::Null) })
            .with_description("noop")
            .with_schema(json!({"type": "object", "required": ["a"]}));
        assert_eq!(tool.description(), "noop");
        assert_eq!(tool.parameters_schema()["required"][0], "a");
    }

    #[test]
    fn schema_validation_reports_violations() {
        let schema = json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        });
        assert!(validate_against_schema(&schema, &json!({"text": "hi"})).is_none());
        let err = validate_against_schema(&schema, &json!({})).unwrap();
        assert!(err.contains("text"));
    }

    #[test]
    fn param_helpers() {
        let params = json!({"url": "https://example.com", "n": 3});
        assert_eq!(param_str(&params, "url"), Some("https://example.com"));
        assert_eq!(param_str(&params, "n"), None);
        assert_eq!(missing_params(&params, &["url", "method"]), vec!["method"]);
    }

    #[test]
    fn parse_params_failure_is_an_envelope() {
        #[derive(serde::Deserialize, Debug)]
        struct Args {
            #[allow(dead_code)]
            path: String,
        }
        let failure = parse_params::<Args>(&json!({})).unwrap_err();
        assert!(!failure.success);
        assert!(failure.error.unwrap().starts_with("invalid parameters"));
    }
}
