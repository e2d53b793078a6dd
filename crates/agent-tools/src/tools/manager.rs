//! Name-keyed tool registry and dispatcher.

use super::core::{Tool, validate_against_schema};
use super::result::ToolCallResult;
use crate::ToolDef;
use crate::parser::ParsedToolCall;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// A registry of tools that can be dispatched by name.
///
/// Registration takes `&mut self` and is meant for setup; dispatch takes
/// `&self`, so a populated manager can be shared behind an `Arc` and used
/// from many tasks at once. The manager imposes no ordering between calls
/// and never serializes calls to the same tool.
///
/// # Example
///
/// ```ignore
/// let manager = ToolManager::new()
///     .with("api_call", ApiCallTool::new(reqwest::Client::new()))
///     .with("file_operation", FileOperationTool::new("/srv/work"))
///     .with_if(debug, "echo", FnTool::new(|p| async move { ToolCallResult::ok(p) }));
///
/// let result = manager.execute_tool("api_call", &params).await;
/// ```
pub struct ToolManager {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Whether to validate params against each tool's JSON Schema.
    validate_args: bool,
    /// Per-call timeout. `None` disables timeouts.
    default_timeout: Option<Duration>,
    /// Run batches one call at a time, in order.
    sequential: bool,
}

impl fmt::Debug for ToolManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolManager")
            .field("tools", &self.names())
            .field("validate_args", &self.validate_args)
            .field("default_timeout", &self.default_timeout)
            .field("sequential", &self.sequential)
            .finish()
    }
}

impl ToolManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            validate_args: false,
            default_timeout: None,
            sequential: false,
        }
    }

    /// Enable JSON Schema validation of params before execution.
    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    /// Set a per-call timeout. Pass `None` to disable timeouts.
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Make [`execute_calls`](Self::execute_calls) wait for each call before
    /// starting the next, so later calls see earlier calls' side effects.
    pub fn with_sequential(mut self, sequential: bool) -> Self {
        self.sequential = sequential;
        self
    }

    /// Bind `name` to `tool`. Replaces any existing binding for `name`.
    pub fn register_tool(&mut self, name: impl Into<String>, tool: impl Tool + 'static) {
        let name = name.into();
        if self.tools.insert(name.clone(), Arc::new(tool)).is_some() {
            debug!("Tool '{name}' re-registered, previous binding replaced");
        } else {
            debug!("Tool '{name}' registered");
        }
    }

    /// Register a tool (builder pattern).
    pub fn with(mut self, name: impl Into<String>, tool: impl Tool + 'static) -> Self {
        self.register_tool(name, tool);
        self
    }

    /// Conditionally register a tool (builder pattern).
    pub fn with_if(self, condition: bool, name: impl Into<String>, tool: impl Tool + 'static) -> Self {
        if condition { self.with(name, tool) } else { self }
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the manager is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Whether a tool is bound to `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Function-calling definitions for every registered tool, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.names()
            .into_iter()
            .filter_map(|name| {
                let tool = self.tools.get(&name)?;
                Some(ToolDef::new(
                    name,
                    tool.description(),
                    tool.parameters_schema(),
                ))
            })
            .collect()
    }

    /// A system-prompt section listing the registered tools and the reply
    /// format understood by the response parsers.
    pub fn tool_instructions(&self) -> String {
        let mut out = String::from("Available tools:\n");
        for def in self.definitions() {
            let schema = serde_json::to_string(&def.function.parameters).unwrap_or_default();
            if def.function.description.is_empty() {
                out.push_str(&format!("- {}: parameters {schema}\n", def.function.name));
            } else {
                out.push_str(&format!(
                    "- {}: {} parameters {schema}\n",
                    def.function.name, def.function.description
                ));
            }
        }
        out.push_str(
            "\nTo call tools, explain your reasoning, then end your reply with a fenced \
             block of this form:\n```json\n{\"tool_calls\": [{\"tool_name\": \"<name>\", \
             \"parameters\": {}}]}\n```\n",
        );
        out
    }

    /// Execute the tool bound to `name` with `params`.
    ///
    /// Unknown names yield `success = false, error = "unknown tool: <name>"`.
    /// Parameter validation failures yield `"invalid parameters: ..."` with
    /// the offending params in `details`. Otherwise the tool's own result is
    /// returned unchanged.
    pub async fn execute_tool(&self, name: &str, params: &Value) -> ToolCallResult {
        let tool = match self.tools.get(name) {
            Some(t) => Arc::clone(t),
            None => {
                info!("[tool] unknown tool '{name}'");
                return ToolCallResult::err(format!("unknown tool: {name}"));
            }
        };

        let validation = if self.validate_args {
            match validate_against_schema(&tool.parameters_schema(), params) {
                Some(reason) => Err(reason),
                None => tool.validate_parameters(params),
            }
        } else {
            tool.validate_parameters(params)
        };
        if let Err(reason) = validation {
            info!("[tool] {name} rejected parameters: {reason}");
            return ToolCallResult::err(format!("invalid parameters: {reason}")).with_details(
                serde_json::json!({
                    "tool": name,
                    "invalid_params": params,
                }),
            );
        }

        log_tool_call(name, params);
        let start = Instant::now();

        let result = match self.default_timeout {
            Some(limit) => match tokio::time::timeout(limit, tool.execute(params)).await {
                Ok(r) => r,
                Err(_) => {
                    info!(
                        "Tool {name} timed out after {:.1}s (limit: {:.0}s)",
                        start.elapsed().as_secs_f64(),
                        limit.as_secs_f64(),
                    );
                    ToolCallResult::err(format!(
                        "tool '{name}' timed out after {:.0}s",
                        limit.as_secs_f64()
                    ))
                }
            },
            None => tool.execute(params).await,
        };

        debug!(
            "Tool {name} completed in {:.0}ms (success={})",
            start.elapsed().as_secs_f64() * 1000.0,
            result.success
        );
        trace!(
            "Tool {name} result preview: {}",
            crate::preview(&result.to_json_string(), 300)
        );

        result
    }

    /// Execute a batch of parsed tool calls.
    ///
    /// Calls run concurrently unless the manager was built with
    /// [`with_sequential(true)`](Self::with_sequential). Either way, results
    /// are returned in the same order as `calls`.
    pub async fn execute_calls(&self, calls: &[ParsedToolCall]) -> Vec<ToolCallResult> {
        if self.sequential {
            return self.execute_calls_sequential(calls).await;
        }
        let futures = calls
            .iter()
            .map(|call| self.execute_tool(&call.tool_name, &call.parameters));
        futures::future::join_all(futures).await
    }

    /// Execute a batch one call at a time, in order.
    pub async fn execute_calls_sequential(&self, calls: &[ParsedToolCall]) -> Vec<ToolCallResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute_tool(&call.tool_name, &call.parameters).await);
        }
        results
    }
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Log a tool call at INFO level with a truncated preview of params.
fn log_tool_call(name: &str, params: &Value) {
    let rendered = params.to_string();
    info!("[tool] {name}({})", crate::preview(&rendered, 120));
    trace!("[tool] {name} params: {rendered}");
}
