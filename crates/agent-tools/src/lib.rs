//! Building blocks for LLM-driven agent clients.
//!
//! `agent-tools` covers the glue an agent client needs around a chat model:
//! a name-keyed registry of asynchronous tools with a uniform result
//! envelope, a role-aware service that forwards chat requests to a
//! caller-supplied LLM backend, parsers that pull tool calls out of model
//! replies, and analyzers that decide whether a conversation needs another
//! turn.
//!
//! # Getting started
//!
//! ```ignore
//! use agent_tools::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let mut manager = ToolManager::new();
//!     manager.register_tool(
//!         "echo",
//!         FnTool::new(|params| async move { ToolCallResult::ok(params) }),
//!     );
//!
//!     let result = manager.execute_tool("echo", &json!({"x": 1})).await;
//!     assert!(result.success);
//!
//!     let key = std::env::var("OPENROUTER_KEY").map_err(|e| e.to_string())?;
//!     let client = OpenRouterClient::new(key)?;
//!     let roles = load_roles("roles.json".as_ref())?;
//!     let mut service = LlmService::new(client, roles);
//!     service.set_current_role("coder")?;
//!
//!     let reply = service
//!         .process_chat_request(&ChatRequest::from_user("List the files in src/"))
//!         .await?;
//!     let parsed = DefaultResponseParser.parse(&reply.raw_response);
//!     if let Some(calls) = parsed.tool_calls {
//!         for result in manager.execute_calls(&calls).await {
//!             println!("{}", result.to_json_string());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`tools`] | [`Tool`](tools::Tool) trait, [`ToolManager`](tools::ToolManager), [`ToolCallResult`](tools::ToolCallResult), built-in API-call and file tools |
//! | [`llm`] | [`LlmService`](llm::LlmService) role routing, [`LlmCaller`](llm::LlmCaller) backends, role files |
//! | [`parser`] | Extraction of reasoning text and tool calls from model replies |
//! | [`analysis`] | Task-completion analyzers and follow-up question generators |

pub mod analysis;
pub mod llm;
pub mod parser;
pub mod prelude;
pub mod tools;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Re-export schemars for downstream crates deriving tool parameter schemas.
pub use schemars;

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`.
///
/// # Example
///
/// ```
/// use agent_tools::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct ReadArgs {
///     path: String,
///     #[serde(default)]
///     encoding: Option<String>,
/// }
///
/// let schema = json_schema_for::<ReadArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"path".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// ── Tool definitions ───────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition in the OpenAI function-calling format.
///
/// Produced by [`ToolManager::definitions`](tools::ToolManager::definitions)
/// so registered tools can be advertised to a model.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    /// Create a function-calling tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

// ── Text helpers ───────────────────────────────────────────────────

/// Take at most `max_chars` characters from `s`, appending `...` when cut.
pub(crate) fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}
