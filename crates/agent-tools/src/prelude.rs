//! Convenience re-exports for common types.
//!
//! ```ignore
//! use agent_tools::prelude::*;
//! ```

pub use crate::analysis::{
    Exchange, FollowupGenerator, GeminiConfig, GeminiTaskAnalyzer, LlmFollowupGenerator,
    LlmTaskAnalyzer, RuleBasedAnalyzer, TaskAnalyzer, TaskStatus, TemplateFollowupGenerator,
    default_analyzer, default_generator,
};
pub use crate::llm::{
    ChatRequest, ChatResponse, FnCaller, LlmCall, LlmCaller, LlmService, OpenRouterClient,
    RoleConfig, load_roles,
};
pub use crate::parser::{
    ApiCallResponseParser, DefaultResponseParser, ParsedResponse, ParsedToolCall, ResponseParser,
};
pub use crate::tools::{
    ApiCallTool, FileOperationTool, FnTool, Tool, ToolCallResult, ToolFuture, ToolManager,
};
pub use crate::{Message, MessageRole, json_schema_for};
