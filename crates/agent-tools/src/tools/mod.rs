//! Tool registry, the [`Tool`] trait, and the built-in tools.
//!
//! | Tool | Registered as | Purpose |
//! |------|---------------|---------|
//! | [`ApiCallTool`] | `api_call` | REST calls through a shared `reqwest::Client` |
//! | [`FileOperationTool`] | `file_operation` | Create, read, and patch files under a workdir |

pub mod api_call;
pub mod core;
pub mod file_ops;
pub mod manager;
pub mod result;

pub use api_call::{ApiCallArgs, ApiCallTool};
pub use core::{
    FnTool, Tool, ToolFuture, missing_params, param_str, parse_params, validate_against_schema,
};
pub use file_ops::{FileOperation, FileOperationArgs, FileOperationTool};
pub use manager::ToolManager;
pub use result::ToolCallResult;
