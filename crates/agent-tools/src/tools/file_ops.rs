//! Create, read, and patch text files under a working directory.

use super::core::{Tool, ToolFuture, param_str, parse_params};
use super::result::ToolCallResult;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Operation performed by [`FileOperationTool`].
#[derive(Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    Create,
    Read,
    Modify,
}

/// Typed parameters for `file_operation`.
#[derive(Deserialize, JsonSchema)]
pub struct FileOperationArgs {
    /// One of 'create', 'read', 'modify'.
    pub operation: FileOperation,
    /// File path relative to the working directory (e.g. 'notes/todo.md').
    pub path: String,
    /// Full file content (required for 'create').
    #[serde(default)]
    pub content: Option<String>,
    /// Exact text to replace (required for 'modify').
    #[serde(default)]
    pub original_snippet: Option<String>,
    /// Replacement text (required for 'modify').
    #[serde(default)]
    pub new_snippet: Option<String>,
}

/// File create/read/modify rooted at a working directory.
///
/// Paths containing `..` components or absolute paths are rejected. `modify`
/// replaces only the first occurrence of `original_snippet`.
pub struct FileOperationTool {
    workdir: PathBuf,
}

impl FileOperationTool {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(format!("path '{path}' must stay inside the working directory"));
        }
        Ok(self.workdir.join(relative))
    }
}

impl Tool for FileOperationTool {
    fn description(&self) -> String {
        "Create, read, or modify a text file in the working directory".into()
    }

    fn parameters_schema(&self) -> Value {
        crate::json_schema_for::<FileOperationArgs>()
    }

    fn validate_parameters(&self, params: &Value) -> Result<(), String> {
        let operation = param_str(params, "operation");
        if !matches!(operation, Some("create" | "read" | "modify")) {
            return Err("'operation' must be one of 'create', 'read', 'modify'".into());
        }
        if param_str(params, "path").is_none() {
            return Err("a string 'path' parameter is required".into());
        }
        match operation {
            Some("create") if param_str(params, "content").is_none() => {
                Err("'create' requires a string 'content' parameter".into())
            }
            Some("modify") => {
                for key in ["original_snippet", "new_snippet"] {
                    if param_str(params, key).is_none() {
                        return Err(format!("'modify' requires a string '{key}' parameter"));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn execute(&self, params: &Value) -> ToolFuture<'_> {
        let params = params.clone();
        Box::pin(async move {
            let args: FileOperationArgs = match parse_params(&params) {
                Ok(a) => a,
                Err(failure) => return failure,
            };
            let full_path = match self.resolve(&args.path) {
                Ok(p) => p,
                Err(e) => return ToolCallResult::err(e),
            };
            debug!("file_operation {:?} {}", args.operation, full_path.display());

            match args.operation {
                FileOperation::Create => create_file(&full_path, args.content).await,
                FileOperation::Read => read_file(&full_path, &args.path).await,
                FileOperation::Modify => {
                    modify_file(&full_path, args.original_snippet, args.new_snippet).await
                }
            }
        })
    }
}

async fn create_file(path: &Path, content: Option<String>) -> ToolCallResult {
    let Some(content) = content else {
        return ToolCallResult::err("missing required parameter: content");
    };
    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent).await
    {
        return ToolCallResult::err(format!("create failed: {e}"));
    }
    match fs::write(path, content).await {
        Ok(()) => ToolCallResult::ok(json!({ "path": path.display().to_string() })),
        Err(e) => ToolCallResult::err(format!("create failed: {e}")),
    }
}

async fn read_file(path: &Path, requested: &str) -> ToolCallResult {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => {
            return ToolCallResult::err(format!("'{requested}' is a directory, not a file"));
        }
        Ok(_) => {}
        Err(_) => return ToolCallResult::err(format!("file not found: {requested}")),
    }
    match fs::read_to_string(path).await {
        Ok(content) => ToolCallResult::ok(json!({ "content": content })),
        Err(e) => ToolCallResult::err(format!("read failed: {e}")),
    }
}

async fn modify_file(
    path: &Path,
    original: Option<String>,
    replacement: Option<String>,
) -> ToolCallResult {
    let (Some(original), Some(replacement)) = (original, replacement) else {
        return ToolCallResult::err("missing required parameters: original_snippet, new_snippet");
    };
    let current = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) => return ToolCallResult::err(format!("modify failed: {e}")),
    };
    if !current.contains(&original) {
        return ToolCallResult::err("original snippet not found").with_details(json!({
            "expected": original,
            "actual": current,
        }));
    }
    let updated = current.replacen(&original, &replacement, 1);
    match fs::write(path, updated).await {
        Ok(()) => ToolCallResult::ok(json!({ "path": path.display().to_string() })),
        Err(e) => ToolCallResult::err(format!("modify failed: {e}")),
    }
}
