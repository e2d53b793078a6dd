//! Role configurations and the JSON role file.
//!
//! A role file maps role names to their settings:
//!
//! ```json
//! {
//!   "default": { "system_prompt": "You are a helpful assistant." },
//!   "coder": {
//!     "system_prompt": "You write Rust.",
//!     "model": "anthropic/claude-sonnet-4",
//!     "temperature": 0.2,
//!     "max_tokens": 8192
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

/// Name of the role an [`LlmService`](super::LlmService) starts with.
pub const DEFAULT_ROLE: &str = "default";

/// Settings selected by a role name.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RoleConfig {
    /// System prompt sent ahead of every request under this role.
    pub system_prompt: String,
    /// Model override; callers fall back to their own default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Any other keys from the role file, passed through to the caller.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RoleConfig {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A role map holding only a generic `"default"` role.
pub fn default_roles() -> HashMap<String, RoleConfig> {
    HashMap::from([(
        DEFAULT_ROLE.to_string(),
        RoleConfig::new("You are a helpful assistant."),
    )])
}

/// Parse a role map from JSON text.
pub fn parse_roles(json: &str) -> Result<HashMap<String, RoleConfig>, String> {
    serde_json::from_str(json).map_err(|e| format!("invalid roles JSON: {e}"))
}

/// Load a role map from a JSON file.
pub fn load_roles(path: &Path) -> Result<HashMap<String, RoleConfig>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read roles file '{}': {e}", path.display()))?;
    parse_roles(&text).map_err(|e| format!("{}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_unknown_keys() {
        let roles = parse_roles(
            r#"{
                "default": {"system_prompt": "Be brief."},
                "coder": {"system_prompt": "Write code.", "model": "m", "temperature": 0.1, "top_p": 0.9}
            }"#,
        )
        .unwrap();

        assert_eq!(roles["default"], RoleConfig::new("Be brief."));
        let coder = &roles["coder"];
        assert_eq!(coder.model.as_deref(), Some("m"));
        assert_eq!(coder.temperature, Some(0.1));
        assert_eq!(coder.extra["top_p"], 0.9);
    }

    #[test]
    fn parse_rejects_missing_system_prompt() {
        let err = parse_roles(r#"{"default": {"model": "m"}}"#).unwrap_err();
        assert!(err.contains("system_prompt"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roles.json");
        std::fs::write(&path, r#"{"default": {"system_prompt": "hi"}}"#).unwrap();

        let roles = load_roles(&path).unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[DEFAULT_ROLE].system_prompt, "hi");
    }

    #[test]
    fn load_missing_file_names_path() {
        let err = load_roles(Path::new("/nonexistent/roles.json")).unwrap_err();
        assert!(err.starts_with("failed to read roles file '/nonexistent/roles.json'"));
    }

    #[test]
    fn default_roles_has_default() {
        assert!(default_roles().contains_key(DEFAULT_ROLE));
    }
}
