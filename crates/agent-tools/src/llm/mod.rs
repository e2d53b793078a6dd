//! Role routing for chat requests and the model backends behind it.
//!
//! [`LlmService`] owns a role map and a current role; every request it
//! forwards is prefixed with that role's system prompt and handed to an
//! [`LlmCaller`]. [`OpenRouterClient`] is the HTTP backend; [`FnCaller`]
//! wraps a closure.

pub mod openrouter;
pub mod roles;
pub mod service;

pub use openrouter::OpenRouterClient;
pub use roles::{DEFAULT_ROLE, RoleConfig, default_roles, load_roles, parse_roles};
pub use service::{ChatRequest, ChatResponse, FnCaller, LlmCall, LlmCaller, LlmFuture, LlmService};
