//! Role-aware forwarding of chat requests to an [`LlmCaller`].

use super::roles::{DEFAULT_ROLE, RoleConfig};
use crate::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info};

/// Boxed future returned by [`LlmCaller::call`].
pub type LlmFuture<'a> = Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;

/// Everything a backend needs for one model call.
///
/// The system prompt is delivered twice: as the first entry of `messages`
/// and in `system_prompt`, so backends that take it separately need not
/// dig it out of the list.
#[derive(Clone, Debug, PartialEq)]
pub struct LlmCall {
    /// Content of the last message.
    pub prompt: String,
    pub system_prompt: String,
    pub messages: Vec<Message>,
    /// Always `false` from [`LlmService`].
    pub stream: bool,
    /// The full role configuration the call was made under.
    pub role: RoleConfig,
}

/// A model backend. Returns the model's raw text reply.
pub trait LlmCaller: Send + Sync {
    fn call(&self, call: LlmCall) -> LlmFuture<'_>;
}

type ErasedCaller = Box<dyn Fn(LlmCall) -> LlmFuture<'static> + Send + Sync>;

/// A closure-backed [`LlmCaller`], mostly for tests and thin adapters.
///
/// ```ignore
/// let caller = FnCaller::new(|call| async move { Ok(format!("echo: {}", call.prompt)) });
/// ```
pub struct FnCaller {
    handler: ErasedCaller,
}

impl FnCaller {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(LlmCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, String>> + Send + 'static,
    {
        let erased = move |call: LlmCall| -> LlmFuture<'static> { Box::pin(handler(call)) };
        Self {
            handler: Box::new(erased),
        }
    }
}

impl LlmCaller for FnCaller {
    fn call(&self, call: LlmCall) -> LlmFuture<'_> {
        (self.handler)(call)
    }
}

impl fmt::Debug for FnCaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCaller").finish_non_exhaustive()
    }
}

// ── Requests ───────────────────────────────────────────────────────

/// Messages to forward under the current role.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// A request holding one user message.
    pub fn from_user(content: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(content)],
        }
    }
}

/// The caller's reply, unparsed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatResponse {
    pub raw_response: String,
}

// ── LlmService ─────────────────────────────────────────────────────

/// Forwards chat requests to a backend under the current role's settings.
///
/// The service is cheap to clone: the backend is shared and the role map is
/// copied. Parsing and tool execution are left to the caller.
#[derive(Clone)]
pub struct LlmService {
    caller: Arc<dyn LlmCaller>,
    roles: HashMap<String, RoleConfig>,
    current_role: String,
}

impl fmt::Debug for LlmService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut roles: Vec<&String> = self.roles.keys().collect();
        roles.sort();
        f.debug_struct("LlmService")
            .field("roles", &roles)
            .field("current_role", &self.current_role)
            .finish_non_exhaustive()
    }
}

impl LlmService {
    /// The current role starts as `"default"`. It need not exist in `roles`
    /// yet, but requests fail until it does or another role is selected.
    pub fn new(caller: impl LlmCaller + 'static, roles: HashMap<String, RoleConfig>) -> Self {
        Self::from_shared(Arc::new(caller), roles)
    }

    /// Like [`new`](Self::new), sharing an existing backend.
    pub fn from_shared(caller: Arc<dyn LlmCaller>, roles: HashMap<String, RoleConfig>) -> Self {
        Self {
            caller,
            roles,
            current_role: DEFAULT_ROLE.to_string(),
        }
    }

    pub fn current_role(&self) -> &str {
        &self.current_role
    }

    pub fn roles(&self) -> &HashMap<String, RoleConfig> {
        &self.roles
    }

    /// Switch roles. Unknown names are rejected and leave the current role
    /// unchanged.
    pub fn set_current_role(&mut self, name: impl Into<String>) -> Result<(), String> {
        let name = name.into();
        if !self.roles.contains_key(&name) {
            return Err(format!("unknown role: {name}"));
        }
        debug!("LLM role switched: {} -> {name}", self.current_role);
        self.current_role = name;
        Ok(())
    }

    /// Send `request` under the current role and return the raw reply.
    ///
    /// The outgoing list is the role's system prompt followed by each
    /// request message as a `user` message. Backend errors are returned
    /// unchanged; nothing is retried.
    pub async fn process_chat_request(&self, request: &ChatRequest) -> Result<ChatResponse, String> {
        let role = self
            .roles
            .get(&self.current_role)
            .ok_or_else(|| format!("unknown role: {}", self.current_role))?;

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(Message::system(role.system_prompt.clone()));
        messages.extend(
            request
                .messages
                .iter()
                .map(|m| Message::user(m.content.clone())),
        );
        let prompt = messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        info!(
            "[llm] role={} messages={} prompt={}",
            self.current_role,
            messages.len(),
            crate::preview(&prompt, 80)
        );

        let raw_response = self
            .caller
            .call(LlmCall {
                prompt,
                system_prompt: role.system_prompt.clone(),
                messages,
                stream: false,
                role: role.clone(),
            })
            .await?;

        debug!("[llm] reply: {} chars", raw_response.chars().count());
        Ok(ChatResponse { raw_response })
    }
}
