//! Follow-up messages that keep an unfinished task moving.

use super::{Exchange, TaskStatus, original_request, summarize_exchanges};
use crate::llm::{ChatRequest, LlmService};
use regex::Regex;
use std::future::Future;
use std::pin::Pin;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Boxed future returned by [`FollowupGenerator::generate`].
pub type FollowupFuture<'a> = Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;

/// Produces the next message for a conversation in a given state.
///
/// Implementations return `None` for [`TaskStatus::Completed`].
pub trait FollowupGenerator: Send + Sync {
    fn generate<'a>(
        &'a self,
        status: TaskStatus,
        history: &'a [Exchange],
        last_response: &'a str,
    ) -> FollowupFuture<'a>;
}

/// What an unfinished reply was in the middle of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextType {
    Code,
    Explanation,
    Comparison,
    Example,
    Implementation,
}

const CONTEXT_KEYWORDS: &[(ContextType, &[&str])] = &[
    (ContextType::Code, &["```", "代码", "function", "class"]),
    (ContextType::Explanation, &["解释", "说明", "首先", "first,"]),
    (
        ContextType::Comparison,
        &["比较", "优点", "缺点", "区别", "pros", "cons", "compared"],
    ),
    (
        ContextType::Example,
        &["例如", "示例", "案例", "for example", "e.g."],
    ),
    (
        ContextType::Implementation,
        &["实现", "步骤", "流程", "step", "steps", "implementation"],
    ),
];

/// Case-insensitive matcher per context. English keywords only match whole
/// words; CJK keywords and punctuation match anywhere.
static CONTEXT_MATCHERS: LazyLock<Vec<(ContextType, Regex)>> = LazyLock::new(|| {
    CONTEXT_KEYWORDS
        .iter()
        .filter_map(|(context, words)| {
            let alternation = words
                .iter()
                .map(|w| keyword_pattern(w))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!("(?i){alternation}"))
                .ok()
                .map(|re| (*context, re))
        })
        .collect()
});

fn keyword_pattern(word: &str) -> String {
    let edge = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    let mut pattern = String::new();
    if edge(word.chars().next()) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(word));
    if edge(word.chars().last()) {
        pattern.push_str(r"\b");
    }
    pattern
}

impl ContextType {
    /// Detect the context from reply wording, checked in declaration order.
    pub fn detect(response: &str) -> Option<Self> {
        CONTEXT_MATCHERS
            .iter()
            .find(|(_, re)| re.is_match(response))
            .map(|(context, _)| *context)
    }

    /// The default follow-up for this context.
    pub fn template(self) -> &'static str {
        match self {
            ContextType::Code => {
                "Please continue with the remaining code and make sure the full solution is explained."
            }
            ContextType::Explanation => {
                "Please continue your explanation and cover every point you mentioned."
            }
            ContextType::Comparison => {
                "Please continue comparing the pros and cons of these options."
            }
            ContextType::Example => "Please continue with concrete usage examples.",
            ContextType::Implementation => {
                "Please continue describing the implementation details and steps."
            }
        }
    }
}

/// Follow-up when no context applies, by status.
fn status_template(status: TaskStatus) -> Option<&'static str> {
    match status {
        TaskStatus::Completed => None,
        TaskStatus::NeedsMoreInfo => Some(
            "I need more information about your question. Please share more details so I can help.",
        ),
        TaskStatus::Continue => Some("Please continue where you left off."),
    }
}

// ── TemplateFollowupGenerator ──────────────────────────────────────

/// Canned follow-ups chosen by status and reply context.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateFollowupGenerator;

impl TemplateFollowupGenerator {
    /// The synchronous choice behind [`FollowupGenerator::generate`].
    pub fn followup(&self, status: TaskStatus, last_response: &str) -> Option<String> {
        if status == TaskStatus::Continue
            && let Some(context) = ContextType::detect(last_response)
        {
            return Some(context.template().to_string());
        }
        status_template(status).map(str::to_string)
    }
}

impl FollowupGenerator for TemplateFollowupGenerator {
    fn generate<'a>(
        &'a self,
        status: TaskStatus,
        _history: &'a [Exchange],
        last_response: &'a str,
    ) -> FollowupFuture<'a> {
        let followup = self.followup(status, last_response);
        Box::pin(async move { followup })
    }
}

/// The generator used when none is configured.
pub fn default_generator() -> TemplateFollowupGenerator {
    TemplateFollowupGenerator
}

// ── LlmFollowupGenerator ───────────────────────────────────────────

/// Asks a model, through an [`LlmService`], to write the follow-up.
///
/// Falls back to [`TemplateFollowupGenerator`] when the backend fails.
#[derive(Clone, Debug)]
pub struct LlmFollowupGenerator {
    service: LlmService,
    fallback: TemplateFollowupGenerator,
}

impl LlmFollowupGenerator {
    pub fn new(service: LlmService) -> Self {
        Self {
            service,
            fallback: TemplateFollowupGenerator,
        }
    }

    pub fn build_prompt(status: TaskStatus, history: &[Exchange], last_response: &str) -> String {
        let recent = if history.len() >= 2 {
            summarize_exchanges(&history[history.len() - 2..])
        } else {
            String::new()
        };
        let situation = match status {
            TaskStatus::NeedsMoreInfo => "The AI needs more information from the user to finish the task.",
            TaskStatus::Continue => "The AI has started answering but has not finished the task.",
            TaskStatus::Completed => "",
        };
        format!(
            "As a conversation assistant, write one short follow-up message for the AI reply \
             below so the user's task can be completed.\n\n\
             Original request:\n{}\n\n\
             Recent conversation:\n{recent}\n\n\
             Latest AI reply:\n{last_response}\n\n\
             Current status: {status}\n\
             Situation: {situation}\n\n\
             Keep it natural and under 30 words; it will be sent to the AI automatically.\n\
             For NEEDS_MORE_INFO, ask the user for the missing information.\n\
             For CONTINUE, ask the AI to finish the unfinished task.\n\
             Reply with the message text only.",
            original_request(history),
        )
    }
}

impl FollowupGenerator for LlmFollowupGenerator {
    fn generate<'a>(
        &'a self,
        status: TaskStatus,
        history: &'a [Exchange],
        last_response: &'a str,
    ) -> FollowupFuture<'a> {
        Box::pin(async move {
            if status == TaskStatus::Completed {
                return None;
            }
            let prompt = Self::build_prompt(status, history, last_response);
            match self
                .service
                .process_chat_request(&ChatRequest::from_user(prompt))
                .await
            {
                Ok(reply) => {
                    let followup = reply.raw_response.trim().to_string();
                    debug!("[followup] {}", crate::preview(&followup, 80));
                    Some(followup)
                }
                Err(e) => {
                    warn!("[followup] llm generation failed, using template: {e}");
                    self.fallback.followup(status, last_response)
                }
            }
        })
    }
}
