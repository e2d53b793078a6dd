//! Deciding whether a conversation needs another turn, and what to say next.
//!
//! An analyzer looks at the history and the latest reply and returns a
//! [`TaskStatus`]. A follow-up generator turns a non-final status into the
//! next message to send.
//!
//! ```ignore
//! let status = default_analyzer().analyze(&history, &reply).await;
//! if let Some(next) = default_generator().generate(status, &history, &reply).await {
//!     service.process_chat_request(&ChatRequest::from_user(next)).await?;
//! }
//! ```

pub mod followup;
pub mod gemini;
pub mod task;

pub use followup::{
    ContextType, FollowupFuture, FollowupGenerator, LlmFollowupGenerator,
    TemplateFollowupGenerator, default_generator,
};
pub use gemini::{GeminiConfig, GeminiTaskAnalyzer};
pub use task::{LlmTaskAnalyzer, RuleBasedAnalyzer, TaskKind, default_analyzer};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

/// Where a task stands after the latest reply.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Fully answered; no further turns needed.
    Completed,
    /// The model is waiting on information from the user.
    NeedsMoreInfo,
    /// Started but unfinished; the model should keep going.
    Continue,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [
        TaskStatus::Completed,
        TaskStatus::NeedsMoreInfo,
        TaskStatus::Continue,
    ];

    /// Wire name, e.g. `NEEDS_MORE_INFO`.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::NeedsMoreInfo => "NEEDS_MORE_INFO",
            TaskStatus::Continue => "CONTINUE",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown task status: {s}"))
    }
}

/// One question/answer turn of a conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

impl Exchange {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Boxed future returned by [`TaskAnalyzer::analyze`].
pub type AnalyzerFuture<'a> = Pin<Box<dyn Future<Output = TaskStatus> + Send + 'a>>;

/// Classifies the latest reply of a conversation.
///
/// Analysis never fails: backends that cannot reach a verdict fall back to
/// [`TaskStatus::Continue`].
pub trait TaskAnalyzer: Send + Sync {
    fn analyze<'a>(&'a self, history: &'a [Exchange], last_response: &'a str) -> AnalyzerFuture<'a>;
}

// ── Prompt helpers ─────────────────────────────────────────────────

/// Answers longer than this are cut in history summaries.
pub(crate) const SUMMARY_ANSWER_CHARS: usize = 100;

/// The first question of the conversation, or `"None"`.
pub(crate) fn original_request(history: &[Exchange]) -> &str {
    history.first().map_or("None", |e| e.question.as_str())
}

/// Render exchanges as `User: ...\nAI: ...` pairs with answers cut short.
pub(crate) fn summarize_exchanges(exchanges: &[Exchange]) -> String {
    exchanges
        .iter()
        .map(|e| {
            format!(
                "User: {}\nAI: {}",
                e.question,
                crate::preview(&e.answer, SUMMARY_ANSWER_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summary of every exchange before the latest one.
pub(crate) fn history_summary(history: &[Exchange]) -> String {
    match history.split_last() {
        Some((_, earlier)) if !earlier.is_empty() => summarize_exchanges(earlier),
        _ => "No previous conversation".to_string(),
    }
}

/// Find a status keyword in a model verdict, checked in [`TaskStatus::ALL`]
/// order.
pub(crate) fn status_keyword(reply: &str) -> Option<TaskStatus> {
    TaskStatus::ALL
        .into_iter()
        .find(|status| reply.contains(status.as_str()))
}

pub(crate) fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names() {
        assert_eq!(TaskStatus::NeedsMoreInfo.to_string(), "NEEDS_MORE_INFO");
        assert_eq!(
            serde_json::to_value(TaskStatus::Completed).unwrap(),
            "COMPLETED"
        );
        assert_eq!(
            serde_json::from_str::<TaskStatus>("\"CONTINUE\"").unwrap(),
            TaskStatus::Continue
        );
    }

    #[test]
    fn status_from_str() {
        assert_eq!("completed".parse::<TaskStatus>(), Ok(TaskStatus::Completed));
        assert_eq!(
            " NEEDS_MORE_INFO\n".parse::<TaskStatus>(),
            Ok(TaskStatus::NeedsMoreInfo)
        );
        assert!("DONE".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn summary_skips_latest_and_cuts_answers() {
        let long = "x".repeat(150);
        let history = vec![
            Exchange::new("q1", long.as_str()),
            Exchange::new("q2", "a2"),
        ];
        let summary = history_summary(&history);
        assert!(summary.starts_with("User: q1\nAI: "));
        assert!(summary.ends_with("..."));
        assert!(!summary.contains("q2"));

        assert_eq!(
            history_summary(&history[..1]),
            "No previous conversation"
        );
        assert_eq!(original_request(&[]), "None");
    }

    #[test]
    fn keyword_lookup() {
        assert_eq!(
            status_keyword("Verdict: NEEDS_MORE_INFO"),
            Some(TaskStatus::NeedsMoreInfo)
        );
        assert_eq!(status_keyword("no idea"), None);
    }
}
