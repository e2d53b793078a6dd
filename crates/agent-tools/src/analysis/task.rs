//! Rule-based and model-backed task analyzers.

use super::{
    AnalyzerFuture, Exchange, TaskAnalyzer, TaskStatus, contains_any, history_summary,
    original_request, status_keyword,
};
use crate::llm::{ChatRequest, LlmService};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

// ── Task kinds ─────────────────────────────────────────────────────

/// Broad category of a user request, detected from its wording.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Code,
    Explanation,
    Factual,
    Creative,
}

const CODE_KEYWORDS: &[&str] = &["代码", "编程", "程序", "函数", "脚本", "code", "programming"];
const EXPLANATION_KEYWORDS: &[&str] = &[
    "解释",
    "说明",
    "介绍",
    "描述",
    "explain",
    "describe",
    "introduction",
];
const FACTUAL_KEYWORDS: &[&str] = &[
    "什么是", "定义", "列出", "when", "where", "what", "who", "list",
];
const CREATIVE_KEYWORDS: &[&str] = &[
    "创意", "创作", "故事", "写一个", "想象", "creative", "story", "imagine",
];

impl TaskKind {
    /// Classify a request by keyword, checking code, explanation, factual,
    /// then creative. Unmatched requests count as explanations.
    pub fn detect(request: &str) -> Self {
        let request = request.to_lowercase();
        [
            (TaskKind::Code, CODE_KEYWORDS),
            (TaskKind::Explanation, EXPLANATION_KEYWORDS),
            (TaskKind::Factual, FACTUAL_KEYWORDS),
            (TaskKind::Creative, CREATIVE_KEYWORDS),
        ]
        .into_iter()
        .find(|(_, keywords)| contains_any(&request, keywords))
        .map_or(TaskKind::Explanation, |(kind, _)| kind)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Code => "code",
            TaskKind::Explanation => "explanation",
            TaskKind::Factual => "factual",
            TaskKind::Creative => "creative",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── RuleBasedAnalyzer ──────────────────────────────────────────────

/// Phrases that close out a finished answer.
pub const DEFAULT_COMPLETION_INDICATORS: &[&str] = &[
    "希望这对你有帮助",
    "希望这解答了你的问题",
    "如有其他问题",
    "这解决了你的问题吗",
    "有任何问题都可以继续提问",
    "如果还有其他需求",
    "祝你好运",
    "希望我的回答对你有所帮助",
    "就是这样",
    "总结一下",
    "总而言之",
    "hope this helps",
    "hope this answers your question",
    "if you have any other questions",
    "does this solve your problem",
    "good luck",
    "that's it",
    "to summarize",
    "in summary",
];

/// Phrases that ask the user for more input. A bare question mark counts.
pub const DEFAULT_NEEDS_INFO_INDICATORS: &[&str] = &[
    "你能提供更多信息吗",
    "我需要更多细节",
    "请告诉我更多关于",
    "你能澄清一下",
    "请问你想要",
    "你能具体说明",
    "需要你进一步说明",
    "请提供",
    "could you provide more",
    "i need more details",
    "please tell me more about",
    "could you clarify",
    "please provide",
    "?",
    "？",
];

/// Keyword heuristics over the latest reply.
///
/// Completion phrases win over needs-info phrases. A conversation of at
/// most one exchange always continues. Matching ignores ASCII case.
#[derive(Clone, Debug)]
pub struct RuleBasedAnalyzer {
    completion_indicators: Vec<String>,
    needs_info_indicators: Vec<String>,
}

impl Default for RuleBasedAnalyzer {
    fn default() -> Self {
        Self {
            completion_indicators: to_owned_lower(DEFAULT_COMPLETION_INDICATORS),
            needs_info_indicators: to_owned_lower(DEFAULT_NEEDS_INFO_INDICATORS),
        }
    }
}

fn to_owned_lower(phrases: &[&str]) -> Vec<String> {
    phrases.iter().map(|p| p.to_lowercase()).collect()
}

impl RuleBasedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the completion phrases.
    pub fn with_completion_indicators(mut self, phrases: &[&str]) -> Self {
        self.completion_indicators = to_owned_lower(phrases);
        self
    }

    /// Replace the needs-info phrases.
    pub fn with_needs_info_indicators(mut self, phrases: &[&str]) -> Self {
        self.needs_info_indicators = to_owned_lower(phrases);
        self
    }

    pub fn completion_indicators(&self) -> &[String] {
        &self.completion_indicators
    }

    pub fn needs_info_indicators(&self) -> &[String] {
        &self.needs_info_indicators
    }

    /// The synchronous verdict behind [`TaskAnalyzer::analyze`].
    pub fn classify(&self, history: &[Exchange], last_response: &str) -> TaskStatus {
        if history.len() <= 1 {
            return TaskStatus::Continue;
        }
        let reply = last_response.to_lowercase();
        if self.completion_indicators.iter().any(|p| reply.contains(p.as_str())) {
            TaskStatus::Completed
        } else if self.needs_info_indicators.iter().any(|p| reply.contains(p.as_str())) {
            TaskStatus::NeedsMoreInfo
        } else {
            TaskStatus::Continue
        }
    }
}

impl TaskAnalyzer for RuleBasedAnalyzer {
    fn analyze<'a>(&'a self, history: &'a [Exchange], last_response: &'a str) -> AnalyzerFuture<'a> {
        let status = self.classify(history, last_response);
        Box::pin(async move { status })
    }
}

/// The analyzer used when none is configured.
pub fn default_analyzer() -> RuleBasedAnalyzer {
    RuleBasedAnalyzer::default()
}

// ── LlmTaskAnalyzer ────────────────────────────────────────────────

const VERDICT_COMPLETED_HINTS: &[&str] = &["完成", "已完成", "已解决", "finished", "resolved"];
const VERDICT_NEEDS_INFO_HINTS: &[&str] = &[
    "需要更多",
    "需要用户",
    "需要提供",
    "need more",
    "needs more",
    "more information",
];

/// Asks a model, through an [`LlmService`], to judge the latest reply.
///
/// The service's current role is used as-is; give it a terse analyst role
/// for best results. Backend errors are logged and yield
/// [`TaskStatus::Continue`].
#[derive(Clone, Debug)]
pub struct LlmTaskAnalyzer {
    service: LlmService,
}

impl LlmTaskAnalyzer {
    pub fn new(service: LlmService) -> Self {
        Self { service }
    }

    pub fn build_prompt(history: &[Exchange], last_response: &str) -> String {
        format!(
            "As a conversation analyst, decide whether the AI reply below finished the \
             user's task or question.\n\n\
             Original request:\n{}\n\n\
             Conversation summary:\n{}\n\n\
             Latest AI reply:\n{}\n\n\
             Did the reply:\n\
             1. fully answer the question and complete the task,\n\
             2. ask for more information in order to continue, or\n\
             3. start answering without finishing?\n\n\
             Return exactly one of:\n\
             - COMPLETED: the task is done, no further turns needed\n\
             - NEEDS_MORE_INFO: the user must provide more information\n\
             - CONTINUE: the task is in progress and should continue",
            original_request(history),
            history_summary(history),
            last_response,
        )
    }

    /// Map a model verdict to a status: an exact keyword wins, then wording
    /// hints, then [`TaskStatus::Continue`].
    pub fn parse_verdict(verdict: &str) -> TaskStatus {
        if let Some(status) = status_keyword(verdict) {
            return status;
        }
        let lower = verdict.to_lowercase();
        if contains_any(&lower, VERDICT_COMPLETED_HINTS) {
            TaskStatus::Completed
        } else if contains_any(&lower, VERDICT_NEEDS_INFO_HINTS) {
            TaskStatus::NeedsMoreInfo
        } else {
            TaskStatus::Continue
        }
    }
}

impl TaskAnalyzer for LlmTaskAnalyzer {
    fn analyze<'a>(&'a self, history: &'a [Exchange], last_response: &'a str) -> AnalyzerFuture<'a> {
        Box::pin(async move {
            let prompt = Self::build_prompt(history, last_response);
            match self
                .service
                .process_chat_request(&ChatRequest::from_user(prompt))
                .await
            {
                Ok(reply) => {
                    let status = Self::parse_verdict(&reply.raw_response);
                    debug!("[analyzer] llm verdict {status}");
                    status
                }
                Err(e) => {
                    warn!("[analyzer] llm analysis failed, assuming CONTINUE: {e}");
                    TaskStatus::Continue
                }
            }
        })
    }
}
