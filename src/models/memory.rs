//! Conversational memory types.

use serde::{Deserialize, Serialize};

/// One completed question/answer exchange.
///
/// Never mutated after creation; deleted only when folded into a summary or
/// when memory is cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryTurn {
    /// The user question.
    pub question: String,
    /// The final answer committed to memory.
    pub answer: String,
    /// ISO-8601 creation timestamp.
    pub timestamp: String,
}

impl MemoryTurn {
    /// Creates a turn stamped with the current UTC time.
    #[must_use]
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Snapshot of memory state, surfaced to the caller after each answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Session duration in seconds.
    pub session_duration_secs: i64,
    /// Verbatim turns currently held.
    pub short_count: usize,
    /// Summaries currently held.
    pub long_count: usize,
    /// Whether automatic summarization is enabled.
    pub auto_summarize: bool,
    /// Configured context token budget.
    pub max_context_tokens: usize,
    /// Configured summarization threshold in tokens.
    pub summarize_threshold: usize,
    /// Measured token count of the most recent assembled prompt, if any.
    pub tokens_used: Option<usize>,
}
