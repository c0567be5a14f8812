//! Response types returned by session operations.

use super::{Document, MemoryStats};
use serde::{Deserialize, Serialize};

/// Tuning knobs for a single `query` call.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Maximum tokens for the generated answer.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Summarize short-term memory before answering, regardless of size.
    pub force_summarize: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            temperature: 0.7,
            force_summarize: false,
        }
    }
}

/// Result of a single retrieval-augmented query.
///
/// Always well-formed: a completion failure is reported through `answer`
/// with the retrieved sources still attached, so the caller can inspect
/// what would have been used.
#[derive(Debug, Clone)]
pub struct QueryResponse {
    /// The generated answer, or a user-visible error description.
    pub answer: String,
    /// Documents the answer was grounded in, ranked.
    pub source_documents: Vec<Document>,
    /// The concatenated context block that was offered to the model.
    pub context: String,
    /// Memory state after the call.
    pub memory_stats: MemoryStats,
}

/// One tool invocation made during an agentic turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// The tool that was dispatched.
    pub tool_name: String,
    /// Arguments as the model supplied them.
    pub arguments: serde_json::Value,
    /// The tool's result payload (an error payload if dispatch failed).
    pub result: serde_json::Value,
}

/// Terminal state of an agentic turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentOutcome {
    /// The model produced a final text answer.
    Answered,
    /// The iteration budget ran out before a final answer.
    BudgetExceeded,
    /// The completion collaborator failed mid-loop.
    CompletionFailed,
}

/// Result of an agentic question.
#[derive(Debug, Clone)]
pub struct AgenticResponse {
    /// The final answer (or a user-visible failure description).
    pub answer: String,
    /// How the turn terminated.
    pub outcome: AgentOutcome,
    /// Every tool invocation made during the turn, in order.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Iterations consumed.
    pub iterations: usize,
    /// Memory state after the call.
    pub memory_stats: MemoryStats,
}
