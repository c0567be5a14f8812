//! # Arcana
//!
//! Retrieval-augmented question answering over a fixed esoteric reference
//! corpus.
//!
//! Arcana embeds the corpus into a vector index, retrieves relevant passages
//! for a user question with a hybrid ranking algorithm (diversity search plus
//! exact keyword boosting), and asks a language model to answer grounded in
//! those passages. A session layer adds tiered conversational memory with
//! automatic summarization and an agentic loop in which the model can invoke
//! retrieval tools iteratively before producing a final answer.
//!
//! ## Features
//!
//! - Hybrid retrieval: MMR-style diversity search re-ranked by exact
//!   keyword-match boosting, with an exact-match-first mode for proper-noun
//!   queries
//! - Tiered conversational memory (verbatim short-term, summarized long-term)
//!   with token-budgeted prompt assembly
//! - Bounded multi-turn tool-calling loop with forced termination
//! - OpenAI-compatible chat-completion clients (LM Studio, `OpenAI`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use arcana::{ArcanaConfig, QueryOptions, Session};
//!
//! let mut session = Session::new(config, index, llm)?.with_corpus(corpus);
//! let response = session.query("Что такое Перун?", &QueryOptions::default())?;
//! println!("{}", response.answer);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod agent;
pub mod cli;
pub mod config;
pub mod llm;
pub mod memory;
pub mod models;
pub mod observability;
pub mod prompt;
pub mod retrieval;
pub mod session;
pub mod store;

// Re-exports for convenience
pub use config::{AgentConfig, ArcanaConfig, LlmConfig, MemoryConfig, RetrievalConfig};
pub use llm::ChatCompletion;
pub use memory::{ConversationMemory, Tokenizer};
pub use models::{
    AgentOutcome, AgenticResponse, Document, MemoryStats, MemoryTurn, QueryOptions, QueryResponse,
    RankingMode, ScoredDocument, ToolCallRecord,
};
pub use retrieval::{HybridRanker, KeywordExtractor, KeywordMode};
pub use session::Session;
pub use store::{RawCorpus, VectorSearch};

/// Error type for arcana operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty question, malformed tool arguments, bad config values |
/// | `Retrieval` | The vector-store collaborator is unreachable or erroring |
/// | `Completion` | The chat-completion collaborator is unreachable or erroring |
/// | `UnknownTool` | The model requests a tool name outside the registered set |
/// | `NotReady` | An operation is invoked before the session is initialized |
/// | `OperationFailed` | I/O errors, config parsing, response parsing |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The vector-store collaborator failed.
    ///
    /// An infrastructure failure, distinct from a legitimate zero-match
    /// result. Never recovered locally.
    #[error("retrieval failed during '{operation}': {cause}")]
    Retrieval {
        /// The retrieval operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The chat-completion collaborator failed.
    #[error("completion failed via '{provider}': {cause}")]
    Completion {
        /// The provider that failed.
        provider: String,
        /// The underlying cause.
        cause: String,
    },

    /// The model requested a tool that is not registered.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// An operation was invoked before initialization.
    #[error("not ready: {0}")]
    NotReady(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for arcana operations.
pub type Result<T> = std::result::Result<T, Error>;
