//! Tiered conversational memory with automatic summarization.
//!
//! Recent turns are held verbatim in short-term memory; once the short-term
//! tier fills up, older turns are folded into an abstractive summary held in
//! long-term memory. Folding is intentionally lossy: once summarized, the
//! verbatim text is unrecoverable.

use crate::config::MemoryConfig;
use crate::llm::ChatCompletion;
use crate::models::{MemoryStats, MemoryTurn};
use chrono::{DateTime, Utc};

/// System prompt for the summarization call.
const SUMMARIZER_SYSTEM: &str = "Ты суммаризируешь диалоги кратко и точно.";

/// Answers are clipped to this many characters in the summarization
/// transcript to bound the summarization-prompt size.
const SUMMARY_ANSWER_CLIP: usize = 300;

/// Turns always held back verbatim when summarizing.
const HELD_BACK_TURNS: usize = 2;

/// Optional tokenizer collaborator; only the encoded length is used.
pub trait Tokenizer: Send + Sync {
    /// Encodes text into token ids.
    fn encode(&self, text: &str) -> Vec<u32>;
}

/// Session-scoped conversational memory.
///
/// Owned by exactly one session; concurrent sessions must each own their
/// own instance.
pub struct ConversationMemory {
    short_term: Vec<MemoryTurn>,
    long_term: Vec<String>,
    session_start: DateTime<Utc>,
    config: MemoryConfig,
    tokenizer: Option<Box<dyn Tokenizer>>,
    last_tokens_used: Option<usize>,
}

impl ConversationMemory {
    /// Creates empty memory for a new session.
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            short_term: Vec::new(),
            long_term: Vec::new(),
            session_start: Utc::now(),
            config,
            tokenizer: None,
            last_tokens_used: None,
        }
    }

    /// Attaches a tokenizer collaborator for exact token counting.
    #[must_use]
    pub fn with_tokenizer(mut self, tokenizer: Box<dyn Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// The memory configuration.
    #[must_use]
    pub const fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Verbatim turns, oldest first.
    #[must_use]
    pub fn short_term(&self) -> &[MemoryTurn] {
        &self.short_term
    }

    /// Summaries, chronological.
    #[must_use]
    pub fn long_term(&self) -> &[String] {
        &self.long_term
    }

    /// Counts tokens in a text.
    ///
    /// Delegates to the tokenizer when attached; otherwise approximates
    /// with a chars/4 heuristic calibrated for the corpus's dominant
    /// script. The fallback never fails.
    #[must_use]
    pub fn count_tokens(&self, text: &str) -> usize {
        self.tokenizer.as_ref().map_or_else(
            || text.chars().count() / 4,
            |tokenizer| tokenizer.encode(text).len(),
        )
    }

    /// Appends a completed turn to short-term memory.
    pub fn append_turn(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.short_term.push(MemoryTurn::new(question, answer));
    }

    /// Whether the short-term tier has reached its configured capacity.
    #[must_use]
    pub fn should_summarize(&self) -> bool {
        self.config.auto_summarize && self.short_term.len() >= self.config.max_short_memory
    }

    /// Folds all but the most recent turns into a long-term summary.
    ///
    /// Returns the new summary, or `None` when there is nothing worth
    /// folding (fewer than 3 turns) or the summarization call failed.
    /// Summarization is best-effort: failures are logged and memory is
    /// left unchanged.
    pub fn summarize(&mut self, llm: &dyn ChatCompletion) -> Option<String> {
        if self.short_term.len() < HELD_BACK_TURNS + 1 {
            return None;
        }

        let fold_count = self.short_term.len() - HELD_BACK_TURNS;
        let mut dialogue = String::new();
        for turn in &self.short_term[..fold_count] {
            dialogue.push_str(&format!(
                "Q: {}\nA: {}...\n\n",
                turn.question,
                truncate_chars(&turn.answer, SUMMARY_ANSWER_CLIP)
            ));
        }

        let prompt = format!(
            "Сделай краткое резюме следующего диалога (2-3 предложения):\n\n{dialogue}\nКраткое резюме основных тем и выводов:"
        );

        match llm.complete_text(SUMMARIZER_SYSTEM, &prompt, 0.3, 200) {
            Ok(summary) => {
                self.long_term.push(summary.clone());
                self.short_term.drain(..fold_count);
                tracing::info!(
                    folded = fold_count,
                    summaries = self.long_term.len(),
                    "summarized short-term memory"
                );
                Some(summary)
            },
            Err(e) => {
                tracing::warn!(error = %e, "summarization failed, memory unchanged");
                None
            },
        }
    }

    /// Clears short-term memory; clears summaries too unless kept.
    pub fn clear(&mut self, keep_summaries: bool) {
        self.short_term.clear();
        if !keep_summaries {
            self.long_term.clear();
        }
    }

    /// Records the measured token count of the latest assembled prompt.
    pub fn note_tokens_used(&mut self, tokens: usize) {
        self.last_tokens_used = Some(tokens);
    }

    /// Snapshot of memory state.
    #[must_use]
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            session_duration_secs: (Utc::now() - self.session_start).num_seconds(),
            short_count: self.short_term.len(),
            long_count: self.long_term.len(),
            auto_summarize: self.config.auto_summarize,
            max_context_tokens: self.config.max_context_tokens,
            summarize_threshold: self.config.summarize_threshold,
            tokens_used: self.last_tokens_used,
        }
    }

    /// Serializes the conversation: summaries first, then verbatim turns.
    #[must_use]
    pub fn export(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Сессия начата: {}\n", self.session_start.to_rfc3339()));
        out.push_str(&format!("{}\n\n", "=".repeat(70)));

        if !self.long_term.is_empty() {
            out.push_str("СУММАРИЗИРОВАННАЯ ИСТОРИЯ:\n");
            out.push_str(&format!("{}\n", "-".repeat(70)));
            for (i, summary) in self.long_term.iter().enumerate() {
                out.push_str(&format!("{}. {summary}\n\n", i + 1));
            }
            out.push('\n');
        }

        if !self.short_term.is_empty() {
            out.push_str("ПОСЛЕДНИЕ СООБЩЕНИЯ:\n");
            out.push_str(&format!("{}\n", "-".repeat(70)));
            for turn in &self.short_term {
                out.push_str(&format!("\n[{}]\n", turn.timestamp));
                out.push_str(&format!("Вопрос: {}\n", turn.question));
                out.push_str(&format!("Ответ: {}\n", turn.answer));
                out.push_str(&format!("{}\n", "-".repeat(70)));
            }
        }

        out
    }
}

/// Clips a string to at most `max` characters on a char boundary.
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
