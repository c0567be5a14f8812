//! Session facade tying retrieval, memory, prompting and the agent together.
//!
//! A session owns its memory and collaborators; nothing is shared between
//! sessions. Completion failures are reported inside the response so the
//! retrieved sources survive the failure; retrieval failures are real
//! errors, there is nothing useful to return without sources.

use crate::agent::SearchAgent;
use crate::config::ArcanaConfig;
use crate::llm::{ChatCompletion, ChatMessage, CompletionRequest, ToolChoice};
use crate::memory::ConversationMemory;
use crate::models::{
    AgenticResponse, Document, MemoryStats, QueryOptions, QueryResponse,
};
use crate::prompt::PromptAssembler;
use crate::retrieval::HybridRanker;
use crate::store::{RawCorpus, VectorSearch};
use crate::{Error, Result};

/// One user-facing conversation.
pub struct Session {
    config: ArcanaConfig,
    ranker: HybridRanker,
    index: Box<dyn VectorSearch>,
    llm: Box<dyn ChatCompletion>,
    corpus: Option<Box<dyn RawCorpus>>,
    memory: ConversationMemory,
}

impl Session {
    /// Creates a session over the given index and completion provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the retrieval configuration is
    /// unusable.
    pub fn new(
        config: ArcanaConfig,
        index: Box<dyn VectorSearch>,
        llm: Box<dyn ChatCompletion>,
    ) -> Result<Self> {
        let ranker = HybridRanker::new(config.retrieval.clone())?;
        let memory = ConversationMemory::new(config.memory.clone());
        Ok(Self {
            config,
            ranker,
            index,
            llm,
            corpus: None,
            memory,
        })
    }

    /// Attaches a raw corpus, enabling `grep_search` in agentic mode.
    #[must_use]
    pub fn with_corpus(mut self, corpus: Box<dyn RawCorpus>) -> Self {
        self.corpus = Some(corpus);
        self
    }

    /// The session configuration.
    #[must_use]
    pub const fn config(&self) -> &ArcanaConfig {
        &self.config
    }

    /// Ranks the corpus for a query, without touching memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Retrieval`] if the index fails.
    pub fn rank(&self, query: &str) -> Result<Vec<Document>> {
        self.ranker
            .rank(self.index.as_ref(), query, self.config.retrieval.top_k)
    }

    /// Answers a question with retrieval-augmented completion.
    ///
    /// Memory may be summarized before the call (when full or forced) and
    /// again when the assembled prompt crosses the summarize threshold.
    /// Only successful answers are committed to memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Retrieval`] if the index fails. Completion failures
    /// are reported through the response, not as errors.
    pub fn query(&mut self, question: &str, options: &QueryOptions) -> Result<QueryResponse> {
        if options.force_summarize || self.memory.should_summarize() {
            self.memory.summarize(self.llm.as_ref());
        }

        let documents = self.rank(question)?;
        let context = documents
            .iter()
            .map(|d| d.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let assembler = PromptAssembler::new(self.config.memory.max_context_tokens);
        let (mut prompt, mut tokens) = self.assemble(&assembler, &context, question);

        // A bloated prompt means history has grown; fold and rebuild once.
        if tokens >= self.config.memory.summarize_threshold
            && self.memory.summarize(self.llm.as_ref()).is_some()
        {
            (prompt, tokens) = self.assemble(&assembler, &context, question);
        }
        self.memory.note_tokens_used(tokens);

        let answer = match self.complete_plain(&prompt, options) {
            Ok(answer) => {
                self.memory.append_turn(question, answer.clone());
                answer
            },
            Err(e) => {
                tracing::error!(error = %e, "completion failed, returning sources only");
                format!(
                    "Не удалось получить ответ от модели: {e}. Проверьте, что сервис \
                     модели запущен. Найденные источники приложены."
                )
            },
        };

        Ok(QueryResponse {
            answer,
            source_documents: documents,
            context,
            memory_stats: self.memory.stats(),
        })
    }

    /// Answers a question through the agentic tool loop.
    ///
    /// Only a successful final answer is committed to memory; intermediate
    /// tool traffic never is.
    pub fn ask_agentic(&mut self, question: &str) -> AgenticResponse {
        let agent = SearchAgent::new(
            self.llm.as_ref(),
            &self.ranker,
            self.index.as_ref(),
            self.corpus.as_deref(),
            &self.config.agent,
        );
        let run = agent.run(question);

        if run.outcome == crate::models::AgentOutcome::Answered {
            self.memory.append_turn(question, run.answer.clone());
        }

        AgenticResponse {
            answer: run.answer,
            outcome: run.outcome,
            tool_calls: run.tool_calls,
            iterations: run.iterations,
            memory_stats: self.memory.stats(),
        }
    }

    /// Summarizes short-term memory now, regardless of size.
    ///
    /// Returns the new summary if one was produced.
    pub fn summarize_now(&mut self) -> Option<String> {
        self.memory.summarize(self.llm.as_ref())
    }

    /// Clears conversation memory.
    pub fn clear_memory(&mut self, keep_summaries: bool) {
        self.memory.clear(keep_summaries);
    }

    /// Memory state snapshot.
    #[must_use]
    pub fn memory_stats(&self) -> MemoryStats {
        self.memory.stats()
    }

    /// Serializes the conversation for export.
    #[must_use]
    pub fn export_conversation(&self) -> String {
        self.memory.export()
    }

    fn assemble(
        &self,
        assembler: &PromptAssembler,
        context: &str,
        question: &str,
    ) -> (String, usize) {
        assembler.assemble(&self.memory, context, question)
    }

    fn complete_plain(&self, prompt: &str, options: &QueryOptions) -> Result<String> {
        let request = CompletionRequest {
            messages: vec![ChatMessage::user(prompt.to_string())],
            tools: Vec::new(),
            tool_choice: ToolChoice::Auto,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };
        let response = self.llm.complete(&request)?;
        response.content.ok_or_else(|| Error::Completion {
            provider: self.llm.name().to_string(),
            cause: "response carried no text content".to_string(),
        })
    }
}
