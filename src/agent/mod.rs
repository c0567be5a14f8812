//! Bounded agentic search loop.
//!
//! The model is given three search tools and iterates: request tools,
//! receive results, request more or answer. Two budgets bound the loop:
//! past `force_stop_threshold` iterations tool calls are forbidden and the
//! model must answer from what it has; past `max_iterations` the loop
//! terminates with a budget-exceeded answer. Tool failures never abort the
//! loop; they are fed back to the model as error payloads.

mod tools;

pub use tools::{
    ExpandArgs, GrepArgs, SemanticArgs, ToolKind, expand_query, grep_search, tool_specs,
    topic_hint,
};

use crate::Result;
use crate::config::AgentConfig;
use crate::llm::{
    ChatCompletion, ChatMessage, CompletionRequest, ToolCallRequest, ToolChoice,
};
use crate::models::{AgentOutcome, ToolCallRecord};
use crate::retrieval::HybridRanker;
use crate::store::{RawCorpus, VectorSearch};
use serde_json::{Value, json};

const AGENT_SYSTEM: &str = "Ты — исследователь базы знаний по космоэнергетике. \
У тебя есть инструменты поиска по книгам. Сначала собери информацию \
инструментами, затем дай развёрнутый ответ на русском языке. Отвечай только \
на основе найденного, не выдумывай.";

const BUDGET_ANSWER: &str = "Не удалось сформулировать ответ за отведённое число \
шагов. Попробуйте переформулировать вопрос.";

/// Semantic-search payloads clip document content to this many characters.
const SOURCE_CLIP: usize = 500;

/// Upper bound on sources a single tool call may request.
const MAX_SOURCES: usize = 50;

/// Terminal state of one agent run, before memory is updated.
#[derive(Debug)]
pub struct AgentRun {
    /// Final answer text (or a user-visible failure description).
    pub answer: String,
    /// How the run terminated.
    pub outcome: AgentOutcome,
    /// Tool invocations in dispatch order.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Iterations consumed.
    pub iterations: usize,
}

/// Drives the tool loop against a completion provider.
pub struct SearchAgent<'a> {
    llm: &'a dyn ChatCompletion,
    ranker: &'a HybridRanker,
    index: &'a dyn VectorSearch,
    corpus: Option<&'a dyn RawCorpus>,
    config: &'a AgentConfig,
}

impl<'a> SearchAgent<'a> {
    /// Wires the agent to its collaborators.
    #[must_use]
    pub fn new(
        llm: &'a dyn ChatCompletion,
        ranker: &'a HybridRanker,
        index: &'a dyn VectorSearch,
        corpus: Option<&'a dyn RawCorpus>,
        config: &'a AgentConfig,
    ) -> Self {
        Self {
            llm,
            ranker,
            index,
            corpus,
            config,
        }
    }

    /// Runs the loop for one question.
    ///
    /// Never returns `Err` for provider or tool failures; those become
    /// terminal outcomes so the caller always has an answer to show.
    #[must_use]
    pub fn run(&self, question: &str) -> AgentRun {
        let mut messages = vec![
            ChatMessage::system(AGENT_SYSTEM),
            ChatMessage::user(question.to_string()),
        ];
        let mut records: Vec<ToolCallRecord> = Vec::new();
        let specs = tool_specs();

        for iteration in 1..=self.config.max_iterations {
            if iteration >= self.config.force_stop_threshold {
                tracing::warn!(iteration, tools = records.len(), "forcing final answer");
                messages.push(ChatMessage::system(format!(
                    "ВНИМАНИЕ! Это шаг {iteration} из {}. У тебя уже есть результаты \
                     {} вызовов инструментов. НЕМЕДЛЕННО дай финальный ответ на основе \
                     имеющейся информации. НЕ вызывай больше инструментов!",
                    self.config.max_iterations,
                    records.len(),
                )));
            }
            let tool_choice = if iteration >= self.config.force_stop_threshold {
                ToolChoice::None
            } else {
                ToolChoice::Auto
            };

            let request = CompletionRequest {
                messages: messages.clone(),
                tools: specs.clone(),
                tool_choice,
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
            };

            let response = match self.llm.complete(&request) {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(iteration, error = %e, "completion failed mid-loop");
                    return AgentRun {
                        answer: format!("Ошибка при обращении к языковой модели: {e}"),
                        outcome: AgentOutcome::CompletionFailed,
                        tool_calls: records,
                        iterations: iteration,
                    };
                },
            };

            if response.wants_tools() {
                let calls = response.tool_calls.clone();
                messages.push(ChatMessage::assistant(response.content, calls.clone()));
                for call in &calls {
                    let (record, payload) = self.dispatch(call);
                    tracing::info!(
                        iteration,
                        tool = %record.tool_name,
                        "tool dispatched"
                    );
                    messages.push(ChatMessage::tool_result(
                        call.id.clone(),
                        payload.to_string(),
                    ));
                    records.push(record);
                }
                continue;
            }

            if let Some(answer) = response.content {
                tracing::info!(iteration, tools = records.len(), "agent answered");
                return AgentRun {
                    answer,
                    outcome: AgentOutcome::Answered,
                    tool_calls: records,
                    iterations: iteration,
                };
            }
            // Neither text nor tool calls; let the next iteration retry.
            tracing::warn!(iteration, "empty completion, retrying");
        }

        AgentRun {
            answer: BUDGET_ANSWER.to_string(),
            outcome: AgentOutcome::BudgetExceeded,
            tool_calls: records,
            iterations: self.config.max_iterations,
        }
    }

    /// Dispatches one tool call; failures become error payloads.
    fn dispatch(&self, call: &ToolCallRequest) -> (ToolCallRecord, Value) {
        let arguments: Value =
            serde_json::from_str(&call.arguments).unwrap_or_else(|_| json!({}));

        let payload = match self.execute(call) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "tool failed");
                json!({ "error": e.to_string() })
            },
        };

        let record = ToolCallRecord {
            tool_name: call.name.clone(),
            arguments,
            result: payload.clone(),
        };
        (record, payload)
    }

    fn execute(&self, call: &ToolCallRequest) -> Result<Value> {
        match ToolKind::parse(&call.name)? {
            ToolKind::GrepSearch => {
                let args: GrepArgs = parse_args(&call.arguments)?;
                let corpus = self.corpus.ok_or_else(|| {
                    crate::Error::OperationFailed {
                        operation: "grep_search".to_string(),
                        cause: "текстовый корпус недоступен".to_string(),
                    }
                })?;
                grep_search(corpus, &args)
            },
            ToolKind::SemanticSearch => {
                let args: SemanticArgs = parse_args(&call.arguments)?;
                let k = args.num_sources.clamp(1, MAX_SOURCES);
                let scored = self.ranker.rank_scored(self.index, &args.query, k)?;
                // Relevance is judged on the full texts, before clipping.
                let contents: Vec<String> = scored
                    .iter()
                    .map(|s| s.document.content.clone())
                    .collect();
                let sources: Vec<Value> = scored
                    .iter()
                    .map(|s| {
                        json!({
                            "content": crate::memory::truncate_chars(
                                &s.document.content,
                                SOURCE_CLIP
                            ),
                            "score": s.score,
                            "keyword_matches": s.keyword_matches,
                        })
                    })
                    .collect();
                let count = sources.len();
                let mut payload = json!({ "sources": sources, "count": count });
                if let Some(hint) = topic_hint(&args.query, &contents) {
                    payload["hint"] = json!(hint);
                }
                Ok(payload)
            },
            ToolKind::ExpandQuery => {
                let args: ExpandArgs = parse_args(&call.arguments)?;
                Ok(json!({ "variants": expand_query(&args.term) }))
            },
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| crate::Error::InvalidInput(format!(
        "некорректные аргументы инструмента: {e}"
    )))
}

#[cfg(test)]
mod agent_tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::llm::CompletionResponse;
    use crate::models::Document;
    use std::sync::Mutex;

    struct ScriptedLlm {
        responses: Mutex<Vec<CompletionResponse>>,
        requests: Mutex<Vec<(usize, ToolChoice)>>,
    }

    impl ScriptedLlm {
        fn new(mut responses: Vec<CompletionResponse>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn tool_choices(&self) -> Vec<ToolChoice> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|(_, tc)| *tc)
                .collect()
        }

        fn system_counts(&self) -> Vec<usize> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|(count, _)| *count)
                .collect()
        }
    }

    impl ChatCompletion for ScriptedLlm {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
            let systems = request
                .messages
                .iter()
                .filter(|m| m.role == "system")
                .count();
            self.requests
                .lock()
                .unwrap()
                .push((systems, request.tool_choice));
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| crate::Error::Completion {
                    provider: "scripted".to_string(),
                    cause: "script exhausted".to_string(),
                })
        }
    }

    struct TinyIndex;

    impl VectorSearch for TinyIndex {
        fn diversity_search(
            &self,
            _query: &str,
            k: usize,
            _fetch_k: usize,
            _lambda: f64,
        ) -> Result<Vec<Document>> {
            Ok((0..k.min(3))
                .map(|i| Document::new(format!("фрагмент {i} про Фираст")))
                .collect())
        }

        fn contains_search(&self, _keyword: &str, limit: usize) -> Result<Vec<Document>> {
            Ok((0..limit.min(2))
                .map(|i| Document::new(format!("точный фрагмент {i}")))
                .collect())
        }
    }

    struct TinyCorpus;

    impl RawCorpus for TinyCorpus {
        fn lines(&self) -> Result<Vec<String>> {
            Ok(vec!["Канал Фираст открывается на макушке.".to_string()])
        }
    }

    fn ranker() -> HybridRanker {
        HybridRanker::new(RetrievalConfig::default()).unwrap()
    }

    fn tool_call(name: &str, arguments: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    fn text(content: &str) -> CompletionResponse {
        CompletionResponse {
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
        }
    }

    fn tools_only(calls: Vec<ToolCallRequest>) -> CompletionResponse {
        CompletionResponse {
            content: None,
            tool_calls: calls,
        }
    }

    #[test]
    fn test_answer_after_tool_round() {
        let llm = ScriptedLlm::new(vec![
            tools_only(vec![tool_call("grep_search", r#"{"query":"Фираст"}"#)]),
            text("Фираст — частота защиты."),
        ]);
        let ranker = ranker();
        let config = AgentConfig::default();
        let agent = SearchAgent::new(&llm, &ranker, &TinyIndex, Some(&TinyCorpus), &config);

        let run = agent.run("Что такое Фираст?");
        assert_eq!(run.outcome, AgentOutcome::Answered);
        assert_eq!(run.answer, "Фираст — частота защиты.");
        assert_eq!(run.iterations, 2);
        assert_eq!(run.tool_calls.len(), 1);
        assert_eq!(run.tool_calls[0].tool_name, "grep_search");
        assert_eq!(run.tool_calls[0].result["count"], 1);
    }

    #[test]
    fn test_unknown_tool_feeds_error_and_continues() {
        let llm = ScriptedLlm::new(vec![
            tools_only(vec![tool_call("wipe_disk", "{}")]),
            text("ответ"),
        ]);
        let ranker = ranker();
        let config = AgentConfig::default();
        let agent = SearchAgent::new(&llm, &ranker, &TinyIndex, Some(&TinyCorpus), &config);

        let run = agent.run("вопрос");
        assert_eq!(run.outcome, AgentOutcome::Answered);
        assert!(run.tool_calls[0].result["error"]
            .as_str()
            .unwrap()
            .contains("wipe_disk"));
    }

    #[test]
    fn test_grep_without_corpus_is_error_payload() {
        let llm = ScriptedLlm::new(vec![
            tools_only(vec![tool_call("grep_search", r#"{"query":"Фираст"}"#)]),
            text("ответ"),
        ]);
        let ranker = ranker();
        let config = AgentConfig::default();
        let agent = SearchAgent::new(&llm, &ranker, &TinyIndex, None, &config);

        let run = agent.run("вопрос");
        assert_eq!(run.outcome, AgentOutcome::Answered);
        assert!(run.tool_calls[0].result.get("error").is_some());
    }

    #[test]
    fn test_semantic_search_payload_carries_scores() {
        let llm = ScriptedLlm::new(vec![
            tools_only(vec![tool_call(
                "rag_semantic_search",
                r#"{"query":"Фираст","num_sources":3}"#,
            )]),
            text("ответ"),
        ]);
        let ranker = ranker();
        let config = AgentConfig::default();
        let agent = SearchAgent::new(&llm, &ranker, &TinyIndex, None, &config);

        let run = agent.run("вопрос");
        let result = &run.tool_calls[0].result;
        assert!(result["count"].as_u64().unwrap() > 0);
        assert!(result["sources"][0].get("score").is_some());
    }

    #[test]
    fn test_budget_exceeded_with_relentless_tool_caller() {
        let always_tools: Vec<CompletionResponse> = (0..20)
            .map(|_| tools_only(vec![tool_call("expand_query", r#"{"term":"Мектабу"}"#)]))
            .collect();
        let llm = ScriptedLlm::new(always_tools);
        let ranker = ranker();
        let config = AgentConfig {
            max_iterations: 6,
            force_stop_threshold: 4,
            ..AgentConfig::default()
        };
        let agent = SearchAgent::new(&llm, &ranker, &TinyIndex, None, &config);

        let run = agent.run("вопрос");
        assert_eq!(run.outcome, AgentOutcome::BudgetExceeded);
        assert_eq!(run.iterations, 6);

        // From the threshold on, tool calls must be forbidden.
        let choices = llm.tool_choices();
        assert_eq!(choices.len(), 6);
        assert_eq!(choices[2], ToolChoice::Auto);
        assert_eq!(choices[3], ToolChoice::None);
        assert_eq!(choices[5], ToolChoice::None);

        // The forced-answer message lands on the threshold iteration and
        // every one after it, on top of the opening system prompt.
        assert_eq!(llm.system_counts(), vec![1, 1, 1, 2, 3, 4]);
    }

    #[test]
    fn test_force_message_fires_even_with_tiny_threshold() {
        let llm = ScriptedLlm::new(vec![
            tools_only(vec![tool_call("expand_query", r#"{"term":"Мектабу"}"#)]),
            text("ответ из собранного"),
        ]);
        let ranker = ranker();
        let config = AgentConfig {
            max_iterations: 4,
            force_stop_threshold: 2,
            ..AgentConfig::default()
        };
        let agent = SearchAgent::new(&llm, &ranker, &TinyIndex, None, &config);

        let run = agent.run("вопрос");
        assert_eq!(run.outcome, AgentOutcome::Answered);
        assert_eq!(llm.tool_choices(), vec![ToolChoice::Auto, ToolChoice::None]);
        assert_eq!(llm.system_counts(), vec![1, 2]);
    }

    #[test]
    fn test_completion_failure_is_terminal() {
        let llm = ScriptedLlm::new(Vec::new());
        let ranker = ranker();
        let config = AgentConfig::default();
        let agent = SearchAgent::new(&llm, &ranker, &TinyIndex, None, &config);

        let run = agent.run("вопрос");
        assert_eq!(run.outcome, AgentOutcome::CompletionFailed);
        assert_eq!(run.iterations, 1);
        assert!(run.answer.contains("Ошибка"));
    }

    #[test]
    fn test_malformed_arguments_become_error_payload() {
        let llm = ScriptedLlm::new(vec![
            tools_only(vec![tool_call("expand_query", "{not json")]),
            text("ответ"),
        ]);
        let ranker = ranker();
        let config = AgentConfig::default();
        let agent = SearchAgent::new(&llm, &ranker, &TinyIndex, None, &config);

        let run = agent.run("вопрос");
        assert!(run.tool_calls[0].result.get("error").is_some());
    }
}
