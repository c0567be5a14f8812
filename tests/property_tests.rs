//! Property-based tests for the retrieval and memory invariants.

use arcana::config::{AgentConfig, MemoryConfig, RetrievalConfig};
use arcana::llm::{ChatCompletion, CompletionRequest, CompletionResponse, ToolCallRequest};
use arcana::memory::ConversationMemory;
use arcana::models::{AgentOutcome, Document};
use arcana::prompt::PromptAssembler;
use arcana::retrieval::{HybridRanker, KeywordExtractor, KeywordMode};
use arcana::store::VectorSearch;
use proptest::prelude::*;

const PROMPT_SAFETY_MARGIN: usize = 500;

fn cyrillic_word() -> impl Strategy<Value = String> {
    proptest::collection::vec(proptest::char::range('а', 'я'), 1..12)
        .prop_map(|chars| chars.into_iter().collect())
}

fn cyrillic_text(max_words: usize) -> impl Strategy<Value = String> {
    proptest::collection::vec(cyrillic_word(), 1..max_words)
        .prop_map(|words| words.join(" "))
}

proptest! {
    /// The assembled prompt never exceeds the token budget as long as the
    /// context itself fits.
    #[test]
    fn prompt_respects_budget(
        turns in proptest::collection::vec((cyrillic_text(20), cyrillic_text(120)), 0..15),
        summaries in proptest::collection::vec(cyrillic_text(60), 0..6),
        budget in 600_usize..4000,
    ) {
        let mut memory = ConversationMemory::new(MemoryConfig {
            max_context_tokens: budget,
            ..MemoryConfig::default()
        });
        seed_summaries(&mut memory, &summaries);
        for (q, a) in turns {
            memory.append_turn(q, a);
        }

        let context = "короткий контекст";
        let question = "вопрос";
        let assembler = PromptAssembler::new(budget);
        let (_, tokens) = assembler.assemble(&memory, context, question);

        let base = format!("{context}{question}");
        let base_tokens = memory.count_tokens(&base);
        // Generous fixed allowance for the template text around the parts.
        prop_assume!(base_tokens + 200 < budget - PROMPT_SAFETY_MARGIN);
        // The margin absorbs counting imprecision; the hard bound is the
        // full budget.
        prop_assert!(tokens <= budget);
    }

    /// Ranking returns at most k documents, ordered by non-increasing score.
    #[test]
    fn rank_is_bounded_and_sorted(
        query in cyrillic_text(8),
        k in 1_usize..20,
        corpus in proptest::collection::vec(cyrillic_text(30), 1..40),
    ) {
        let index = StaticIndex { docs: corpus.into_iter().map(Document::new).collect() };
        let ranker = HybridRanker::new(RetrievalConfig::default()).unwrap();
        let scored = ranker.rank_scored(&index, &query, k).unwrap();

        prop_assert!(scored.len() <= k);
        for pair in scored.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }

    /// Extracted keywords never include stop words and respect the minimum
    /// length.
    #[test]
    fn keywords_filter_holds(query in cyrillic_text(15)) {
        let extractor = KeywordExtractor::new(KeywordMode::AllWords, 4).unwrap();
        for keyword in extractor.extract(&query) {
            prop_assert!(keyword.chars().count() >= 4);
            let lowered = keyword.to_lowercase();
            prop_assert!(lowered != "что" && lowered != "как" && lowered != "этот");
        }
    }

    /// Query expansion always keeps the original term first and never
    /// produces duplicates.
    #[test]
    fn expansion_keeps_original(term in cyrillic_text(2)) {
        let variants = arcana::agent::expand_query(&term);
        prop_assert_eq!(variants[0].clone(), term);
        let mut seen = std::collections::HashSet::new();
        for v in &variants {
            prop_assert!(seen.insert(v.clone()));
        }
    }

    /// The agent loop always terminates within the iteration budget, even
    /// against a model that never stops calling tools.
    #[test]
    fn agent_loop_terminates(
        max_iterations in 1_usize..12,
        force_stop_threshold in 2_usize..12,
    ) {
        let llm = RelentlessToolCaller;
        let ranker = HybridRanker::new(RetrievalConfig::default()).unwrap();
        let index = StaticIndex { docs: vec![Document::new("фрагмент")] };
        let config = AgentConfig {
            max_iterations,
            force_stop_threshold,
            ..AgentConfig::default()
        };
        let agent = arcana::agent::SearchAgent::new(&llm, &ranker, &index, None, &config);

        let run = agent.run("вопрос");
        prop_assert_eq!(run.outcome, AgentOutcome::BudgetExceeded);
        prop_assert_eq!(run.iterations, max_iterations);
    }
}

// Summaries enter memory only through summarization; replay canned folds
// to seed them, then drop the scaffolding turns.
fn seed_summaries(memory: &mut ConversationMemory, summaries: &[String]) {
    for summary in summaries {
        let canned = CannedSummarizer {
            summary: summary.clone(),
        };
        memory.append_turn("в1", "о1");
        memory.append_turn("в2", "о2");
        memory.append_turn("в3", "о3");
        memory.summarize(&canned);
    }
    memory.clear(true);
}

struct CannedSummarizer {
    summary: String,
}

impl ChatCompletion for CannedSummarizer {
    fn name(&self) -> &'static str {
        "canned"
    }

    fn complete(&self, _request: &CompletionRequest) -> arcana::Result<CompletionResponse> {
        Ok(CompletionResponse {
            content: Some(self.summary.clone()),
            tool_calls: Vec::new(),
        })
    }
}

struct RelentlessToolCaller;

impl ChatCompletion for RelentlessToolCaller {
    fn name(&self) -> &'static str {
        "relentless"
    }

    fn complete(&self, _request: &CompletionRequest) -> arcana::Result<CompletionResponse> {
        Ok(CompletionResponse {
            content: None,
            tool_calls: vec![ToolCallRequest {
                id: "call_1".to_string(),
                name: "expand_query".to_string(),
                arguments: r#"{"term":"Мектабу"}"#.to_string(),
            }],
        })
    }
}

struct StaticIndex {
    docs: Vec<Document>,
}

impl VectorSearch for StaticIndex {
    fn diversity_search(
        &self,
        _query: &str,
        k: usize,
        _fetch_k: usize,
        _lambda: f64,
    ) -> arcana::Result<Vec<Document>> {
        Ok(self.docs.iter().take(k).cloned().collect())
    }

    fn contains_search(&self, keyword: &str, limit: usize) -> arcana::Result<Vec<Document>> {
        Ok(self
            .docs
            .iter()
            .filter(|d| d.content.to_lowercase().contains(&keyword.to_lowercase()))
            .take(limit)
            .cloned()
            .collect())
    }
}
