//! Tools exposed to the agentic loop.
//!
//! Three tools: exact text search over the raw corpus (`grep_search`),
//! hybrid semantic retrieval (`rag_semantic_search`) and morphological
//! query expansion (`expand_query`). Tool results are JSON payloads fed
//! back to the model verbatim.

use crate::llm::ToolSpec;
use crate::store::RawCorpus;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashSet;

/// Maximum grep matches returned to the model.
const MAX_GREP_RESULTS: usize = 15;

/// Context blocks are clipped to this many characters.
const CONTEXT_CLIP: usize = 500;

/// Matched lines are clipped to this many characters.
const LINE_CLIP: usize = 200;

/// Words too generic to anchor an exact search.
static GREP_STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "для", "работы", "канал", "каналы", "частота", "частоты", "как", "что", "это", "или",
        "энергия", "метод",
    ]
    .into_iter()
    .collect()
});

/// Markers of religious rather than esoteric vocabulary.
const RELIGIOUS_MARKERS: &[&str] = &[
    "православ", "церков", "богослуж", "канон", "литурги", "молебен", "собор", "храм",
];

/// Markers of the corpus's own vocabulary.
const ESOTERIC_MARKERS: &[&str] = &[
    "космоэнергет", "канал", "частот", "энерги", "эзотерик", "магическ", "обряд", "ритуал",
];

/// The tools the agent can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Exact fuzzy-pattern search over the raw text.
    GrepSearch,
    /// Hybrid semantic retrieval.
    SemanticSearch,
    /// Morphological variants of a term.
    ExpandQuery,
}

impl ToolKind {
    /// Wire name of the tool.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GrepSearch => "grep_search",
            Self::SemanticSearch => "rag_semantic_search",
            Self::ExpandQuery => "expand_query",
        }
    }

    /// Parses a wire name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTool`] for names outside the fixed set.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "grep_search" => Ok(Self::GrepSearch),
            "rag_semantic_search" => Ok(Self::SemanticSearch),
            "expand_query" => Ok(Self::ExpandQuery),
            other => Err(Error::UnknownTool(other.to_string())),
        }
    }
}

/// Arguments for `grep_search`.
#[derive(Debug, Clone, Deserialize)]
pub struct GrepArgs {
    /// Search phrase; split into keywords internally.
    pub query: String,
    /// Lines of surrounding context per match.
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
}

const fn default_context_lines() -> usize {
    5
}

/// Arguments for `rag_semantic_search`.
#[derive(Debug, Clone, Deserialize)]
pub struct SemanticArgs {
    /// Search query.
    pub query: String,
    /// Number of sources to retrieve.
    #[serde(default = "default_num_sources")]
    pub num_sources: usize,
}

const fn default_num_sources() -> usize {
    20
}

/// Arguments for `expand_query`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpandArgs {
    /// Term to expand.
    pub term: String,
}

/// Tool schemas offered to the model on every agentic completion.
#[must_use]
pub fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: ToolKind::GrepSearch.as_str().to_string(),
            description: "Точный поиск фразы в тексте книг. Используй для поиска \
                          конкретных терминов, названий каналов и имён."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Фраза или термин для точного поиска"
                    },
                    "context_lines": {
                        "type": "integer",
                        "description": "Сколько строк контекста вокруг совпадения",
                        "default": default_context_lines()
                    }
                },
                "required": ["query"]
            }),
        },
        ToolSpec {
            name: ToolKind::SemanticSearch.as_str().to_string(),
            description: "Семантический поиск по смыслу в базе знаний. Используй для \
                          общих вопросов о практиках и понятиях."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Поисковый запрос"
                    },
                    "num_sources": {
                        "type": "integer",
                        "description": "Сколько источников вернуть",
                        "default": default_num_sources()
                    }
                },
                "required": ["query"]
            }),
        },
        ToolSpec {
            name: ToolKind::ExpandQuery.as_str().to_string(),
            description: "Варианты написания термина (падежи, дефисы). Используй, когда \
                          точный поиск ничего не нашёл."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "term": {
                        "type": "string",
                        "description": "Термин для расширения"
                    }
                },
                "required": ["term"]
            }),
        },
    ]
}

/// Fuzzy exact search over the raw corpus.
///
/// The query is reduced to its first three significant keywords; each is
/// matched case-insensitively with optional whitespace or hyphens between
/// letters, so "огненный цветок" also finds "огнен-ный цветок" across a
/// line wrap. A query with no significant keywords is searched as a
/// verbatim phrase instead.
///
/// # Errors
///
/// Returns an error if the corpus cannot be read.
pub fn grep_search(corpus: &dyn RawCorpus, args: &GrepArgs) -> Result<Value> {
    let keywords = grep_keywords(&args.query);
    let patterns: Vec<Regex> = if keywords.is_empty() {
        vec![literal_pattern(&args.query)?]
    } else {
        keywords
            .iter()
            .map(|kw| fuzzy_pattern(kw))
            .collect::<Result<_>>()?
    };

    let lines = corpus.lines()?;
    let mut results = Vec::new();
    let mut contexts = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        if results.len() >= MAX_GREP_RESULTS {
            break;
        }
        if !patterns.iter().any(|p| p.is_match(line)) {
            continue;
        }

        let start = idx.saturating_sub(args.context_lines);
        let end = (idx + args.context_lines + 1).min(lines.len());
        let context = lines[start..end].join(" ");

        results.push(json!({
            "line": idx + 1,
            "match": crate::memory::truncate_chars(line, LINE_CLIP),
            "context": crate::memory::truncate_chars(&context, CONTEXT_CLIP),
        }));
        contexts.push(context);
    }

    let count = results.len();
    let mut payload = json!({ "results": results, "count": count });
    if let Some(hint) = topic_hint(&args.query, &contexts) {
        payload["hint"] = json!(hint);
    }

    tracing::debug!(query = %args.query, count, "grep_search completed");
    Ok(payload)
}

/// Morphological variants of a term: case endings and hyphenation.
#[must_use]
pub fn expand_query(term: &str) -> Vec<String> {
    let mut variants = vec![term.to_string()];

    if let Some(stem) = term.strip_suffix('у') {
        variants.push(format!("{stem}а"));
        variants.push(stem.to_string());
    }
    if let Some(stem) = term.strip_suffix('е') {
        variants.push(format!("{stem}а"));
    }
    if term.contains('-') {
        variants.push(term.replace('-', ""));
        variants.push(term.replace('-', " "));
        for part in term.split('-') {
            if part.chars().count() >= 3 {
                variants.push(part.to_string());
            }
        }
    }

    let mut seen = HashSet::new();
    variants.retain(|v| !v.is_empty() && seen.insert(v.clone()));
    variants
}

/// Flags religious queries whose retrieved material does not match.
///
/// The corpus answers esoteric-practice questions. A religious question
/// that pulled back esoteric material, or nothing on the topic at all,
/// gets a hint so the model says so instead of improvising. A religious
/// question whose results actually carry religious vocabulary passes
/// without a hint.
#[must_use]
pub fn topic_hint(query: &str, retrieved: &[String]) -> Option<String> {
    let lowered = query.to_lowercase();
    if !RELIGIOUS_MARKERS.iter().any(|m| lowered.contains(m)) {
        return None;
    }

    let text = retrieved.join(" ").to_lowercase();
    if RELIGIOUS_MARKERS.iter().any(|m| text.contains(m)) {
        return None;
    }

    if ESOTERIC_MARKERS.iter().any(|m| text.contains(m)) {
        Some(
            "Вопрос про религиозные практики, но найдены эзотерические материалы. \
             Обязательно укажи это в ответе."
                .to_string(),
        )
    } else {
        Some(
            "В базе нет информации по этой религиозной теме. Скажи об этом честно."
                .to_string(),
        )
    }
}

fn grep_keywords(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|w| w.chars().count() >= 3 && !GREP_STOP_WORDS.contains(w))
        .take(3)
        .map(str::to_string)
        .collect()
}

fn fuzzy_pattern(keyword: &str) -> Result<Regex> {
    let body: Vec<String> = keyword
        .chars()
        .map(|c| regex::escape(&c.to_string()))
        .collect();
    compile_pattern(&format!("(?i){}", body.join(r"[\s\-]*")))
}

fn literal_pattern(query: &str) -> Result<Regex> {
    compile_pattern(&format!("(?i){}", regex::escape(query.trim())))
}

fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::OperationFailed {
        operation: "grep_search".to_string(),
        cause: e.to_string(),
    })
}
