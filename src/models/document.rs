//! Retrievable document types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A unit of retrievable text.
///
/// Documents are created and owned by the vector-store collaborator; the
/// ranking layer only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// The passage text.
    pub content: String,
    /// Source metadata (file, chunk index, ...).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Creates a document from content with empty metadata.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A candidate document scored by the hybrid ranker.
///
/// Ephemeral: created per query, discarded after top-k selection.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    /// Combined score (1.0 base from the diversity search, multiplied by
    /// `keyword_boost ^ keyword_matches`).
    pub score: f64,
    /// The underlying document.
    pub document: Document,
    /// Number of distinct extracted keywords found in the content.
    pub keyword_matches: usize,
}

/// Hybrid ranking strategy.
///
/// Two divergent strategies exist in practice; both are valid for different
/// callers, so the mode is configurable rather than hard-coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankingMode {
    /// Run the diversity search first, then boost candidates containing
    /// extracted keywords (default).
    #[default]
    DiversityFirst,
    /// Try an exact substring-containment search over the full collection
    /// for each proper-noun keyword first; fall back to diversity search
    /// only when the union of hits is empty.
    ExactMatchFirst,
}

impl RankingMode {
    /// Returns the mode as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DiversityFirst => "diversity-first",
            Self::ExactMatchFirst => "exact-match-first",
        }
    }

    /// Parses a mode string, defaulting to `DiversityFirst`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "exact" | "exact-match-first" | "exact_match_first" => Self::ExactMatchFirst,
            _ => Self::DiversityFirst,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_builder() {
        let doc = Document::new("Перун — космоэнергетический канал").with_meta("chunk", "12");
        assert_eq!(doc.metadata.get("chunk").map(String::as_str), Some("12"));
    }

    #[test]
    fn test_ranking_mode_parse() {
        assert_eq!(RankingMode::parse("exact"), RankingMode::ExactMatchFirst);
        assert_eq!(RankingMode::parse("hybrid"), RankingMode::DiversityFirst);
        assert_eq!(RankingMode::parse(""), RankingMode::DiversityFirst);
    }

    #[test]
    fn test_ranking_mode_as_str_roundtrips() {
        for mode in [RankingMode::DiversityFirst, RankingMode::ExactMatchFirst] {
            assert_eq!(RankingMode::parse(mode.as_str()), mode);
        }
    }
}
