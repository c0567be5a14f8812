//! Hybrid ranking: diversity search re-ranked by keyword boosting.

use super::{KeywordExtractor, KeywordMode};
use crate::config::RetrievalConfig;
use crate::models::{Document, RankingMode, ScoredDocument};
use crate::store::VectorSearch;
use crate::{Error, Result};

/// Combines vector-diversity search with exact keyword-match boosting.
///
/// Embedding similarity alone surfaces topically-adjacent but term-missing
/// passages for proper-noun queries; substring boosting corrects for that
/// without abandoning semantic recall.
pub struct HybridRanker {
    config: RetrievalConfig,
    all_words: KeywordExtractor,
    proper_nouns: KeywordExtractor,
}

impl HybridRanker {
    /// Creates a ranker for the given retrieval configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured keyword length is invalid.
    pub fn new(config: RetrievalConfig) -> Result<Self> {
        let all_words = KeywordExtractor::new(KeywordMode::AllWords, config.keyword_min_len)?;
        let proper_nouns = KeywordExtractor::new(KeywordMode::ProperNouns, config.keyword_min_len)?;
        Ok(Self {
            config,
            all_words,
            proper_nouns,
        })
    }

    /// The active retrieval configuration.
    #[must_use]
    pub const fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Ranks the top `k` documents for a query.
    ///
    /// # Errors
    ///
    /// Propagates vector-store failures as [`Error::Retrieval`]; a
    /// legitimate zero-match query returns an empty vector instead.
    pub fn rank(&self, index: &dyn VectorSearch, query: &str, k: usize) -> Result<Vec<Document>> {
        Ok(self
            .rank_scored(index, query, k)?
            .into_iter()
            .map(|s| s.document)
            .collect())
    }

    /// Ranks the top `k` documents, keeping per-document scores.
    ///
    /// # Errors
    ///
    /// Propagates vector-store failures as [`Error::Retrieval`].
    pub fn rank_scored(
        &self,
        index: &dyn VectorSearch,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let (keywords, pool) = match self.config.mode {
            RankingMode::DiversityFirst => self.diversity_pool(index, query, k)?,
            RankingMode::ExactMatchFirst => self.exact_match_pool(index, query, k)?,
        };

        tracing::debug!(
            mode = self.config.mode.as_str(),
            keywords = ?keywords,
            pool_size = pool.len(),
            "ranking candidate pool"
        );

        let mut scored: Vec<ScoredDocument> = pool
            .into_iter()
            .map(|document| {
                let content_folded = document.content.to_lowercase();
                let keyword_matches = keywords
                    .iter()
                    .filter(|kw| content_folded.contains(kw.to_lowercase().as_str()))
                    .count();
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                let score = if keyword_matches > 0 {
                    self.config.keyword_boost.powi(keyword_matches as i32)
                } else {
                    1.0
                };
                ScoredDocument {
                    score,
                    document,
                    keyword_matches,
                }
            })
            .collect();

        // Stable sort: ties keep the collaborator's original order.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored)
    }

    /// Default strategy: diversity search sized by keyword presence.
    ///
    /// With keywords a wider, more diverse pool is requested because boosting
    /// will re-rank it; without keywords a narrower, relevance-leaning pool.
    fn diversity_pool(
        &self,
        index: &dyn VectorSearch,
        query: &str,
        k: usize,
    ) -> Result<(Vec<String>, Vec<Document>)> {
        let keywords = self.all_words.extract(query);

        let pool = if keywords.is_empty() {
            Self::fallback_search(index, query, k)?
        } else {
            index
                .diversity_search(query, k * 5, k * 15, 0.3)
                .map_err(|e| retrieval_error("diversity_search", &e))?
        };

        Ok((keywords, pool))
    }

    /// Stricter strategy: exact substring containment first, diversity
    /// search only when no keyword hits exist.
    fn exact_match_pool(
        &self,
        index: &dyn VectorSearch,
        query: &str,
        k: usize,
    ) -> Result<(Vec<String>, Vec<Document>)> {
        let keywords = self.proper_nouns.extract(query);
        if keywords.is_empty() {
            let pool = Self::fallback_search(index, query, k)?;
            return Ok((keywords, pool));
        }

        let mut pool = Vec::new();
        for keyword in &keywords {
            let hits = index
                .contains_search(keyword, k * 2)
                .map_err(|e| retrieval_error("contains_search", &e))?;
            pool.extend(hits);
        }
        // A document hit by several keywords appears once, at its first slot.
        let mut seen = std::collections::HashSet::new();
        pool.retain(|d| seen.insert(d.content.clone()));

        if pool.is_empty() {
            tracing::debug!("no exact-match hits, falling back to diversity search");
            pool = Self::fallback_search(index, query, k)?;
        }

        Ok((keywords, pool))
    }

    /// The narrow diversity pool used when keyword evidence is absent.
    fn fallback_search(
        index: &dyn VectorSearch,
        query: &str,
        k: usize,
    ) -> Result<Vec<Document>> {
        index
            .diversity_search(query, k * 3, k * 9, 0.5)
            .map_err(|e| retrieval_error("diversity_search", &e))
    }
}

fn retrieval_error(operation: &str, cause: &Error) -> Error {
    Error::Retrieval {
        operation: operation.to_string(),
        cause: cause.to_string(),
    }
}
