//! Storage collaborators: vector search and raw corpus access.
//!
//! The embedding model and vector index are external services as far as the
//! ranking layer is concerned. These traits describe exactly the interface
//! the core consumes; `PseudoEmbedIndex` is a deterministic in-process
//! stand-in for deployments without a real vector service.

mod corpus;
mod pseudo;

pub use corpus::{FileCorpus, chunk_paragraphs};
pub use pseudo::PseudoEmbedIndex;

use crate::Result;
use crate::models::Document;

/// Diversity-aware vector search over the corpus.
pub trait VectorSearch: Send + Sync {
    /// Runs a maximal-marginal-relevance style search.
    ///
    /// Returns up to `k` documents drawn from a candidate pool of `fetch_k`,
    /// trading similarity against diversity via `lambda` (1.0 = pure
    /// relevance, 0.0 = pure diversity). Result order is significant and
    /// must be stable: the ranker uses it as the tie-break.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is unreachable or erroring.
    fn diversity_search(
        &self,
        query: &str,
        k: usize,
        fetch_k: usize,
        lambda: f64,
    ) -> Result<Vec<Document>>;

    /// Exact substring-containment filter over the full collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is unreachable or erroring.
    fn contains_search(&self, keyword: &str, limit: usize) -> Result<Vec<Document>>;
}

/// Read-only line-oriented access to the source text, for `grep_search`.
pub trait RawCorpus: Send + Sync {
    /// Returns the corpus lines in file order.
    ///
    /// # Errors
    ///
    /// Returns an error if the corpus cannot be read.
    fn lines(&self) -> Result<Vec<String>>;
}
