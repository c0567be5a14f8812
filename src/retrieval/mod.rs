//! Hybrid retrieval: keyword extraction and ranking.

mod keywords;
mod ranker;

pub use keywords::{KeywordExtractor, KeywordMode};
pub use ranker::HybridRanker;
