//! Deterministic pseudo-embedding index.
//!
//! Generates normalized hash-based vectors per document and serves
//! diversity search via maximal marginal relevance over cosine similarity.
//! Pseudo-embeddings do not capture real semantic similarity; this backend
//! exists so the binary and the test suite run without an external vector
//! service. Production deployments substitute a real `VectorSearch`.

use super::VectorSearch;
use crate::Result;
use crate::models::Document;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Embedding dimensions for the pseudo index.
const DIMENSIONS: usize = 256;

/// Bound on hashed words per document to keep indexing linear.
const MAX_WORDS: usize = 1000;

/// In-process vector index over a fixed set of documents.
pub struct PseudoEmbedIndex {
    docs: Vec<Document>,
    embeddings: Vec<Vec<f32>>,
}

impl PseudoEmbedIndex {
    /// Builds the index by embedding every document.
    #[must_use]
    pub fn new(docs: Vec<Document>) -> Self {
        let embeddings = docs.iter().map(|d| pseudo_embed(&d.content)).collect();
        Self { docs, embeddings }
    }

    /// Number of indexed documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

impl VectorSearch for PseudoEmbedIndex {
    fn diversity_search(
        &self,
        query: &str,
        k: usize,
        fetch_k: usize,
        lambda: f64,
    ) -> Result<Vec<Document>> {
        if self.docs.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = pseudo_embed(query);

        // Top fetch_k candidates by query similarity
        let mut candidates: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine(&query_embedding, e)))
            .collect();
        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(fetch_k.max(k));

        // Greedy MMR selection over the candidate pool
        #[allow(clippy::cast_possible_truncation)]
        let lambda = lambda as f32;
        let mut selected: Vec<usize> = Vec::with_capacity(k);
        let mut remaining = candidates;

        while selected.len() < k && !remaining.is_empty() {
            let mut best_pos = 0;
            let mut best_score = f32::NEG_INFINITY;

            for (pos, &(idx, query_sim)) in remaining.iter().enumerate() {
                let max_selected_sim = selected
                    .iter()
                    .map(|&s| cosine(&self.embeddings[idx], &self.embeddings[s]))
                    .fold(0.0f32, f32::max);
                let mmr = lambda * query_sim - (1.0 - lambda) * max_selected_sim;
                if mmr > best_score {
                    best_score = mmr;
                    best_pos = pos;
                }
            }

            let (idx, _) = remaining.remove(best_pos);
            selected.push(idx);
        }

        Ok(selected.into_iter().map(|i| self.docs[i].clone()).collect())
    }

    fn contains_search(&self, keyword: &str, limit: usize) -> Result<Vec<Document>> {
        let needle = keyword.to_lowercase();
        Ok(self
            .docs
            .iter()
            .filter(|d| d.content.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Generates a deterministic normalized pseudo-embedding from text.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn pseudo_embed(text: &str) -> Vec<f32> {
    let mut embedding = vec![0.0f32; DIMENSIONS];

    for (i, word) in text
        .split_whitespace()
        .map(str::to_lowercase)
        .take(MAX_WORDS)
        .enumerate()
    {
        let mut hasher = DefaultHasher::new();
        word.hash(&mut hasher);
        let hash = hasher.finish();
        for j in 0..8 {
            let idx = ((hash >> (j * 8)) as usize + i) % DIMENSIONS;
            let value = ((hash >> (j * 4)) & 0xFF) as f32 / 255.0 - 0.5;
            embedding[idx] += value;
        }
    }

    normalize(&mut embedding);
    embedding
}

/// Normalizes a vector in place; zero vectors are left untouched.
fn normalize(embedding: &mut [f32]) {
    let norm_sq: f32 = embedding.iter().map(|x| x * x).sum();
    if norm_sq <= 0.0 {
        return;
    }
    let inv_norm = norm_sq.sqrt().recip();
    for v in embedding.iter_mut() {
        *v *= inv_norm;
    }
}

/// Cosine similarity of two same-length normalized vectors.
fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> PseudoEmbedIndex {
        PseudoEmbedIndex::new(vec![
            Document::new("Перун — космоэнергетический канал защиты"),
            Document::new("Фираст применяется для очистки"),
            Document::new("Анаконда работает с позвоночником"),
            Document::new("Зевс — магический канал"),
        ])
    }

    #[test]
    fn test_embedding_is_deterministic() {
        assert_eq!(pseudo_embed("канал защиты"), pseudo_embed("канал защиты"));
    }

    #[test]
    fn test_identical_text_ranks_first() {
        let idx = index();
        let results = idx
            .diversity_search("Фираст применяется для очистки", 2, 8, 0.5)
            .unwrap();
        assert_eq!(results[0].content, "Фираст применяется для очистки");
    }

    #[test]
    fn test_diversity_search_respects_k() {
        let idx = index();
        let results = idx.diversity_search("канал", 2, 8, 0.5).unwrap();
        assert_eq!(results.len(), 2);

        let results = idx.diversity_search("канал", 100, 300, 0.5).unwrap();
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_contains_search_is_case_insensitive() {
        let idx = index();
        let hits = idx.contains_search("перун", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("Перун"));
    }

    #[test]
    fn test_contains_search_limit() {
        let idx = index();
        let hits = idx.contains_search("канал", 1).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_empty_index() {
        let idx = PseudoEmbedIndex::new(Vec::new());
        assert!(idx.is_empty());
        assert!(idx.diversity_search("канал", 5, 15, 0.5).unwrap().is_empty());
    }
}
