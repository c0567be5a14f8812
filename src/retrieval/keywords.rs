//! Keyword extraction from free-text queries.
//!
//! Embedding similarity alone frequently surfaces topically-adjacent but
//! term-missing passages for proper-noun queries, which are common in this
//! corpus (short named channel names). The extractor pulls the significant
//! terms out of a query so the ranker can boost exact matches.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Interrogatives and demonstratives that carry no retrieval signal.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "что", "как", "где", "когда", "зачем", "почему", "какой", "какая", "какие", "который",
        "которая", "которые", "этот", "эта", "это", "эти", "того", "тому", "этого", "общего",
    ])
});

/// Extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeywordMode {
    /// Case-fold the query and take every Cyrillic run of the minimum
    /// length, re-capitalized to match corpus proper-noun spelling.
    #[default]
    AllWords,
    /// Take only tokens already capitalized in the original query. Stricter;
    /// used by the exact-match-first ranking mode.
    ProperNouns,
}

/// Extracts candidate keywords from a query.
pub struct KeywordExtractor {
    mode: KeywordMode,
    word_re: Regex,
}

impl KeywordExtractor {
    /// Creates an extractor for the given mode and minimum token length.
    ///
    /// Tokens shorter than `min_len` characters are overwhelmingly function
    /// words in the corpus language, so they are never considered.
    ///
    /// # Errors
    ///
    /// Returns an error if `min_len` is zero.
    pub fn new(mode: KeywordMode, min_len: usize) -> crate::Result<Self> {
        if min_len == 0 {
            return Err(crate::Error::InvalidInput(
                "keyword_min_len must be at least 1".to_string(),
            ));
        }

        let pattern = match mode {
            KeywordMode::AllWords => format!(r"\b[а-яё]{{{min_len},}}\b"),
            KeywordMode::ProperNouns => {
                format!(r"\b[А-ЯЁ][а-яё]{{{},}}\b", min_len.saturating_sub(1))
            },
        };
        let word_re = Regex::new(&pattern).map_err(|e| crate::Error::OperationFailed {
            operation: "compile_keyword_regex".to_string(),
            cause: e.to_string(),
        })?;

        Ok(Self { mode, word_re })
    }

    /// Returns the extraction mode.
    #[must_use]
    pub const fn mode(&self) -> KeywordMode {
        self.mode
    }

    /// Extracts deduplicated keywords from a query.
    ///
    /// Output order is not significant (treat as a set). Empty or
    /// all-stopword input yields an empty vector; callers fall back to pure
    /// vector search in that case.
    #[must_use]
    pub fn extract(&self, query: &str) -> Vec<String> {
        let mut keywords = Vec::new();

        match self.mode {
            KeywordMode::AllWords => {
                let folded = query.to_lowercase();
                for m in self.word_re.find_iter(&folded) {
                    let word = m.as_str();
                    if STOP_WORDS.contains(word) {
                        continue;
                    }
                    let keyword = capitalize(word);
                    if !keywords.contains(&keyword) {
                        keywords.push(keyword);
                    }
                }
            },
            KeywordMode::ProperNouns => {
                for m in self.word_re.find_iter(query) {
                    let word = m.as_str();
                    if STOP_WORDS.contains(word.to_lowercase().as_str()) {
                        continue;
                    }
                    if !keywords.iter().any(|k| k == word) {
                        keywords.push(word.to_string());
                    }
                }
            },
        }

        keywords
    }
}

/// Upper-cases the first character, matching how proper nouns are spelled
/// in the corpus.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn all_words() -> KeywordExtractor {
        KeywordExtractor::new(KeywordMode::AllWords, 4).unwrap()
    }

    fn proper_nouns() -> KeywordExtractor {
        KeywordExtractor::new(KeywordMode::ProperNouns, 4).unwrap()
    }

    #[test]
    fn test_extracts_and_capitalizes() {
        let keywords = all_words().extract("Что такое перун в космоэнергетике?");
        assert!(keywords.contains(&"Перун".to_string()));
        assert!(keywords.contains(&"Космоэнергетике".to_string()));
        assert!(keywords.contains(&"Такое".to_string()));
        // Interrogative dropped
        assert!(!keywords.iter().any(|k| k == "Что"));
    }

    #[test]
    fn test_short_tokens_dropped() {
        let keywords = all_words().extract("Где мой дом");
        // "мой" and "дом" are under 4 characters, "где" is a stopword
        assert!(keywords.is_empty());
    }

    #[test]
    fn test_proper_noun_mode_requires_capital() {
        let extractor = proper_nouns();
        let keywords = extractor.extract("Расскажи о частоте Фираст");
        assert_eq!(keywords, vec!["Расскажи".to_string(), "Фираст".to_string()]);

        // Lower-cased query carries no proper nouns
        let keywords = extractor.extract("расскажи о частоте фираст");
        assert!(keywords.is_empty());
    }

    #[test]
    fn test_proper_noun_mode_drops_interrogatives() {
        let keywords = proper_nouns().extract("Что такое Перун?");
        assert_eq!(keywords, vec!["Перун".to_string()]);
    }

    #[test]
    fn test_duplicates_collapse() {
        let keywords = all_words().extract("Перун, перун и снова Перун");
        assert_eq!(
            keywords.iter().filter(|k| k.as_str() == "Перун").count(),
            1
        );
        assert!(keywords.contains(&"Снова".to_string()));
    }

    #[test_case(""; "empty input")]
    #[test_case("Что? Как? Почему?"; "all stopwords")]
    #[test_case("latin words only here"; "no cyrillic")]
    fn test_yields_empty_set(query: &str) {
        assert!(all_words().extract(query).is_empty());
    }

    #[test]
    fn test_zero_min_len_rejected() {
        assert!(KeywordExtractor::new(KeywordMode::AllWords, 0).is_err());
    }

    #[test]
    fn test_configurable_min_len() {
        let extractor = KeywordExtractor::new(KeywordMode::AllWords, 3).unwrap();
        let keywords = extractor.extract("мой дом");
        assert!(keywords.contains(&"Дом".to_string()));
        assert!(keywords.contains(&"Мой".to_string()));
    }
}
