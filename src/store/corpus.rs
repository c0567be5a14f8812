//! File-backed corpus access and paragraph chunking.

use super::RawCorpus;
use crate::models::Document;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Maximum characters per chunk; paragraphs are merged up to this bound.
const MAX_CHUNK_CHARS: usize = 1200;

/// Raw corpus backed by a UTF-8 text file.
pub struct FileCorpus {
    path: PathBuf,
}

impl FileCorpus {
    /// Creates a corpus handle for the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The underlying file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole file.
    fn read(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).map_err(|e| Error::OperationFailed {
            operation: "read_corpus".to_string(),
            cause: format!("{}: {e}", self.path.display()),
        })
    }

    /// Chunks the corpus into documents for indexing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn chunks(&self) -> Result<Vec<Document>> {
        Ok(chunk_paragraphs(&self.read()?))
    }
}

impl RawCorpus for FileCorpus {
    fn lines(&self) -> Result<Vec<String>> {
        Ok(self.read()?.lines().map(str::to_string).collect())
    }
}

/// Splits raw text into paragraph-based documents.
///
/// Consecutive non-blank lines form a paragraph; adjacent paragraphs are
/// merged until `MAX_CHUNK_CHARS` so short stanzas do not become one-line
/// documents. Each document carries its chunk index as metadata.
#[must_use]
pub fn chunk_paragraphs(text: &str) -> Vec<Document> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !current.is_empty()
            && current.chars().count() + paragraph.chars().count() > MAX_CHUNK_CHARS
        {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, content)| Document::new(content).with_meta("chunk", i.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_chunk_merges_short_paragraphs() {
        let docs = chunk_paragraphs("один\n\nдва\n\nтри");
        assert_eq!(docs.len(), 1);
        assert!(docs[0].content.contains("один"));
        assert!(docs[0].content.contains("три"));
    }

    #[test]
    fn test_chunk_splits_on_budget() {
        let long = "а".repeat(900);
        let text = format!("{long}\n\n{long}");
        let docs = chunk_paragraphs(&text);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.get("chunk").map(String::as_str), Some("0"));
        assert_eq!(docs[1].metadata.get("chunk").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_paragraphs("").is_empty());
        assert!(chunk_paragraphs("\n\n\n\n").is_empty());
    }

    #[test]
    fn test_file_corpus_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "первая строка").unwrap();
        writeln!(file, "вторая строка").unwrap();

        let corpus = FileCorpus::new(file.path());
        let lines = corpus.lines().unwrap();
        assert_eq!(lines, vec!["первая строка", "вторая строка"]);
    }

    #[test]
    fn test_missing_file_is_operation_failed() {
        let corpus = FileCorpus::new("/nonexistent/corpus.txt");
        assert!(corpus.lines().is_err());
    }
}
