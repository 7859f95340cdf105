//! Body-assessment knowledge base.
//!
//! A small reference corpus of body-composition norms. The built-in table is
//! defined in `body_assessment.toml` and embedded at compile time; a custom
//! table with the same layout can be loaded from disk.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The embedded reference table.
static BODY_ASSESSMENT_TOML: &str = include_str!("body_assessment.toml");

/// Default number of hits returned by a search.
pub const DEFAULT_LIMIT: usize = 3;

/// Errors loading a knowledge table.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("failed to read knowledge file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid knowledge table: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("knowledge table has no entries")]
    Empty,
}

/// One reference entry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KnowledgeEntry {
    pub topic: String,
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub content: String,
}

impl KnowledgeEntry {
    /// Relevance of this entry to a tokenized query. Zero means no match.
    fn score(&self, terms: &[String]) -> usize {
        let topic = self.topic.to_lowercase();
        let content = self.content.to_lowercase();
        terms
            .iter()
            .map(|term| {
                let mut s = 0;
                if self.keywords.iter().any(|k| k.to_lowercase().contains(term.as_str())) {
                    s += 3;
                }
                if topic.contains(term.as_str()) {
                    s += 2;
                }
                if content.contains(term.as_str()) {
                    s += 1;
                }
                s
            })
            .sum()
    }
}

#[derive(Debug, Deserialize)]
struct KnowledgeTable {
    entries: Vec<KnowledgeEntry>,
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit<'a> {
    pub score: usize,
    pub entry: &'a KnowledgeEntry,
}

/// Searchable collection of [`KnowledgeEntry`] values.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeBase {
    /// The table compiled into the binary.
    pub fn embedded() -> Result<Self, KnowledgeError> {
        Self::from_toml_str(BODY_ASSESSMENT_TOML)
    }

    /// Parse a table from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, KnowledgeError> {
        let table: KnowledgeTable = toml::from_str(text)?;
        if table.entries.is_empty() {
            return Err(KnowledgeError::Empty);
        }
        Ok(Self {
            entries: table.entries,
        })
    }

    /// Load a table from a TOML file.
    pub fn load(path: &Path) -> Result<Self, KnowledgeError> {
        let text = std::fs::read_to_string(path).map_err(|source| KnowledgeError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    /// Entries ranked by relevance to `query`, best first, at most `limit`.
    ///
    /// Ties keep table order. Entries with no matching term are omitted.
    pub fn search(&self, query: &str, limit: usize) -> Vec<Hit<'_>> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<Hit<'_>> = self
            .entries
            .iter()
            .map(|entry| Hit {
                score: entry.score(&terms),
                entry,
            })
            .filter(|h| h.score > 0)
            .collect();
        hits.sort_by(|a, b| b.score.cmp(&a.score));
        hits.truncate(limit);
        hits
    }
}

/// Lowercased query terms, dropping short filler words.
fn tokenize(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '/'))
        .map(str::to_lowercase)
        .filter(|t| t.len() >= 3 || t == "bf")
        .collect();
    terms.sort_unstable();
    terms.dedup();
    terms
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_table_loads() {
        let kb = KnowledgeBase::embedded().unwrap();
        assert!(kb.len() >= 10, "expected a populated table, got {}", kb.len());
    }

    #[test]
    fn somatotype_query_ranks_matching_entry_first() {
        let kb = KnowledgeBase::embedded().unwrap();
        let hits = kb.search("mesomorph body type", DEFAULT_LIMIT);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].entry.topic, "Mesomorph");
    }

    #[test]
    fn missing_measurement_query_finds_estimation_guidance() {
        let kb = KnowledgeBase::embedded().unwrap();
        let hits = kb.search("estimate body fat without neck or waist", 5);
        assert!(hits.iter().any(|h| h.entry.category == "estimation"));
    }

    #[test]
    fn repeated_query_terms_count_once() {
        assert_eq!(tokenize("body fat body"), vec!["body", "fat"]);

        let kb = KnowledgeBase::embedded().unwrap();
        let once: Vec<usize> = kb.search("body fat", 5).iter().map(|h| h.score).collect();
        let twice: Vec<usize> = kb
            .search("body fat body", 5)
            .iter()
            .map(|h| h.score)
            .collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn limit_is_respected() {
        let kb = KnowledgeBase::embedded().unwrap();
        assert!(kb.search("body fat", 2).len() <= 2);
    }

    #[test]
    fn unrelated_query_returns_nothing() {
        let kb = KnowledgeBase::embedded().unwrap();
        assert!(kb.search("zzzz qqqq", DEFAULT_LIMIT).is_empty());
        assert!(kb.search("", DEFAULT_LIMIT).is_empty());
    }

    #[test]
    fn empty_table_is_rejected() {
        let err = KnowledgeBase::from_toml_str("entries = []").unwrap_err();
        assert!(matches!(err, KnowledgeError::Empty));
    }

    #[test]
    fn load_reads_custom_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.toml");
        std::fs::write(
            &path,
            "[[entries]]\ntopic = \"Grip\"\ncategory = \"strength\"\ncontent = \"Grip strength norms.\"\n",
        )
        .unwrap();
        let kb = KnowledgeBase::load(&path).unwrap();
        assert_eq!(kb.len(), 1);
        assert_eq!(kb.search("grip", 3)[0].entry.topic, "Grip");
    }
}
