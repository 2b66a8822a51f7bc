//! Publication model: the normalized bibliographic record every provider produces.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Minimum abstract length (in characters, exclusive) for a record to be persisted
pub const MIN_ABSTRACT_CHARS: usize = 100;

/// A normalized bibliographic record
///
/// Providers build these from their own payloads; the store persists them one file per
/// record. The `id` is derived from `(query_name, provider_name, internal_index)` and is
/// never written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publication {
    /// Paper title
    pub title: String,

    /// Publication year (0 or negative when the source did not report one)
    pub year: i32,

    /// Authors in the order the source lists them
    pub authors: Vec<String>,

    /// Abstract text
    #[serde(rename = "abstract")]
    pub r#abstract: String,

    /// Position within its query+provider result set, zero-based
    pub internal_index: usize,

    /// Provider that produced the record
    pub provider_name: String,

    /// Logical query name the record was fetched under
    pub query_name: String,
}

/// Reason a record fails the persistence gate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Invalid {
    #[error("year = {0}")]
    Year(i32),

    #[error("no authors")]
    NoAuthors,

    #[error("empty title")]
    EmptyTitle,

    #[error("abstract too short ({0} chars)")]
    ShortAbstract(usize),
}

impl Publication {
    /// Store key: `{query}-{provider lowercased}-{index:03}`
    pub fn id(&self) -> String {
        format!(
            "{}-{}-{:03}",
            self.query_name,
            self.provider_name.to_lowercase(),
            self.internal_index
        )
    }

    /// Check the fields a record needs before it may be persisted
    pub fn check_validity(&self) -> Result<(), Invalid> {
        if self.year <= 0 {
            return Err(Invalid::Year(self.year));
        }
        if self.authors.is_empty() {
            return Err(Invalid::NoAuthors);
        }
        if self.title.is_empty() {
            return Err(Invalid::EmptyTitle);
        }
        let chars = self.r#abstract.chars().count();
        if chars <= MIN_ABSTRACT_CHARS {
            return Err(Invalid::ShortAbstract(chars));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.check_validity().is_ok()
    }

    /// First listed author, if any
    pub fn first_author(&self) -> Option<&str> {
        self.authors.first().map(|s| s.as_str())
    }

    fn author_set(&self) -> HashSet<&str> {
        self.authors.iter().map(|s| s.as_str()).collect()
    }
}

/// Two records are the same work when year, title and the *set* of authors agree.
/// Abstract and index do not take part.
impl PartialEq for Publication {
    fn eq(&self, other: &Self) -> bool {
        self.year == other.year && self.title == other.title && self.author_set() == other.author_set()
    }
}

impl Eq for Publication {}

#[cfg(test)]
pub(crate) fn sample(title: &str, year: i32, authors: &[&str], index: usize) -> Publication {
    Publication {
        title: title.to_string(),
        year,
        authors: authors.iter().map(|a| a.to_string()).collect(),
        r#abstract: "x".repeat(MIN_ABSTRACT_CHARS + 20),
        internal_index: index,
        provider_name: "arXiv".to_string(),
        query_name: "llm".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_derived_from_query_provider_index() {
        let p = sample("Attention", 2017, &["Vaswani"], 7);
        assert_eq!(p.id(), "llm-arxiv-007");

        let mut q = p.clone();
        q.title = "Something else".to_string();
        q.r#abstract = String::new();
        assert_eq!(p.id(), q.id());
    }

    #[test]
    fn test_id_keeps_wide_indices() {
        let p = sample("T", 2020, &["A"], 1234);
        assert_eq!(p.id(), "llm-arxiv-1234");
    }

    #[test]
    fn test_equality_ignores_author_order_abstract_and_index() {
        let a = sample("Attention", 2017, &["Vaswani", "Shazeer"], 0);
        let mut b = sample("Attention", 2017, &["Shazeer", "Vaswani"], 42);
        b.r#abstract = "different".to_string();
        assert_eq!(a, b);

        let c = sample("Attention", 2018, &["Vaswani", "Shazeer"], 0);
        assert_ne!(a, c);

        let d = sample("Attention", 2017, &["Vaswani"], 0);
        assert_ne!(a, d);
    }

    #[test]
    fn test_validity_gate() {
        let ok = sample("Title", 2020, &["A"], 0);
        assert!(ok.is_valid());

        let mut no_year = ok.clone();
        no_year.year = -1;
        assert_eq!(no_year.check_validity(), Err(Invalid::Year(-1)));

        let mut no_authors = ok.clone();
        no_authors.authors.clear();
        assert_eq!(no_authors.check_validity(), Err(Invalid::NoAuthors));

        let mut no_title = ok.clone();
        no_title.title.clear();
        assert_eq!(no_title.check_validity(), Err(Invalid::EmptyTitle));

        let mut short = ok.clone();
        short.r#abstract = "a".repeat(80);
        assert_eq!(short.check_validity(), Err(Invalid::ShortAbstract(80)));

        short.r#abstract = "a".repeat(100);
        assert!(!short.is_valid());
        short.r#abstract = "a".repeat(101);
        assert!(short.is_valid());
    }

    #[test]
    fn test_serialized_layout() {
        let p = sample("T", 2020, &["A"], 3);
        let value = serde_json::to_value(&p).unwrap();
        assert!(value.get("abstract").is_some());
        assert!(value.get("id").is_none());
        assert_eq!(value["internal_index"], 3);
    }
}
