//! Crossref provider.
//!
//! Searches titles through the Crossref REST API, restricted to works that carry an
//! abstract. Crossref has no boolean NOT, so exclude terms are dropped with a warning.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{Publication, Query, ResultPage};
use crate::sources::{decode_entries, number_items, warn_dropped_excludes, Provider, SourceError};
use crate::utils::HttpFetch;

const CROSSREF_API_URL: &str = "https://api.crossref.org/works?";

/// Crossref provider
#[derive(Debug, Clone)]
pub struct CrossrefProvider {
    http: Arc<dyn HttpFetch>,
    base: String,
}

impl CrossrefProvider {
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self::with_base(http, CROSSREF_API_URL)
    }

    /// Create with a custom base locator (for testing)
    pub fn with_base(http: Arc<dyn HttpFetch>, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into(),
        }
    }

    fn parse(payload: &str) -> Result<CRMessage, SourceError> {
        let response: CRResponse = serde_json::from_str(payload)?;
        Ok(response.message)
    }

    fn to_publications(&self, items: Vec<serde_json::Value>, query: &Query) -> Vec<Publication> {
        let items: Vec<CRItem> = decode_entries(self.id(), items);
        let records = items.into_iter().filter_map(|item| {
            let title = item.title.into_iter().next()?.trim().to_string();
            if title.is_empty() {
                return None;
            }
            let year = item
                .published
                .and_then(|p| p.date_parts.into_iter().next())
                .and_then(|parts| parts.into_iter().next().flatten())
                .unwrap_or(0);
            let authors = item
                .author
                .into_iter()
                .filter_map(CRAuthor::full_name)
                .collect();
            Some((title, year, authors, item.r#abstract.unwrap_or_default()))
        });
        number_items(self.id(), query, records)
    }
}

#[async_trait]
impl Provider for CrossrefProvider {
    fn id(&self) -> &str {
        "crossref"
    }

    fn name(&self) -> &str {
        "Crossref"
    }

    fn base_locator(&self) -> &str {
        &self.base
    }

    fn http(&self) -> &dyn HttpFetch {
        self.http.as_ref()
    }

    fn supports_exclusion(&self) -> bool {
        false
    }

    fn generate_locator(&self, query: &Query) -> String {
        warn_dropped_excludes(self.id(), query);

        let title = query
            .include()
            .iter()
            .map(|t| urlencoding::encode(t).into_owned())
            .collect::<Vec<_>>()
            .join("+");

        let mut url = format!(
            "{}query.title={}&filter=has-abstract:1&select=title,author,abstract,published&rows={}",
            self.base,
            title,
            query.items_per_page()
        );
        if query.start_index() > 0 {
            url.push_str(&format!("&offset={}", query.start_index()));
        }
        url
    }

    fn extract_items(&self, payload: &str, query: &Query) -> Result<Vec<Publication>, SourceError> {
        let message = Self::parse(payload)?;
        Ok(self.to_publications(message.items, query))
    }

    fn build_page(&self, payload: &str, query: &Query) -> Result<ResultPage, SourceError> {
        let message = Self::parse(payload)?;
        let total = message.total_results;
        let items_per_page = message.items_per_page.unwrap_or(query.items_per_page());
        let start_index = message
            .query
            .and_then(|q| q.start_index)
            .unwrap_or(query.start_index());
        let items = self.to_publications(message.items, query);

        Ok(ResultPage::new(query.clone(), total, items)
            .items_per_page(items_per_page)
            .start_index(start_index))
    }
}

#[derive(Debug, Deserialize)]
struct CRResponse {
    message: CRMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CRMessage {
    #[serde(default)]
    total_results: usize,
    items_per_page: Option<usize>,
    query: Option<CRQuery>,
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CRQuery {
    start_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CRItem {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<CRAuthor>,
    #[serde(rename = "abstract")]
    r#abstract: Option<String>,
    published: Option<CRDate>,
}

#[derive(Debug, Deserialize)]
struct CRAuthor {
    given: Option<String>,
    family: Option<String>,
    name: Option<String>,
}

impl CRAuthor {
    fn full_name(self) -> Option<String> {
        match (self.given, self.family, self.name) {
            (Some(given), Some(family), _) => Some(format!("{} {}", given, family)),
            (None, Some(family), _) => Some(family),
            (_, None, Some(name)) => Some(name),
            (Some(given), None, None) => Some(given),
            (None, None, None) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CRDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockHttp;

    const RESPONSE: &str = r#"{
      "status": "ok",
      "message": {
        "total-results": 1234,
        "items-per-page": 2,
        "query": {"start-index": 0, "search-terms": null},
        "items": [
          {
            "title": ["Scaling Laws for Language Models"],
            "author": [{"given": "Jared", "family": "Kaplan"}, {"name": "OpenAI Team"}],
            "abstract": "<jats:p>We study empirical scaling laws.</jats:p>",
            "published": {"date-parts": [[2020, 1, 23]]}
          },
          {
            "title": "not a list",
            "author": []
          },
          {
            "title": ["No Date"],
            "author": [{"family": "Solo"}]
          }
        ]
      }
    }"#;

    fn query(exclude: &[&str], start: usize) -> Query {
        Query::new(
            "llm",
            "crossref",
            CROSSREF_API_URL,
            vec!["scaling laws".to_string(), "llm".to_string()],
            exclude.iter().map(|s| s.to_string()).collect(),
            20,
            start,
        )
        .unwrap()
    }

    fn provider() -> CrossrefProvider {
        CrossrefProvider::new(Arc::new(MockHttp::new()))
    }

    #[test]
    fn test_locator() {
        assert_eq!(
            provider().generate_locator(&query(&[], 0)),
            "https://api.crossref.org/works?query.title=scaling%20laws+llm\
             &filter=has-abstract:1&select=title,author,abstract,published&rows=20"
        );
        assert!(provider()
            .generate_locator(&query(&[], 40))
            .ends_with("&rows=20&offset=40"));
    }

    #[test]
    fn test_exclusion_is_dropped() {
        let url = provider().generate_locator(&query(&["vision"], 0));
        assert!(!url.contains("vision"));
        assert!(!provider().supports_exclusion());
    }

    #[test]
    fn test_build_page() {
        let page = provider().build_page(RESPONSE, &query(&[], 0)).unwrap();
        assert_eq!(page.total, 1234);
        assert_eq!(page.items_per_page, 2);
        assert_eq!(page.num_items(), 2);

        let first = &page.items[0];
        assert_eq!(first.title, "Scaling Laws for Language Models");
        assert_eq!(first.year, 2020);
        assert_eq!(first.authors, ["Jared Kaplan", "OpenAI Team"]);
        assert!(first.r#abstract.contains("scaling laws"));
        assert_eq!(first.provider_name, "crossref");

        let second = &page.items[1];
        assert_eq!(second.title, "No Date");
        assert_eq!(second.year, 0);
        assert_eq!(second.internal_index, 1);
    }

    #[test]
    fn test_bad_payload_is_an_error() {
        assert!(matches!(
            provider().build_page("not json", &query(&[], 0)),
            Err(SourceError::Parse(_))
        ));
    }
}
