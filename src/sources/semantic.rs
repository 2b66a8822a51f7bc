//! Semantic Scholar provider.
//!
//! Uses the bulk paper-search endpoint, which pages with an opaque `token` rather than
//! offsets. Include terms are OR-combined with `|`; exclude terms become `+-term`.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{Publication, Query, ResultPage};
use crate::sources::{decode_entries, number_items, PaginationUnit, Provider, SourceError};
use crate::utils::HttpFetch;

const SEMANTIC_SCHOLAR_API_URL: &str =
    "https://api.semanticscholar.org/graph/v1/paper/search/bulk?";

/// Semantic Scholar provider
#[derive(Debug, Clone)]
pub struct SemanticScholarProvider {
    http: Arc<dyn HttpFetch>,
    base: String,
    api_key: Option<String>,
}

impl SemanticScholarProvider {
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self::with_base(http, SEMANTIC_SCHOLAR_API_URL)
    }

    /// Create with a custom base locator (for testing)
    pub fn with_base(http: Arc<dyn HttpFetch>, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into(),
            api_key: None,
        }
    }

    /// Send `key` as `x-api-key` for higher rate limits
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty());
        self
    }

    fn search_expression(query: &Query) -> String {
        let phrase = |t: &String| {
            if t.contains(' ') {
                format!("\"{}\"", t)
            } else {
                t.clone()
            }
        };

        let include: Vec<String> = query.include().iter().map(phrase).collect();
        let mut expr = if include.len() == 1 {
            include[0].clone()
        } else {
            format!("({})", include.join(" | "))
        };
        for term in query.exclude() {
            expr.push_str(&format!(" +-{}", phrase(term)));
        }
        expr
    }

    fn to_publications(&self, data: Vec<serde_json::Value>, query: &Query) -> Vec<Publication> {
        let papers: Vec<S2Paper> = decode_entries(self.id(), data);
        let records = papers.into_iter().filter_map(|paper| {
            let title = paper.title?.trim().to_string();
            if title.is_empty() {
                return None;
            }
            let authors = paper.authors.into_iter().filter_map(|a| a.name).collect();
            Some((
                title,
                paper.year.unwrap_or(0),
                authors,
                paper.r#abstract.unwrap_or_default(),
            ))
        });
        number_items(self.id(), query, records)
    }
}

#[async_trait]
impl Provider for SemanticScholarProvider {
    fn id(&self) -> &str {
        "semantic"
    }

    fn name(&self) -> &str {
        "Semantic Scholar"
    }

    fn base_locator(&self) -> &str {
        &self.base
    }

    fn http(&self) -> &dyn HttpFetch {
        self.http.as_ref()
    }

    fn pagination(&self) -> PaginationUnit {
        PaginationUnit::Cursor
    }

    fn request_headers(&self) -> Vec<(&'static str, String)> {
        self.api_key
            .iter()
            .map(|key| ("x-api-key", key.clone()))
            .collect()
    }

    fn generate_locator(&self, query: &Query) -> String {
        let mut url = format!(
            "{}query={}&fields=title,year,authors,abstract,url&sort=publicationDate:desc&openAccessPdf",
            self.base,
            urlencoding::encode(&Self::search_expression(query))
        );
        if let Some(token) = query.cursor() {
            url.push_str(&format!("&token={}", urlencoding::encode(token)));
        }
        url
    }

    fn extract_items(&self, payload: &str, query: &Query) -> Result<Vec<Publication>, SourceError> {
        let response: S2BulkResponse = serde_json::from_str(payload)?;
        Ok(self.to_publications(response.data, query))
    }

    fn build_page(&self, payload: &str, query: &Query) -> Result<ResultPage, SourceError> {
        let response: S2BulkResponse = serde_json::from_str(payload)?;
        let delivered = response.data.len();
        let items = self.to_publications(response.data, query);

        // The bulk endpoint ignores the requested size; the page is whatever it sent.
        Ok(ResultPage::new(query.clone(), response.total, items)
            .items_per_page(delivered.max(1))
            .next_cursor(response.token))
    }
}

#[derive(Debug, Deserialize)]
struct S2BulkResponse {
    #[serde(default)]
    total: usize,
    token: Option<String>,
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct S2Paper {
    title: Option<String>,
    year: Option<i32>,
    #[serde(default)]
    authors: Vec<S2Author>,
    #[serde(rename = "abstract")]
    r#abstract: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockHttp;

    const PAGE_ONE: &str = r#"{
      "total": 3,
      "token": "NEXT1",
      "data": [
        {"paperId": "a", "title": "Retrieval Augmented Generation", "year": 2021,
         "authors": [{"authorId": "1", "name": "Patrick Lewis"}],
         "abstract": "We explore retrieval."},
        {"paperId": "b", "title": null, "year": 2020, "authors": []}
      ]
    }"#;

    const PAGE_TWO: &str = r#"{
      "total": 3,
      "data": [
        {"paperId": "c", "title": "Dense Passage Retrieval", "year": null,
         "authors": [{"name": "Vladimir Karpukhin"}], "abstract": null}
      ]
    }"#;

    fn query(exclude: &[&str]) -> Query {
        Query::new(
            "rag",
            "semantic",
            SEMANTIC_SCHOLAR_API_URL,
            vec!["retrieval".to_string(), "open domain".to_string()],
            exclude.iter().map(|s| s.to_string()).collect(),
            10,
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_search_expression() {
        assert_eq!(
            SemanticScholarProvider::search_expression(&query(&["vision"])),
            "(retrieval | \"open domain\") +-vision"
        );
    }

    #[test]
    fn test_locator_carries_cursor() {
        let provider = SemanticScholarProvider::new(Arc::new(MockHttp::new()));
        let first = provider.generate_locator(&query(&[]));
        assert!(first.starts_with(SEMANTIC_SCHOLAR_API_URL));
        assert!(first.contains("sort=publicationDate:desc"));
        assert!(!first.contains("token="));

        let next = query(&[]).successor(1, Some("NEXT1".to_string()));
        assert!(provider.generate_locator(&next).ends_with("&token=NEXT1"));
    }

    #[test]
    fn test_api_key_header() {
        let provider = SemanticScholarProvider::new(Arc::new(MockHttp::new()))
            .with_api_key(Some("secret".to_string()));
        assert_eq!(
            provider.request_headers(),
            vec![("x-api-key", "secret".to_string())]
        );
        let anonymous = SemanticScholarProvider::new(Arc::new(MockHttp::new()));
        assert!(anonymous.request_headers().is_empty());
    }

    #[tokio::test]
    async fn test_api_key_is_sent_with_request() {
        let http = Arc::new(MockHttp::with_bodies([PAGE_TWO]));
        let provider = SemanticScholarProvider::new(http.clone())
            .with_api_key(Some("secret".to_string()));

        provider.search_by_query(&query(&[])).await.unwrap();
        assert_eq!(
            http.headers(),
            [vec![("x-api-key".to_string(), "secret".to_string())]]
        );
    }

    #[test]
    fn test_build_page() {
        let provider = SemanticScholarProvider::new(Arc::new(MockHttp::new()));
        let page = provider.build_page(PAGE_ONE, &query(&[])).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.num_items(), 1);
        assert_eq!(page.next_cursor.as_deref(), Some("NEXT1"));
        assert_eq!(page.items[0].authors, ["Patrick Lewis"]);
        assert_eq!(page.items[0].year, 2021);
    }

    #[tokio::test]
    async fn test_search_all_follows_cursor() {
        let http = Arc::new(MockHttp::with_bodies([PAGE_ONE, PAGE_TWO]));
        let provider = SemanticScholarProvider::new(http.clone());

        let all = provider.search_all(&query(&[])).await.unwrap();
        let titles: Vec<_> = all.items.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["Retrieval Augmented Generation", "Dense Passage Retrieval"]);
        assert_eq!(all.items[1].internal_index, 1);
        assert_eq!(all.items[1].year, 0);

        let requests = http.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].contains("token=NEXT1"));
    }
}
