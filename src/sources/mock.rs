//! Mock transport and provider for testing purposes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::models::{Publication, Query, ResultPage};
use crate::sources::{decode_entries, Provider, SourceError, DEFAULT_MAX_PAGES};
use crate::utils::{HttpFetch, HttpResponse};

/// An [`HttpFetch`] that replays canned responses in order and records every request.
#[derive(Debug, Default)]
pub struct MockHttp {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<String>>,
    headers: Mutex<Vec<Vec<(String, String)>>>,
}

impl MockHttp {
    /// Create a transport with no canned responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport that answers with `bodies` as 200 responses, in order
    pub fn with_bodies<I, S>(bodies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        for body in bodies {
            mock.push(HttpResponse::ok(body));
        }
        mock
    }

    /// Queue a response
    pub fn push(&self, response: HttpResponse) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }

    /// URLs requested so far
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Headers sent with each request, in request order
    pub fn headers(&self) -> Vec<Vec<(String, String)>> {
        self.headers
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HttpFetch for MockHttp {
    async fn get(&self, url: &str) -> Result<HttpResponse, SourceError> {
        self.get_with_headers(url, &[]).await
    }

    async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
    ) -> Result<HttpResponse, SourceError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        if let Ok(mut sent) = self.headers.lock() {
            sent.push(
                headers
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.clone()))
                    .collect(),
            );
        }

        self.responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .ok_or_else(|| SourceError::Network(format!("no canned response for {}", url)))
    }
}

/// Wire format of the mock provider's payloads
#[derive(Debug, Serialize, Deserialize)]
struct MockPayload {
    total: usize,
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MockEntry {
    title: String,
    year: i32,
    authors: Vec<String>,
    #[serde(rename = "abstract")]
    summary: String,
}

/// A scriptable provider that synthesizes results without touching the network.
///
/// It reports `total` hits but only ever delivers the first `deliverable` of them, which
/// lets tests exercise both normal pagination and a remote that under-delivers.
#[derive(Debug)]
pub struct MockProvider {
    id: String,
    total: usize,
    deliverable: usize,
    fail: bool,
    delay: Option<Duration>,
    ignore_offset: bool,
    max_pages: usize,
    requests: AtomicUsize,
    http: MockHttp,
}

impl MockProvider {
    /// A provider reporting and delivering `total` results
    pub fn new(id: impl Into<String>, total: usize) -> Self {
        Self {
            id: id.into(),
            total,
            deliverable: total,
            fail: false,
            delay: None,
            ignore_offset: false,
            max_pages: DEFAULT_MAX_PAGES,
            requests: AtomicUsize::new(0),
            http: MockHttp::new(),
        }
    }

    /// A provider whose every request fails with a network error
    pub fn failing(id: impl Into<String>) -> Self {
        Self {
            fail: true,
            ..Self::new(id, 0)
        }
    }

    /// Deliver only the first `deliverable` results, whatever the reported total
    pub fn deliverable(mut self, deliverable: usize) -> Self {
        self.deliverable = deliverable.min(self.total);
        self
    }

    /// Wait `delay` before answering each request
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer every request with the first page, whatever offset it asks for
    pub fn ignoring_offset(mut self) -> Self {
        self.ignore_offset = true;
        self
    }

    /// Limit pagination walks to `max_pages` pages
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Number of requests issued so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn render(&self, query: &Query) -> Result<String, SourceError> {
        let start = if self.ignore_offset {
            0
        } else {
            query.start_index()
        };
        let end = (start + query.items_per_page()).min(self.deliverable);
        let items = (start..end.max(start))
            .map(|i| {
                serde_json::to_value(MockEntry {
                    title: format!("Mock result {}", i),
                    year: 2020,
                    authors: vec![format!("Author {}", i)],
                    summary: format!(
                        "Synthetic abstract number {} produced by the mock provider. {}",
                        i,
                        "It is long enough to pass the persistence gate without trouble."
                    ),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(serde_json::to_string(&MockPayload {
            total: self.total,
            items,
        })?)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Mock Provider"
    }

    fn base_locator(&self) -> &str {
        "mock://search?"
    }

    fn http(&self) -> &dyn HttpFetch {
        &self.http
    }

    fn max_pages(&self) -> usize {
        self.max_pages
    }

    fn generate_locator(&self, query: &Query) -> String {
        format!(
            "{}start={}&rows={}",
            self.base_locator(),
            query.start_index(),
            query.items_per_page()
        )
    }

    fn extract_items(&self, payload: &str, query: &Query) -> Result<Vec<Publication>, SourceError> {
        let payload: MockPayload = serde_json::from_str(payload)?;
        let entries: Vec<MockEntry> = decode_entries(&self.id, payload.items);
        Ok(super::number_items(
            &self.id,
            query,
            entries
                .into_iter()
                .map(|e| (e.title, e.year, e.authors, e.summary)),
        ))
    }

    fn build_page(&self, payload: &str, query: &Query) -> Result<ResultPage, SourceError> {
        let total = serde_json::from_str::<MockPayload>(payload)?.total;
        let items = self.extract_items(payload, query)?;
        Ok(ResultPage::new(query.clone(), total, items))
    }

    async fn search_by_query(&self, query: &Query) -> Result<ResultPage, SourceError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(provider = %self.id, url = %self.generate_locator(query), "Mock request");

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(SourceError::Network(format!("{} is unreachable", self.id)));
        }

        let payload = self.render(query)?;
        self.build_page(&payload, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchParams;

    #[tokio::test]
    async fn test_mock_http_replays_in_order() {
        let http = MockHttp::with_bodies(["one", "two"]);
        assert_eq!(http.get("a").await.unwrap().body, "one");
        assert_eq!(http.get("b").await.unwrap().body, "two");
        assert!(http.get("c").await.is_err());
        assert_eq!(http.requests(), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_mock_http_records_headers() {
        let http = MockHttp::with_bodies(["one", "two"]);
        http.get("a").await.unwrap();
        http.get_with_headers("b", &[("x-api-key", "k".to_string())])
            .await
            .unwrap();
        assert_eq!(
            http.headers(),
            [vec![], vec![("x-api-key".to_string(), "k".to_string())]]
        );
    }

    #[tokio::test]
    async fn test_single_page() {
        let provider = MockProvider::new("mock", 25);
        let page = provider
            .search_by_params(&SearchParams::new("q", ["x"]))
            .await
            .unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.num_items(), 10);
        assert_eq!(page.items[0].id(), "q-mock-000");
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_provider() {
        let provider = MockProvider::failing("down");
        let result = provider
            .search_by_params(&SearchParams::new("q", ["x"]))
            .await;
        assert!(matches!(result, Err(SourceError::Network(_))));
    }
}
