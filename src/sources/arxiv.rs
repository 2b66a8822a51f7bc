//! arXiv provider.
//!
//! The arXiv API answers with an Atom feed carrying OpenSearch pagination elements
//! (`totalResults`, `startIndex`, `itemsPerPage`). The feed is read with a streaming
//! quick-xml reader matching on local element names, so namespace prefixes do not matter.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::sync::Arc;

use crate::models::{Publication, Query, ResultPage};
use crate::sources::{number_items, parse_year, Provider, SourceError};
use crate::utils::HttpFetch;

/// Base locator for the arXiv query API
const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query?";

/// arXiv provider
#[derive(Debug, Clone)]
pub struct ArxivProvider {
    http: Arc<dyn HttpFetch>,
    base: String,
}

impl ArxivProvider {
    /// Create a provider talking to the public arXiv API
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self::with_base(http, ARXIV_API_URL)
    }

    /// Create with a custom base locator (for testing)
    pub fn with_base(http: Arc<dyn HttpFetch>, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into(),
        }
    }

    /// `all:a+OR+all:b`; spaces inside a term become underscores
    fn term_group(terms: &[String]) -> String {
        terms
            .iter()
            .map(|t| format!("all:{}", urlencoding::encode(&t.replace(' ', "_"))))
            .collect::<Vec<_>>()
            .join("+OR+")
    }
}

/// Fields collected while streaming one `<entry>`
#[derive(Debug, Default)]
struct EntryFields {
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
}

/// Everything read from one feed
#[derive(Debug, Default)]
struct Feed {
    total: Option<usize>,
    start_index: Option<usize>,
    items_per_page: Option<usize>,
    entries: Vec<EntryFields>,
}

fn parse_feed(payload: &str) -> Result<Feed, SourceError> {
    let mut reader = Reader::from_str(payload);
    reader.config_mut().trim_text(true);

    let mut feed = Feed::default();
    let mut path: Vec<String> = Vec::new();
    let mut entry: Option<EntryFields> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "entry" {
                    entry = Some(EntryFields::default());
                }
                path.push(name);
            }
            Event::End(_) => {
                if path.pop().as_deref() == Some("entry") {
                    if let Some(done) = entry.take() {
                        feed.entries.push(done);
                    }
                }
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| SourceError::Parse(format!("XML: {}", e)))?;
                let current = path.last().map(String::as_str);
                let parent = path.len().checked_sub(2).map(|i| path[i].as_str());

                match (entry.as_mut(), parent, current) {
                    (Some(fields), Some("entry"), Some("title")) => fields.title.push_str(&text),
                    (Some(fields), Some("entry"), Some("summary")) => {
                        fields.summary.push_str(&text)
                    }
                    (Some(fields), Some("entry"), Some("published")) => {
                        fields.published.push_str(&text)
                    }
                    (Some(fields), Some("author"), Some("name")) => {
                        fields.authors.push(text.trim().to_string())
                    }
                    (None, _, Some("totalResults")) => feed.total = text.trim().parse().ok(),
                    (None, _, Some("startIndex")) => feed.start_index = text.trim().parse().ok(),
                    (None, _, Some("itemsPerPage")) => {
                        feed.items_per_page = text.trim().parse().ok()
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(feed)
}

#[async_trait]
impl Provider for ArxivProvider {
    fn id(&self) -> &str {
        "arxiv"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    fn base_locator(&self) -> &str {
        &self.base
    }

    fn http(&self) -> &dyn HttpFetch {
        self.http.as_ref()
    }

    fn generate_locator(&self, query: &Query) -> String {
        let mut search = Self::term_group(query.include());
        if !query.exclude().is_empty() {
            search.push_str(&format!(
                "+ANDNOT+%28{}%29",
                Self::term_group(query.exclude())
            ));
        }

        format!(
            "{}search_query={}&max_results={}&start={}&sortBy=relevance&sortOrder=descending",
            self.base,
            search,
            query.items_per_page(),
            query.start_index()
        )
    }

    fn extract_items(&self, payload: &str, query: &Query) -> Result<Vec<Publication>, SourceError> {
        let feed = parse_feed(payload)?;
        Ok(self.to_publications(feed.entries, query))
    }

    fn build_page(&self, payload: &str, query: &Query) -> Result<ResultPage, SourceError> {
        let feed = parse_feed(payload)?;
        let total = feed.total.unwrap_or(feed.entries.len());
        let items_per_page = feed.items_per_page.unwrap_or(query.items_per_page());
        let start_index = feed.start_index.unwrap_or(query.start_index());
        let items = self.to_publications(feed.entries, query);

        Ok(ResultPage::new(query.clone(), total, items)
            .items_per_page(items_per_page)
            .start_index(start_index))
    }
}

impl ArxivProvider {
    fn to_publications(&self, entries: Vec<EntryFields>, query: &Query) -> Vec<Publication> {
        let records = entries.into_iter().enumerate().filter_map(|(position, e)| {
            let title = e.title.trim().to_string();
            if title.is_empty() {
                tracing::warn!(provider = "arxiv", position, "Skipping entry without a title");
                return None;
            }
            let year = parse_year(&e.published).unwrap_or(0);
            Some((title, year, e.authors, e.summary.trim().to_string()))
        });
        number_items(self.id(), query, records)
    }
}
