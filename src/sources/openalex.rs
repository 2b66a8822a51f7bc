//! OpenAlex provider.
//!
//! OpenAlex pages by page number and ships abstracts as an inverted index
//! (`word -> [positions]`), which is rebuilt into plain text here.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{Publication, Query, ResultPage};
use crate::sources::{
    boolean_expression, decode_entries, number_items_from, PaginationUnit, Provider, SourceError,
};
use crate::utils::HttpFetch;

const OPENALEX_API_URL: &str = "https://api.openalex.org/works?";

/// Largest page OpenAlex serves
const MAX_PER_PAGE: usize = 200;

/// OpenAlex provider
#[derive(Debug, Clone)]
pub struct OpenAlexProvider {
    http: Arc<dyn HttpFetch>,
    base: String,
    mailto: Option<String>,
}

impl OpenAlexProvider {
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self::with_base(http, OPENALEX_API_URL)
    }

    /// Create with a custom base locator (for testing)
    pub fn with_base(http: Arc<dyn HttpFetch>, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into(),
            mailto: None,
        }
    }

    /// Identify with a contact address to join the polite pool
    pub fn with_mailto(mut self, email: Option<String>) -> Self {
        self.mailto = email.filter(|e| !e.is_empty());
        self
    }

    fn to_publications(&self, results: Vec<serde_json::Value>, query: &Query) -> Vec<Publication> {
        let works: Vec<OAWork> = decode_entries(self.id(), results);
        let records = works.into_iter().filter_map(|work| {
            let title = work.title?.trim().to_string();
            if title.is_empty() {
                return None;
            }
            let authors = work
                .authorships
                .into_iter()
                .filter_map(|a| a.author.and_then(|author| author.display_name))
                .collect();
            let summary = work
                .abstract_inverted_index
                .map(|index| rebuild_abstract(&index))
                .unwrap_or_default();
            Some((title, work.publication_year.unwrap_or(0), authors, summary))
        });
        number_items_from(self.id(), query, query.page_offset(), records)
    }
}

/// Rebuild text from an inverted index of word positions
pub(crate) fn rebuild_abstract(index: &HashMap<String, Vec<usize>>) -> String {
    let mut positioned: Vec<(usize, &str)> = index
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |&p| (p, word.as_str())))
        .collect();
    positioned.sort_unstable();
    positioned
        .into_iter()
        .map(|(_, word)| word)
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Provider for OpenAlexProvider {
    fn id(&self) -> &str {
        "openalex"
    }

    fn name(&self) -> &str {
        "OpenAlex"
    }

    fn base_locator(&self) -> &str {
        &self.base
    }

    fn http(&self) -> &dyn HttpFetch {
        self.http.as_ref()
    }

    fn pagination(&self) -> PaginationUnit {
        PaginationUnit::PageNumber
    }

    fn generate_locator(&self, query: &Query) -> String {
        let mut url = format!(
            "{}search={}&per-page={}&page={}",
            self.base,
            urlencoding::encode(&boolean_expression(query.include(), query.exclude())),
            query.items_per_page().min(MAX_PER_PAGE),
            query.page_number()
        );
        if let Some(mailto) = &self.mailto {
            url.push_str(&format!("&mailto={}", urlencoding::encode(mailto)));
        }
        url
    }

    fn extract_items(&self, payload: &str, query: &Query) -> Result<Vec<Publication>, SourceError> {
        let response: OAResponse = serde_json::from_str(payload)?;
        Ok(self.to_publications(response.results, query))
    }

    fn build_page(&self, payload: &str, query: &Query) -> Result<ResultPage, SourceError> {
        let response: OAResponse = serde_json::from_str(payload)?;
        let per_page = response.meta.per_page.unwrap_or(query.items_per_page());
        let start_index = response
            .meta
            .page
            .map(|page| page.saturating_sub(1) * per_page)
            .unwrap_or(query.page_offset());
        let items = self.to_publications(response.results, query);

        Ok(ResultPage::new(query.clone(), response.meta.count, items)
            .items_per_page(per_page)
            .start_index(start_index))
    }
}

#[derive(Debug, Deserialize)]
struct OAResponse {
    meta: OAMeta,
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OAMeta {
    #[serde(default)]
    count: usize,
    page: Option<usize>,
    per_page: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct OAWork {
    title: Option<String>,
    publication_year: Option<i32>,
    #[serde(default)]
    authorships: Vec<OAAuthorship>,
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
}

#[derive(Debug, Deserialize)]
struct OAAuthorship {
    author: Option<OAAuthor>,
}

#[derive(Debug, Deserialize)]
struct OAAuthor {
    display_name: Option<String>,
}
