//! Europe PMC provider.
//!
//! Europe PMC indexes PubMed, PMC and preprints. It pages with `cursorMark`: the first
//! request sends `*` and each response names the mark for the next one.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{Publication, Query, ResultPage};
use crate::sources::{
    boolean_expression, decode_entries, number_items, parse_year, PaginationUnit, Provider,
    SourceError,
};
use crate::utils::HttpFetch;

const EUROPE_PMC_SEARCH_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest/search?";

/// Cursor mark of the first page
const FIRST_CURSOR: &str = "*";

/// Europe PMC provider
#[derive(Debug, Clone)]
pub struct EuropePmcProvider {
    http: Arc<dyn HttpFetch>,
    base: String,
}

impl EuropePmcProvider {
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self::with_base(http, EUROPE_PMC_SEARCH_URL)
    }

    /// Create with a custom base locator (for testing)
    pub fn with_base(http: Arc<dyn HttpFetch>, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into(),
        }
    }

    fn to_publications(&self, results: Vec<serde_json::Value>, query: &Query) -> Vec<Publication> {
        let results: Vec<EpmcResult> = decode_entries(self.id(), results);
        let records = results.into_iter().filter_map(|result| {
            let title = result.title?.trim().to_string();
            if title.is_empty() {
                return None;
            }
            let year = result.pub_year.as_deref().and_then(parse_year).unwrap_or(0);
            let authors = match result.author_list {
                Some(list) if !list.author.is_empty() => {
                    list.author.into_iter().filter_map(|a| a.full_name).collect()
                }
                _ => split_author_string(result.author_string.as_deref().unwrap_or_default()),
            };
            Some((title, year, authors, result.abstract_text.unwrap_or_default()))
        });
        number_items(self.id(), query, records)
    }
}

/// Split `"Smith J, Doe A."` into names
fn split_author_string(authors: &str) -> Vec<String> {
    authors
        .trim_end_matches('.')
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl Provider for EuropePmcProvider {
    fn id(&self) -> &str {
        "europe_pmc"
    }

    fn name(&self) -> &str {
        "Europe PMC"
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

    fn generate_locator(&self, query: &Query) -> String {
        format!(
            "{}query={}&format=json&resultType=core&pageSize={}&cursorMark={}",
            self.base,
            urlencoding::encode(&boolean_expression(query.include(), query.exclude())),
            query.items_per_page(),
            urlencoding::encode(query.cursor().unwrap_or(FIRST_CURSOR))
        )
    }

    fn extract_items(&self, payload: &str, query: &Query) -> Result<Vec<Publication>, SourceError> {
        let response: EpmcResponse = serde_json::from_str(payload)?;
        Ok(self.to_publications(response.result_list.result, query))
    }

    fn build_page(&self, payload: &str, query: &Query) -> Result<ResultPage, SourceError> {
        let response: EpmcResponse = serde_json::from_str(payload)?;

        // The last page repeats the mark it was requested with.
        let current = query.cursor().unwrap_or(FIRST_CURSOR);
        let next_cursor = response.next_cursor_mark.filter(|mark| mark != current);
        let items = self.to_publications(response.result_list.result, query);

        Ok(ResultPage::new(query.clone(), response.hit_count, items).next_cursor(next_cursor))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcResponse {
    #[serde(default)]
    hit_count: usize,
    next_cursor_mark: Option<String>,
    #[serde(default)]
    result_list: EpmcResultList,
}

#[derive(Debug, Default, Deserialize)]
struct EpmcResultList {
    #[serde(default)]
    result: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcResult {
    title: Option<String>,
    pub_year: Option<String>,
    author_string: Option<String>,
    author_list: Option<EpmcAuthorList>,
    abstract_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EpmcAuthorList {
    #[serde(default)]
    author: Vec<EpmcAuthor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcAuthor {
    full_name: Option<String>,
}
