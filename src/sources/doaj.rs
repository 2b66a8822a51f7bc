//! DOAJ (Directory of Open Access Journals) provider.
//!
//! The query expression is part of the path and pages are numbered from one.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{Publication, Query, ResultPage};
use crate::sources::{
    boolean_expression, decode_entries, number_items_from, parse_year, PaginationUnit, Provider,
    SourceError,
};
use crate::utils::HttpFetch;

const DOAJ_API_URL: &str = "https://doaj.org/api/search/articles/";

/// DOAJ provider
#[derive(Debug, Clone)]
pub struct DoajProvider {
    http: Arc<dyn HttpFetch>,
    base: String,
}

impl DoajProvider {
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self::with_base(http, DOAJ_API_URL)
    }

    /// Create with a custom base locator (for testing)
    pub fn with_base(http: Arc<dyn HttpFetch>, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into(),
        }
    }

    fn to_publications(&self, results: Vec<serde_json::Value>, query: &Query) -> Vec<Publication> {
        let articles: Vec<DoajArticle> = decode_entries(self.id(), results);
        let records = articles.into_iter().filter_map(|article| {
            let bib = article.bibjson;
            let title = bib.title?.trim().to_string();
            if title.is_empty() {
                return None;
            }
            let year = bib.year.as_deref().and_then(parse_year).unwrap_or(0);
            let authors = bib.author.into_iter().filter_map(|a| a.name).collect();
            Some((title, year, authors, bib.r#abstract.unwrap_or_default()))
        });
        number_items_from(self.id(), query, query.page_offset(), records)
    }
}

#[async_trait]
impl Provider for DoajProvider {
    fn id(&self) -> &str {
        "doaj"
    }

    fn name(&self) -> &str {
        "DOAJ"
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
        format!(
            "{}{}?page={}&pageSize={}",
            self.base,
            urlencoding::encode(&boolean_expression(query.include(), query.exclude())),
            query.page_number(),
            query.items_per_page()
        )
    }

    fn extract_items(&self, payload: &str, query: &Query) -> Result<Vec<Publication>, SourceError> {
        let response: DoajResponse = serde_json::from_str(payload)?;
        Ok(self.to_publications(response.results, query))
    }

    fn build_page(&self, payload: &str, query: &Query) -> Result<ResultPage, SourceError> {
        let response: DoajResponse = serde_json::from_str(payload)?;
        let page_size = response.page_size.unwrap_or(query.items_per_page());
        let start_index = response
            .page
            .map(|page| page.saturating_sub(1) * page_size)
            .unwrap_or(query.page_offset());
        let items = self.to_publications(response.results, query);

        Ok(ResultPage::new(query.clone(), response.total, items)
            .items_per_page(page_size)
            .start_index(start_index))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DoajResponse {
    #[serde(default)]
    total: usize,
    page: Option<usize>,
    page_size: Option<usize>,
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DoajArticle {
    bibjson: DoajBibJson,
}

#[derive(Debug, Deserialize)]
struct DoajBibJson {
    title: Option<String>,
    year: Option<String>,
    #[serde(default)]
    author: Vec<DoajAuthor>,
    #[serde(rename = "abstract")]
    r#abstract: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DoajAuthor {
    name: Option<String>,
}
