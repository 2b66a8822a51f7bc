//! PubMed provider using the NCBI E-utilities.
//!
//! A search is two requests: `esearch` resolves the query to a page of PubMed ids and
//! the hit count, then `esummary` fetches the records for those ids. Summaries carry no
//! abstract, so PubMed records never pass the store's persistence gate on their own.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{Publication, Query, ResultPage};
use crate::sources::{
    boolean_expression, decode_entries, fetch_body, number_items, parse_year, Provider,
    SourceError,
};
use crate::utils::HttpFetch;

const EUTILS_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/";

/// PubMed provider
#[derive(Debug, Clone)]
pub struct PubMedProvider {
    http: Arc<dyn HttpFetch>,
    base: String,
}

impl PubMedProvider {
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self::with_base(http, EUTILS_URL)
    }

    /// Create with a custom base locator (for testing)
    pub fn with_base(http: Arc<dyn HttpFetch>, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into(),
        }
    }

    /// `esummary` locator for a batch of ids
    fn summary_locator(&self, ids: &[String]) -> String {
        format!(
            "{}esummary.fcgi?db=pubmed&retmode=json&id={}",
            self.base,
            ids.join(",")
        )
    }

    fn parse_search(payload: &str) -> Result<ESearchResult, SourceError> {
        let response: ESearchResponse = serde_json::from_str(payload)?;
        Ok(response.esearchresult)
    }
}

#[async_trait]
impl Provider for PubMedProvider {
    fn id(&self) -> &str {
        "pubmed"
    }

    fn name(&self) -> &str {
        "PubMed"
    }

    fn base_locator(&self) -> &str {
        &self.base
    }

    fn http(&self) -> &dyn HttpFetch {
        self.http.as_ref()
    }

    /// The `esearch` locator; summaries are fetched in a second step
    fn generate_locator(&self, query: &Query) -> String {
        format!(
            "{}esearch.fcgi?db=pubmed&retmode=json&retmax={}&retstart={}&term={}",
            self.base,
            query.items_per_page(),
            query.start_index(),
            urlencoding::encode(&boolean_expression(query.include(), query.exclude()))
        )
    }

    /// Parse an `esummary` payload, keeping the order of its `uids` list
    fn extract_items(&self, payload: &str, query: &Query) -> Result<Vec<Publication>, SourceError> {
        let response: ESummaryResponse = serde_json::from_str(payload)?;
        let mut result = response.result;

        let uids: Vec<String> = result
            .remove("uids")
            .and_then(|uids| serde_json::from_value(uids).ok())
            .unwrap_or_default();

        let docs: Vec<ESummaryDoc> = decode_entries(
            self.id(),
            uids.iter().filter_map(|uid| result.remove(uid)).collect(),
        );

        let records = docs.into_iter().filter_map(|doc| {
            let title = doc.title.trim().to_string();
            if title.is_empty() {
                return None;
            }
            let year = parse_year(&doc.pubdate).unwrap_or(0);
            let authors = doc.authors.into_iter().map(|a| a.name).collect();
            Some((title, year, authors, String::new()))
        });
        Ok(number_items(self.id(), query, records))
    }

    /// Page header from an `esearch` payload; items are filled by the summary step
    fn build_page(&self, payload: &str, query: &Query) -> Result<ResultPage, SourceError> {
        let search = Self::parse_search(payload)?;
        Ok(ResultPage::new(query.clone(), search.count()?, Vec::new())
            .items_per_page(search.retmax.parse().unwrap_or(query.items_per_page()))
            .start_index(search.retstart.parse().unwrap_or(query.start_index())))
    }

    async fn search_by_query(&self, query: &Query) -> Result<ResultPage, SourceError> {
        let url = self.generate_locator(query);
        tracing::debug!(provider = self.id(), url = %url, "Generated query");

        let body = fetch_body(self.http(), &url, &[], self.name()).await?;
        let header = self.build_page(&body, query)?;
        let ids = Self::parse_search(&body)?.idlist;
        if ids.is_empty() {
            tracing::info!(provider = self.id(), "Found {} matches, none on this page", header.total);
            return Ok(header);
        }

        let summaries = fetch_body(self.http(), &self.summary_locator(&ids), &[], self.name()).await?;
        let items = self.extract_items(&summaries, query)?;

        tracing::info!(
            provider = self.id(),
            "Found {} matches ({} on this page)",
            header.total,
            items.len()
        );
        Ok(ResultPage { items, ..header })
    }
}

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    count: String,
    #[serde(default)]
    retmax: String,
    #[serde(default)]
    retstart: String,
    #[serde(default)]
    idlist: Vec<String>,
}

impl ESearchResult {
    fn count(&self) -> Result<usize, SourceError> {
        if self.count.is_empty() {
            return Ok(0);
        }
        self.count
            .parse()
            .map_err(|_| SourceError::Parse(format!("esearch count '{}'", self.count)))
    }
}

#[derive(Debug, Deserialize)]
struct ESummaryResponse {
    #[serde(default)]
    result: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ESummaryDoc {
    #[serde(default)]
    title: String,
    #[serde(default)]
    pubdate: String,
    #[serde(default)]
    authors: Vec<ESummaryAuthor>,
}

#[derive(Debug, Deserialize)]
struct ESummaryAuthor {
    name: String,
}
