//! Search request models.
//!
//! [`SearchParams`] is the provider-independent request a caller hands to the engine.
//! [`Query`] is the immutable, provider-specific descriptor a provider builds from it;
//! pagination creates a new `Query` per step rather than changing an existing one.

use serde::{Deserialize, Serialize};

use crate::sources::SourceError;

/// Default number of items requested per page
pub const DEFAULT_ITEMS_PER_PAGE: usize = 10;

/// Provider-independent search parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Logical query name (used for ids and the result directory)
    pub name: String,

    /// Terms to include, OR-combined by providers
    pub include: Vec<String>,

    /// Terms to exclude (dropped with a warning by providers without NOT support)
    pub exclude: Vec<String>,

    /// Items per page
    pub num_items: usize,

    /// Start offset of the first page
    pub offset: usize,

    /// Walk pagination to exhaustion instead of fetching a single page
    pub all: bool,
}

impl SearchParams {
    /// Create parameters with the given name and include terms
    pub fn new<I, S>(name: impl Into<String>, include: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            include: include.into_iter().map(Into::into).collect(),
            exclude: Vec::new(),
            num_items: DEFAULT_ITEMS_PER_PAGE,
            offset: 0,
            all: false,
        }
    }

    /// Set the exclude terms
    pub fn exclude<I, S>(mut self, exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = exclude.into_iter().map(Into::into).collect();
        self
    }

    /// Set items per page
    pub fn num_items(mut self, num_items: usize) -> Self {
        self.num_items = num_items;
        self
    }

    /// Set the first page's offset
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Request the full pagination walk
    pub fn all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }
}

/// Immutable provider-specific search request descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    name: String,
    provider: String,
    base: String,
    include: Vec<String>,
    exclude: Vec<String>,
    items_per_page: usize,
    start_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cursor: Option<String>,
}

impl Query {
    /// Build a query, rejecting empty include terms and a zero page size
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<String>,
        base: impl Into<String>,
        include: Vec<String>,
        exclude: Vec<String>,
        items_per_page: usize,
        start_index: usize,
    ) -> Result<Self, SourceError> {
        let include: Vec<String> = include
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if include.is_empty() {
            return Err(SourceError::InvalidRequest(
                "at least one include term is required".to_string(),
            ));
        }
        if items_per_page == 0 {
            return Err(SourceError::InvalidRequest(
                "items per page must be greater than zero".to_string(),
            ));
        }

        let exclude = exclude
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        Ok(Self {
            name: name.into(),
            provider: provider.into(),
            base: base.into(),
            include,
            exclude,
            items_per_page,
            start_index,
            cursor: None,
        })
    }

    /// Build the query for `params` against the given provider and base locator
    pub fn from_params(
        params: &SearchParams,
        provider: &str,
        base: &str,
    ) -> Result<Self, SourceError> {
        Self::new(
            params.name.clone(),
            provider,
            base,
            params.include.clone(),
            params.exclude.clone(),
            params.num_items,
            params.offset,
        )
    }

    /// The next query in a pagination walk; `self` is left untouched
    pub fn successor(&self, start_index: usize, cursor: Option<String>) -> Self {
        Self {
            start_index,
            cursor,
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    pub fn items_per_page(&self) -> usize {
        self.items_per_page
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Continuation token for cursor-paginated services
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// One-based page number for page-numbered services
    pub fn page_number(&self) -> usize {
        self.start_index.div_ceil(self.items_per_page) + 1
    }

    /// Item offset of the first item on the page `page_number` addresses
    pub fn page_offset(&self) -> usize {
        (self.page_number() - 1) * self.items_per_page
    }

    /// File name of the persisted descriptor
    pub fn descriptor_file_name(&self) -> String {
        format!("{}.query.json", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(t: &[&str]) -> Vec<String> {
        t.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rejects_empty_include() {
        let err = Query::new("q", "arxiv", "http://x?", vec![], vec![], 10, 0).unwrap_err();
        assert!(matches!(err, SourceError::InvalidRequest(_)));

        let err = Query::new("q", "arxiv", "http://x?", terms(&["  ", ""]), vec![], 10, 0)
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidRequest(_)));
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let err = Query::new("q", "arxiv", "http://x?", terms(&["a"]), vec![], 0, 0).unwrap_err();
        assert!(matches!(err, SourceError::InvalidRequest(_)));
    }

    #[test]
    fn test_successor_leaves_original_untouched() {
        let q = Query::new("q", "arxiv", "b", terms(&["a", "b"]), terms(&["c"]), 10, 0).unwrap();
        let next = q.successor(9, Some("tok".to_string()));

        assert_eq!(q.start_index(), 0);
        assert_eq!(q.cursor(), None);
        assert_eq!(next.start_index(), 9);
        assert_eq!(next.cursor(), Some("tok"));
        assert_eq!(next.include(), q.include());
        assert_eq!(next.exclude(), q.exclude());
        assert_eq!(next.name(), "q");
    }

    #[test]
    fn test_page_number() {
        let q = Query::new("q", "doaj", "b", terms(&["a"]), vec![], 10, 0).unwrap();
        assert_eq!(q.page_number(), 1);
        assert_eq!(q.successor(9, None).page_number(), 2);
        assert_eq!(q.successor(10, None).page_number(), 2);
        assert_eq!(q.successor(18, None).page_number(), 3);
    }

    #[test]
    fn test_page_offset_is_page_aligned() {
        let q = Query::new("q", "doaj", "b", terms(&["a"]), vec![], 10, 0).unwrap();
        assert_eq!(q.page_offset(), 0);
        assert_eq!(q.successor(9, None).page_offset(), 10);
        assert_eq!(q.successor(10, None).page_offset(), 10);
        assert_eq!(q.successor(11, None).page_offset(), 20);
    }

    #[test]
    fn test_from_params_keeps_term_order() {
        let params = SearchParams::new("llm", ["transformers", "attention"])
            .exclude(["vision"])
            .num_items(25)
            .offset(50);
        let q = Query::from_params(&params, "crossref", "https://api").unwrap();
        assert_eq!(q.include(), &["transformers", "attention"]);
        assert_eq!(q.exclude(), &["vision"]);
        assert_eq!(q.items_per_page(), 25);
        assert_eq!(q.start_index(), 50);
        assert_eq!(q.descriptor_file_name(), "llm.query.json");
    }
}
