//! One fetched page of normalized results plus its pagination metadata.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::{Publication, Query};
use crate::store::{SaveOptions, SaveReport, StoreError};

/// A page of results for one query on one provider
///
/// Pages are values: accumulating a pagination walk builds a new page with
/// [`ResultPage::extended`] / [`ResultPage::fold`] instead of mutating one in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultPage {
    /// Query that produced this page
    pub query: Query,

    /// Hit count reported by the remote
    pub total: usize,

    /// Page size reported by the remote (or requested, when the remote is silent)
    pub items_per_page: usize,

    /// Offset of the first item on this page
    pub start_index: usize,

    /// Normalized records
    pub items: Vec<Publication>,

    /// Continuation token for cursor-paginated services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl ResultPage {
    /// Create a page with the query's own pagination values
    pub fn new(query: Query, total: usize, items: Vec<Publication>) -> Self {
        let items_per_page = query.items_per_page();
        let start_index = query.start_index();
        Self {
            query,
            total,
            items_per_page,
            start_index,
            items,
            next_cursor: None,
        }
    }

    /// An empty page (no hits)
    pub fn empty(query: Query) -> Self {
        Self::new(query, 0, Vec::new())
    }

    /// Override the remote-reported page size
    pub fn items_per_page(mut self, items_per_page: usize) -> Self {
        self.items_per_page = items_per_page;
        self
    }

    /// Override the remote-reported start offset
    pub fn start_index(mut self, start_index: usize) -> Self {
        self.start_index = start_index;
        self
    }

    /// Attach the remote's continuation token
    pub fn next_cursor(mut self, cursor: Option<String>) -> Self {
        self.next_cursor = cursor.filter(|c| !c.is_empty());
        self
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append `next`'s items, keeping this page's query, total and start.
    /// The continuation token follows the latest page.
    pub fn extended(mut self, next: ResultPage) -> Self {
        self.items.extend(next.items);
        self.next_cursor = next.next_cursor;
        self
    }

    /// Persist the valid records into `dir`; see [`crate::store::save_page`]
    pub fn save(&self, dir: &Path, options: SaveOptions) -> Result<SaveReport, StoreError> {
        crate::store::save_page(self, dir, options)
    }

    /// Fold a sequence of pages into one accumulated page
    pub fn fold<I>(pages: I) -> Option<Self>
    where
        I: IntoIterator<Item = ResultPage>,
    {
        let mut pages = pages.into_iter();
        let first = pages.next()?;
        Some(pages.fold(first, ResultPage::extended))
    }
}

impl std::fmt::Display for ResultPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) - {} results, {} fetched",
            self.query.name(),
            self.query.provider(),
            self.total,
            self.items.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::publication::sample;

    fn query() -> Query {
        Query::new("q", "arxiv", "b", vec!["a".to_string()], vec![], 2, 0).unwrap()
    }

    #[test]
    fn test_fold_accumulates_in_order() {
        let q = query();
        let first = ResultPage::new(q.clone(), 5, vec![sample("a", 2020, &["x"], 0)]);
        let second = ResultPage::new(q.successor(1, None), 5, vec![sample("b", 2020, &["x"], 1)])
            .next_cursor(Some("c2".to_string()));
        let third = ResultPage::new(q.successor(2, None), 5, vec![sample("c", 2020, &["x"], 2)]);

        let all = ResultPage::fold([first, second, third]).unwrap();
        let titles: Vec<_> = all.items.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["a", "b", "c"]);
        assert_eq!(all.start_index, 0);
        assert_eq!(all.total, 5);
        assert_eq!(all.next_cursor, None);
    }

    #[test]
    fn test_fold_of_nothing() {
        assert!(ResultPage::fold(Vec::new()).is_none());
    }

    #[test]
    fn test_blank_cursor_is_dropped() {
        let page = ResultPage::empty(query()).next_cursor(Some(String::new()));
        assert!(page.next_cursor.is_none());
    }
}
