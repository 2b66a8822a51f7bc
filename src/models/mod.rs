//! Core data models: search requests, normalized records and result pages.

pub(crate) mod publication;
mod query;
mod result_page;

pub use publication::{Invalid, Publication, MIN_ABSTRACT_CHARS};
pub use query::{Query, SearchParams, DEFAULT_ITEMS_PER_PAGE};
pub use result_page::ResultPage;
