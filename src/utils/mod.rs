//! Utility modules supporting searches and collection maintenance.
//!
//! - [`HttpClient`] / [`HttpFetch`]: the request capability providers are given
//! - [`RetryConfig`] / [`with_retry`]: exponential backoff for transient failures
//! - [`Cleaner`]: duplicate and language filtering of loaded collections
//! - [`ProgressSink`] / [`SearchSpinner`]: per-provider progress reporting
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use sota_harvest::sources::SourceError;
//! use sota_harvest::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch_data() -> Result<String, SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let config = RetryConfig::default().max_attempts(3);
//! let body = with_retry(config, fetch_data).await?;
//! # Ok(())
//! # }
//! ```

mod dedup;
mod http;
mod progress;
mod retry;

pub use dedup::{Cleaner, LanguageDetector, StopwordDetector};
pub use http::{HttpClient, HttpFetch, HttpResponse};
pub use progress::{NoopProgress, ProgressSink, SearchSpinner};
pub use retry::{with_retry, RetryConfig, TransientError};
