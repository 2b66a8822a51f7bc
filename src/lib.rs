//! # sota-harvest
//!
//! Aggregates bibliographic search results from several literature services into a
//! flat-file store of normalized records.
//!
//! ## Architecture
//!
//! - [`models`]: search parameters, provider queries, publications and result pages
//! - [`sources`]: the [`Provider`] trait, its implementations and the registry
//! - [`engine`]: concurrent fan-out of one search across providers
//! - [`store`]: JSON persistence of records and query descriptors
//! - [`utils`]: HTTP transport, retry, cleaning and progress reporting
//! - [`config`]: configuration management
//!
//! ```rust,no_run
//! use sota_harvest::{Config, ProviderRegistry, SaveOptions, SearchEngine, SearchParams};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let registry = ProviderRegistry::from_config(&config)?;
//! let params = SearchParams::new("llm", ["large language model"]).num_items(25);
//!
//! let outcome = SearchEngine::new(&registry).search(&params).await;
//! outcome.save(&config.store.results_dir.join("llm"), SaveOptions { include_index: true });
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod models;
pub mod sources;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use engine::{CancelHandle, CancelSignal, EngineOutcome, ProviderFault, SearchEngine};
pub use models::{Publication, Query, ResultPage, SearchParams};
pub use sources::{Provider, ProviderRegistry, SourceError};
pub use store::{Library, SaveOptions, SaveReport, Store, StoreError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
