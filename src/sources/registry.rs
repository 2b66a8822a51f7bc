//! Registry of the providers a search fans out to.

use std::sync::Arc;

use super::{
    ArxivProvider, CrossrefProvider, DoajProvider, EuropePmcProvider, OpenAlexProvider, Provider,
    PubMedProvider, SemanticScholarProvider, SourceError,
};
use crate::config::Config;
use crate::utils::{HttpClient, HttpFetch, RetryConfig};

/// Ids of every provider the registry can build
pub const KNOWN_PROVIDERS: &[&str] = &[
    "arxiv",
    "crossref",
    "semantic",
    "pubmed",
    "openalex",
    "doaj",
    "europe_pmc",
];

/// Ordered set of providers
///
/// Registration is explicit; there is no global registry. Providers keep the order they
/// were registered in, which is the order the engine reports them.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the providers named in `config.search.providers`, sharing one HTTP client
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let http: Arc<dyn HttpFetch> = Arc::new(HttpClient::from_config(
            &config.http,
            RetryConfig::from(&config.retry),
        )?);
        Self::from_ids(&config.search.providers, http, config)
    }

    /// Build the named providers on top of `http`
    pub fn from_ids<S: AsRef<str>>(
        ids: &[S],
        http: Arc<dyn HttpFetch>,
        config: &Config,
    ) -> Result<Self, SourceError> {
        let mut registry = Self::new();
        for id in ids {
            registry.register(Self::create(id.as_ref(), Arc::clone(&http), config)?);
        }
        Ok(registry)
    }

    /// Build a single provider by id
    pub fn create(
        id: &str,
        http: Arc<dyn HttpFetch>,
        config: &Config,
    ) -> Result<Arc<dyn Provider>, SourceError> {
        let provider: Arc<dyn Provider> = match id {
            "arxiv" => Arc::new(ArxivProvider::new(http)),
            "crossref" => Arc::new(CrossrefProvider::new(http)),
            "semantic" => Arc::new(
                SemanticScholarProvider::new(http)
                    .with_api_key(config.api_keys.semantic_scholar.clone()),
            ),
            "pubmed" => Arc::new(PubMedProvider::new(http)),
            "openalex" => Arc::new(
                OpenAlexProvider::new(http).with_mailto(config.api_keys.openalex_email.clone()),
            ),
            "doaj" => Arc::new(DoajProvider::new(http)),
            "europe_pmc" => Arc::new(EuropePmcProvider::new(http)),
            other => {
                return Err(SourceError::NotFound(format!(
                    "Provider '{}' not found (known: {})",
                    other,
                    KNOWN_PROVIDERS.join(", ")
                )))
            }
        };
        Ok(provider)
    }

    /// Register a provider, replacing any earlier one with the same id
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        match self.providers.iter().position(|p| p.id() == provider.id()) {
            Some(i) => self.providers[i] = provider,
            None => self.providers.push(provider),
        }
    }

    /// Get a provider by id
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.id() == id)
    }

    /// Get a provider by id, returning an error if not found
    pub fn get_required(&self, id: &str) -> Result<&Arc<dyn Provider>, SourceError> {
        self.get(id)
            .ok_or_else(|| SourceError::NotFound(format!("Provider '{}' not found", id)))
    }

    /// All providers in registration order
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.iter()
    }

    /// All provider ids in registration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|p| p.id())
    }

    /// Check if a provider exists
    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
