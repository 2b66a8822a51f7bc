//! Configuration management.
//!
//! Settings come from (lowest to highest precedence): built-in defaults, an optional
//! TOML file, and `SOTA__*` environment variables.
//!
//! ```toml
//! [http]
//! timeout_secs = 30
//!
//! [retry]
//! max_attempts = 3
//!
//! [search]
//! providers = ["arxiv", "crossref", "semantic"]
//! items_per_page = 25
//!
//! [store]
//! results_dir = "./results"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix (`SOTA__SEARCH__ITEMS_PER_PAGE=50`)
pub const ENV_PREFIX: &str = "SOTA";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Outbound request settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Per-request retry settings
    #[serde(default)]
    pub retry: RetrySettings,

    /// Search defaults
    #[serde(default)]
    pub search: SearchConfig,

    /// Result store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Optional credentials / polite-pool contacts
    #[serde(default)]
    pub api_keys: ApiKeys,
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

/// Search defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Provider ids to query, in order
    #[serde(default = "default_providers")]
    pub providers: Vec<String>,

    #[serde(default = "default_items_per_page")]
    pub items_per_page: usize,

    /// Optional deadline for one provider's whole search (seconds)
    #[serde(default)]
    pub provider_timeout_secs: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            items_per_page: default_items_per_page(),
            provider_timeout_secs: None,
        }
    }
}

fn default_providers() -> Vec<String> {
    vec![
        "arxiv".to_string(),
        "crossref".to_string(),
        "semantic".to_string(),
    ]
}

fn default_items_per_page() -> usize {
    crate::models::DEFAULT_ITEMS_PER_PAGE
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
        }
    }
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("./results")
}

/// API keys and contact addresses for external services
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiKeys {
    /// Semantic Scholar API key (optional, for higher rate limits)
    #[serde(default)]
    pub semantic_scholar: Option<String>,

    /// Contact email for the OpenAlex polite pool
    #[serde(default)]
    pub openalex_email: Option<String>,
}

impl Config {
    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Load configuration, layering an optional file under environment variables
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("search.providers")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

/// Look for a config file in the default locations
///
/// Checks `./sota.toml`, then `<config dir>/sota-harvest/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("sota.toml");
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join(env!("CARGO_PKG_NAME")).join("config.toml"))
        .filter(|path| path.is_file())
}
