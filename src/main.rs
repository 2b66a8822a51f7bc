use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use sota_harvest::config::{find_config_file, load_config, Config};
use sota_harvest::engine::{CancelSignal, SearchEngine};
use sota_harvest::models::SearchParams;
use sota_harvest::sources::ProviderRegistry;
use sota_harvest::store::{SaveOptions, Store};
use sota_harvest::utils::{Cleaner, HttpClient, HttpFetch, RetryConfig, SearchSpinner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// sota - harvest literature search results into a flat-file store
#[derive(Parser, Debug)]
#[command(name = "sota")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Aggregate literature search results from several services", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Log output format
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root directory of the result store (overrides the configured one)
    #[arg(long, visible_alias = "dir", global = true)]
    results_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search every configured provider
    #[command(alias = "s")]
    Search {
        /// Terms to include (OR-combined)
        #[arg(required = true)]
        terms: Vec<String>,

        /// Logical query name, used for record ids and the result directory
        #[arg(long)]
        name: String,

        /// Terms to exclude (repeatable)
        #[arg(long, short = 'x')]
        exclude: Vec<String>,

        /// Items per page (defaults to the configured value)
        #[arg(long, short = 'n')]
        num_items: Option<usize>,

        /// Offset of the first page
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Walk every page instead of fetching one
        #[arg(long)]
        all: bool,

        /// Persist the results under the store
        #[arg(long)]
        save: bool,

        /// Provider to query (repeatable, overrides the configured list)
        #[arg(long, short = 'p')]
        provider: Vec<String>,

        /// Deadline in seconds for each provider's whole search
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Build a cleaned collection from a query's saved results
    DbBuild {
        /// Query name whose results are loaded
        #[arg(long)]
        query: String,

        /// Output collection name (defaults to `{query}-db`)
        #[arg(long)]
        name: Option<String>,
    },

    /// Delete saved results
    #[command(group(ArgGroup::new("target").required(true).args(["query", "all"])))]
    Clean {
        /// Query whose result directory is deleted
        #[arg(long)]
        query: Option<String>,

        /// Delete the whole result store
        #[arg(long)]
        all: bool,

        /// Confirm deleting the whole result store
        #[arg(long)]
        yes: bool,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config_path = cli.config.clone().or_else(find_config_file);
    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }
    let config = load_config(config_path.as_deref()).context("Failed to load configuration")?;

    let results_dir = cli
        .results_dir
        .clone()
        .unwrap_or_else(|| config.store.results_dir.clone());

    match cli.command {
        Commands::Search {
            terms,
            name,
            exclude,
            num_items,
            offset,
            all,
            save,
            provider,
            timeout,
        } => {
            let params = SearchParams::new(name, terms)
                .exclude(exclude)
                .num_items(num_items.unwrap_or(config.search.items_per_page))
                .offset(offset)
                .all(all);
            let providers = if provider.is_empty() {
                config.search.providers.clone()
            } else {
                provider
            };
            let timeout = timeout.or(config.search.provider_timeout_secs);

            run_search(&config, &params, &providers, timeout, save, &results_dir, cli.quiet).await
        }
        Commands::DbBuild { query, name } => {
            let name = name.unwrap_or_else(|| format!("{}-db", query));
            build_db(&Store::new(results_dir), &query, &name)
        }
        Commands::Clean { query, all, yes } => match (query, all) {
            (Some(query), _) => remove_dir(&results_dir.join(query)),
            (None, true) if yes => remove_dir(&results_dir),
            (None, true) => bail!(
                "Refusing to delete {} without --yes",
                results_dir.display()
            ),
            (None, false) => bail!("Specify --query NAME or --all --yes"),
        },
        Commands::ShowConfig => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn init_tracing(cli: &Cli) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sota_harvest={}", level)));
    let registry = tracing_subscriber::registry().with(filter);

    match cli.log_format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

async fn run_search(
    config: &Config,
    params: &SearchParams,
    providers: &[String],
    timeout: Option<u64>,
    save: bool,
    results_dir: &Path,
    quiet: bool,
) -> Result<()> {
    let http: Arc<dyn HttpFetch> = Arc::new(HttpClient::from_config(
        &config.http,
        RetryConfig::from(&config.retry),
    )?);
    let registry = ProviderRegistry::from_ids(providers, http, config)?;
    if registry.is_empty() {
        bail!("No providers configured");
    }

    let ids: Vec<&str> = registry.ids().collect();
    let spinner = Arc::new(if quiet {
        SearchSpinner::hidden()
    } else {
        SearchSpinner::new(&ids)
    });

    let engine = SearchEngine::new(&registry)
        .provider_timeout(timeout.map(Duration::from_secs))
        .progress(spinner.clone());

    let (handle, signal) = CancelSignal::pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling outstanding searches");
            handle.cancel();
        }
    });

    let outcome = engine.search_with_cancel(params, &signal).await;
    spinner.finish(outcome.total_items(), outcome.faults.len());

    for (provider, page) in &outcome.pages {
        println!(
            "{:<12} {:>6} fetched of {:>8} reported",
            provider,
            page.num_items(),
            page.total
        );
    }
    for fault in &outcome.faults {
        eprintln!("{:<12} failed: {}", fault.provider, fault.error);
    }

    if save {
        let dir = results_dir.join(&params.name);
        for (provider, report) in outcome.save(&dir, SaveOptions { include_index: true }) {
            match report {
                Ok(report) => println!("{:<12} {}", provider, report),
                Err(e) => {
                    tracing::error!(provider = %provider, "Save failed: {}", e);
                    eprintln!("{:<12} save failed: {}", provider, e);
                }
            }
        }
    }

    if outcome.pages.is_empty() && !outcome.faults.is_empty() {
        bail!("Every provider failed");
    }
    Ok(())
}

fn build_db(store: &Store, query: &str, name: &str) -> Result<()> {
    let report = store.load(query)?;
    if !report.failures.is_empty() {
        tracing::warn!("{} record files could not be read", report.failures.len());
    }
    if report.publications.is_empty() {
        bail!("No records found under {}", store.dir(query).display());
    }

    let loaded = report.publications.len();
    let cleaned = Cleaner::default().clean(report.publications);
    let saved = store.save(&cleaned, name)?;

    println!(
        "Built {} from {} records of {} ({})",
        store.dir(name).display(),
        loaded,
        query,
        saved
    );
    Ok(())
}

fn remove_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        println!("Nothing to clean at {}", dir.display());
        return Ok(());
    }
    std::fs::remove_dir_all(dir).with_context(|| format!("Failed to delete {}", dir.display()))?;
    println!("Deleted {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_search_command() {
        let cli = Cli::parse_from(["sota", "search", "llm", "large model", "--name", "q"]);
        match cli.command {
            Commands::Search {
                terms,
                name,
                num_items,
                offset,
                all,
                save,
                ..
            } => {
                assert_eq!(terms, ["llm", "large model"]);
                assert_eq!(name, "q");
                assert_eq!(num_items, None);
                assert_eq!(offset, 0);
                assert!(!all);
                assert!(!save);
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_search_with_options() {
        let cli = Cli::parse_from([
            "sota", "search", "llm", "--name", "q", "-x", "vision", "-x", "audio", "-n", "25",
            "--offset", "50", "--all", "--save", "-p", "arxiv", "-p", "doaj", "--timeout", "60",
        ]);
        match cli.command {
            Commands::Search {
                exclude,
                num_items,
                offset,
                all,
                save,
                provider,
                timeout,
                ..
            } => {
                assert_eq!(exclude, ["vision", "audio"]);
                assert_eq!(num_items, Some(25));
                assert_eq!(offset, 50);
                assert!(all);
                assert!(save);
                assert_eq!(provider, ["arxiv", "doaj"]);
                assert_eq!(timeout, Some(60));
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_search_requires_terms_and_name() {
        assert!(Cli::try_parse_from(["sota", "search", "--name", "q"]).is_err());
        assert!(Cli::try_parse_from(["sota", "search", "llm"]).is_err());
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "sota",
            "-vv",
            "--log-format",
            "json",
            "--dir",
            "/tmp/results",
            "show-config",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.results_dir, Some(PathBuf::from("/tmp/results")));
        assert!(matches!(cli.command, Commands::ShowConfig));
    }

    #[test]
    fn test_cli_db_build() {
        let cli = Cli::parse_from(["sota", "db-build", "--query", "llm"]);
        match cli.command {
            Commands::DbBuild { query, name } => {
                assert_eq!(query, "llm");
                assert!(name.is_none());
            }
            _ => panic!("Expected DbBuild command"),
        }
    }

    #[test]
    fn test_cli_clean_requires_target() {
        assert!(Cli::try_parse_from(["sota", "clean"]).is_err());
        assert!(Cli::try_parse_from(["sota", "clean", "--query", "q", "--all"]).is_err());

        let cli = Cli::parse_from(["sota", "clean", "--all", "--yes"]);
        assert!(matches!(
            cli.command,
            Commands::Clean {
                query: None,
                all: true,
                yes: true
            }
        ));
    }

    #[test]
    fn test_remove_missing_dir_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_dir(&dir.path().join("absent")).is_ok());

        let target = dir.path().join("q");
        std::fs::create_dir_all(target.join("arxiv")).unwrap();
        remove_dir(&target).unwrap();
        assert!(!target.exists());
    }
}
