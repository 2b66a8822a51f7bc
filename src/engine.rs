//! Concurrent fan-out of one logical search across the configured providers.
//!
//! Every provider runs as its own future; the engine joins them and returns whatever
//! succeeded together with a structured fault for each provider that did not. One
//! provider failing, timing out or being cancelled never affects its siblings.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::watch;

use crate::models::{ResultPage, SearchParams};
use crate::sources::{Provider, ProviderRegistry, SourceError};
use crate::store::{SaveOptions, SaveReport, StoreError};
use crate::utils::{NoopProgress, ProgressSink};

/// Trigger side of a cancellation pair
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancel every search observing the paired signal
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observer side of a cancellation pair
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Create a connected handle / signal pair
    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx })
    }

    /// A signal that never fires
    pub fn never() -> Self {
        Self::pair().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested; pends forever if it never is
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// A provider that produced no page
#[derive(Debug, thiserror::Error)]
#[error("{provider}: {error}")]
pub struct ProviderFault {
    pub provider: String,
    pub error: SourceError,
}

/// Pages per provider id plus the faults of the providers that failed
#[derive(Debug, Default)]
pub struct EngineOutcome {
    pub pages: BTreeMap<String, ResultPage>,
    pub faults: Vec<ProviderFault>,
}

impl EngineOutcome {
    /// Every provider produced a page
    pub fn is_complete(&self) -> bool {
        self.faults.is_empty()
    }

    /// Records across all pages
    pub fn total_items(&self) -> usize {
        self.pages.values().map(ResultPage::num_items).sum()
    }

    /// Save each provider's page into `dir/{provider}`
    pub fn save(
        &self,
        dir: &Path,
        options: SaveOptions,
    ) -> BTreeMap<String, Result<SaveReport, StoreError>> {
        self.pages
            .iter()
            .map(|(provider, page)| (provider.clone(), page.save(&dir.join(provider), options)))
            .collect()
    }
}

/// Fans a search out across an explicit provider list
pub struct SearchEngine {
    providers: Vec<Arc<dyn Provider>>,
    provider_timeout: Option<Duration>,
    progress: Arc<dyn ProgressSink>,
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("providers", &self.providers().collect::<Vec<_>>())
            .field("provider_timeout", &self.provider_timeout)
            .finish_non_exhaustive()
    }
}

impl SearchEngine {
    /// Create an engine over the registry's providers, in registration order
    pub fn new(registry: &ProviderRegistry) -> Self {
        Self::with_providers(registry.all().cloned().collect())
    }

    /// Create an engine over an explicit provider list
    pub fn with_providers(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self {
            providers,
            provider_timeout: None,
            progress: Arc::new(NoopProgress),
        }
    }

    /// Bound each provider's whole search (pagination walk included)
    pub fn provider_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Report provider lifecycle events to `progress`
    pub fn progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Provider ids in search order
    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|p| p.id())
    }

    /// Search every provider; never fails as a whole
    pub async fn search(&self, params: &SearchParams) -> EngineOutcome {
        self.search_with_cancel(params, &CancelSignal::never()).await
    }

    /// Search every provider, stopping outstanding work when `cancel` fires
    pub async fn search_with_cancel(
        &self,
        params: &SearchParams,
        cancel: &CancelSignal,
    ) -> EngineOutcome {
        tracing::info!(
            query = %params.name,
            providers = ?self.providers().collect::<Vec<_>>(),
            "Starting search"
        );

        let searches = self.providers.iter().map(|provider| async move {
            let id = provider.id();
            self.progress.provider_started(id);

            let result = tokio::select! {
                _ = cancel.cancelled() => Err(SourceError::Cancelled),
                result = self.bounded(provider.as_ref(), params) => result,
            };
            (id.to_string(), result)
        });

        let mut outcome = EngineOutcome::default();
        for (provider, result) in join_all(searches).await {
            match result {
                Ok(page) => {
                    self.progress.provider_finished(&provider, &page);
                    outcome.pages.insert(provider, page);
                }
                Err(error) => {
                    tracing::error!(provider = %provider, "Search failed: {}", error);
                    self.progress.provider_failed(&provider, &error);
                    outcome.faults.push(ProviderFault { provider, error });
                }
            }
        }

        tracing::info!(
            query = %params.name,
            "Search finished: {} records from {} providers, {} failed",
            outcome.total_items(),
            outcome.pages.len(),
            outcome.faults.len()
        );
        outcome
    }

    async fn bounded(
        &self,
        provider: &dyn Provider,
        params: &SearchParams,
    ) -> Result<ResultPage, SourceError> {
        let work = provider.search_by_params(params);
        match self.provider_timeout {
            Some(limit) => tokio::time::timeout(limit, work).await.unwrap_or_else(|_| {
                Err(SourceError::Timeout(format!(
                    "{} did not finish within {:?}",
                    provider.id(),
                    limit
                )))
            }),
            None => work.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockProvider;
    use std::sync::Mutex;

    fn params(all: bool) -> SearchParams {
        SearchParams::new("q", ["x"]).num_items(10).all(all)
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ProgressSink for Recorder {
        fn provider_started(&self, provider: &str) {
            self.events.lock().unwrap().push(format!("start {}", provider));
        }

        fn provider_finished(&self, provider: &str, page: &ResultPage) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done {} {}", provider, page.num_items()));
        }

        fn provider_failed(&self, provider: &str, _error: &SourceError) {
            self.events.lock().unwrap().push(format!("fail {}", provider));
        }
    }

    #[tokio::test]
    async fn test_one_failing_provider_does_not_abort_others() {
        let engine = SearchEngine::with_providers(vec![
            Arc::new(MockProvider::new("alpha", 5)),
            Arc::new(MockProvider::failing("broken")),
            Arc::new(MockProvider::new("gamma", 3)),
        ]);

        let outcome = engine.search(&params(false)).await;
        assert_eq!(outcome.pages.len(), 2);
        assert_eq!(outcome.pages["alpha"].num_items(), 5);
        assert_eq!(outcome.pages["gamma"].num_items(), 3);
        assert_eq!(outcome.faults.len(), 1);
        assert_eq!(outcome.faults[0].provider, "broken");
        assert!(matches!(outcome.faults[0].error, SourceError::Network(_)));
        assert!(!outcome.is_complete());
        assert_eq!(outcome.total_items(), 8);
    }

    #[tokio::test]
    async fn test_search_all_makes_exactly_two_requests() {
        let provider = Arc::new(MockProvider::new("mock", 20));
        let engine = SearchEngine::with_providers(vec![provider.clone()]);

        let outcome = engine.search(&params(true)).await;
        let page = &outcome.pages["mock"];
        assert_eq!(provider.request_count(), 2);
        assert_eq!(page.num_items(), 20);

        // Pages overlap by one item: the second page starts at index 9
        let indices: Vec<_> = page.items.iter().map(|p| p.internal_index).collect();
        assert_eq!(indices[9], 9);
        assert_eq!(indices[10], 9);
        assert_eq!(*indices.last().unwrap(), 18);
    }

    #[tokio::test]
    async fn test_search_all_stops_when_remote_under_delivers() {
        let provider = Arc::new(MockProvider::new("stingy", 100).deliverable(15));
        let engine = SearchEngine::with_providers(vec![provider.clone()]);

        let outcome = engine.search(&params(true)).await;
        assert_eq!(outcome.pages["stingy"].total, 100);
        assert_eq!(outcome.pages["stingy"].num_items(), 16);
        assert_eq!(provider.request_count(), 3);
    }

    #[tokio::test]
    async fn test_search_all_stops_at_page_limit() {
        // The remote keeps serving the same full page, so only the page limit ends the walk
        let provider = Arc::new(
            MockProvider::new("stuck", 100)
                .ignoring_offset()
                .max_pages(3),
        );
        let engine = SearchEngine::with_providers(vec![provider.clone()]);

        let outcome = engine.search(&params(true)).await;
        assert_eq!(provider.request_count(), 3);
        assert_eq!(outcome.pages["stuck"].num_items(), 30);
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn test_cancellation_is_recorded_as_fault() {
        let engine = SearchEngine::with_providers(vec![
            Arc::new(MockProvider::new("slow", 5).delay(Duration::from_secs(30))),
            Arc::new(MockProvider::new("fast", 5)),
        ]);
        let (handle, signal) = CancelSignal::pair();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.cancel();
        });
        let outcome = engine.search_with_cancel(&params(false), &signal).await;
        canceller.await.unwrap();

        assert!(signal.is_cancelled());
        assert!(outcome.pages.contains_key("fast"));
        assert_eq!(outcome.faults.len(), 1);
        assert_eq!(outcome.faults[0].provider, "slow");
        assert!(matches!(outcome.faults[0].error, SourceError::Cancelled));
    }

    #[tokio::test]
    async fn test_provider_timeout() {
        let engine = SearchEngine::with_providers(vec![Arc::new(
            MockProvider::new("slow", 5).delay(Duration::from_secs(30)),
        )])
        .provider_timeout(Some(Duration::from_millis(50)));

        let outcome = engine.search(&params(false)).await;
        assert!(outcome.pages.is_empty());
        assert!(matches!(outcome.faults[0].error, SourceError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_progress_events() {
        let recorder = Arc::new(Recorder::default());
        let engine = SearchEngine::with_providers(vec![
            Arc::new(MockProvider::new("a", 2)),
            Arc::new(MockProvider::failing("b")),
        ])
        .progress(recorder.clone());

        engine.search(&params(false)).await;
        let events = recorder.events.lock().unwrap().clone();
        assert!(events.contains(&"start a".to_string()));
        assert!(events.contains(&"start b".to_string()));
        assert!(events.contains(&"done a 2".to_string()));
        assert!(events.contains(&"fail b".to_string()));
    }

    #[tokio::test]
    async fn test_outcome_save_writes_per_provider_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SearchEngine::with_providers(vec![
            Arc::new(MockProvider::new("a", 2)),
            Arc::new(MockProvider::new("b", 0)),
        ]);

        let outcome = engine.search(&params(false)).await;
        let reports = outcome.save(dir.path(), SaveOptions { include_index: true });

        let a = reports["a"].as_ref().unwrap();
        assert_eq!(a.saved, 2);
        assert!(dir.path().join("a").join("q.query.json").is_file());
        assert!(reports["b"].as_ref().unwrap().nothing_to_save);
        assert!(!dir.path().join("b").exists());
    }
}
