//! Progress reporting for multi-provider searches.
//!
//! The engine reports provider lifecycle events to a [`ProgressSink`]. The CLI renders
//! them with an indicatif bar ([`SearchSpinner`]); library callers that do not care use
//! [`NoopProgress`].

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

use crate::models::ResultPage;
use crate::sources::SourceError;

/// Receiver of per-provider progress events
pub trait ProgressSink: Send + Sync {
    /// A provider's search has started
    fn provider_started(&self, provider: &str);

    /// A provider's search produced `page`
    fn provider_finished(&self, provider: &str, page: &ResultPage);

    /// A provider's search failed
    fn provider_failed(&self, provider: &str, error: &SourceError);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn provider_started(&self, _provider: &str) {}

    fn provider_finished(&self, _provider: &str, _page: &ResultPage) {}

    fn provider_failed(&self, _provider: &str, _error: &SourceError) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Pending,
    Done,
    Failed,
}

/// Terminal progress bar tracking parallel provider searches
#[derive(Debug)]
pub struct SearchSpinner {
    bar: ProgressBar,
    targets: Mutex<Vec<(String, Status)>>,
}

impl SearchSpinner {
    /// Create a spinner for the given provider ids
    pub fn new<S: AsRef<str>>(providers: &[S]) -> Self {
        let bar = ProgressBar::new(providers.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg}\n{spinner:.cyan} {wide_bar:.cyan/blue} {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
                .progress_chars("█  "),
        );

        let spinner = Self {
            bar,
            targets: Mutex::new(
                providers
                    .iter()
                    .map(|p| (p.as_ref().to_string(), Status::Pending))
                    .collect(),
            ),
        };
        spinner.refresh();
        spinner
    }

    /// A spinner that draws nothing (non-interactive output)
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            targets: Mutex::new(Vec::new()),
        }
    }

    fn mark(&self, provider: &str, status: Status) {
        if let Ok(mut targets) = self.targets.lock() {
            if let Some(entry) = targets.iter_mut().find(|(id, _)| id == provider) {
                entry.1 = status;
            }
        }
        self.bar.inc(1);
        self.refresh();
    }

    fn refresh(&self) {
        let Ok(targets) = self.targets.lock() else {
            return;
        };
        let parts: Vec<String> = targets
            .iter()
            .map(|(id, status)| match status {
                Status::Pending => format!("○{}", id),
                Status::Done => format!("✓{}", id),
                Status::Failed => format!("✗{}", id),
            })
            .collect();
        self.bar
            .set_message(format!("Searching [{}]", parts.join(" ")));
    }

    /// Finish the bar with a summary line
    pub fn finish(&self, records: usize, failures: usize) {
        let msg = if failures == 0 {
            format!("✓ Found {} records", records)
        } else {
            format!("Found {} records, {} provider(s) failed", records, failures)
        };
        self.bar.finish_with_message(msg);
    }
}

impl ProgressSink for SearchSpinner {
    fn provider_started(&self, provider: &str) {
        tracing::debug!(provider, "Search started");
        self.bar.tick();
    }

    fn provider_finished(&self, provider: &str, _page: &ResultPage) {
        self.mark(provider, Status::Done);
    }

    fn provider_failed(&self, provider: &str, _error: &SourceError) {
        self.mark(provider, Status::Failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Query;

    #[test]
    fn test_spinner_tracks_status() {
        let spinner = SearchSpinner::new(&["arxiv", "crossref"]);
        let query =
            Query::new("q", "arxiv", "b", vec!["a".to_string()], vec![], 10, 0).unwrap();

        spinner.provider_started("arxiv");
        spinner.provider_finished("arxiv", &ResultPage::empty(query));
        spinner.provider_failed("crossref", &SourceError::RateLimit);

        let targets = spinner.targets.lock().unwrap();
        assert_eq!(targets[0].1, Status::Done);
        assert_eq!(targets[1].1, Status::Failed);
        assert_eq!(spinner.bar.position(), 2);
    }
}
