//! The batch loop: scrape a list of restaurants one after the other with one browser session.
//!
//! A restaurant that fails is logged and skipped, it never takes the batch down. After every
//! restaurant that succeeds, the whole result list so far is handed to the sink. That is also the
//! only point where a shutdown request is honoured.

use crate::{
    models::RestaurantRecord,
    output::RecordSink,
    scrape::{RecordScraper, ScrapeOpts},
    session::Session,
    signals::Signal,
    sites::Profile,
};
use anyhow::{Context, Result};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{error, info, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUrl {
    pub url: Url,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// URLs in the list
    pub total: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedUrl>,
    /// Restaurants whose reviews ended on something other than the last page
    pub incomplete: usize,
    /// Stopped early on a shutdown signal
    pub interrupted: bool,
}

pub struct Batch<'a> {
    profile: &'a Profile,
    opts: &'a ScrapeOpts,
}

impl<'a> Batch<'a> {
    pub fn new(profile: &'a Profile, opts: &'a ScrapeOpts) -> Self {
        Self { profile, opts }
    }

    /// Scrape all `urls` in order. Only failing to save the final result list is an error.
    #[tracing::instrument(skip_all, fields(urls = urls.len()))]
    pub async fn run<S, K>(
        &self,
        session: &mut S,
        urls: &[Url],
        sink: &mut K,
        mut shutdown: Option<broadcast::Receiver<Signal>>,
    ) -> Result<BatchSummary>
    where
        S: Session,
        K: RecordSink,
    {
        let mut summary = BatchSummary {
            total: urls.len(),
            ..Default::default()
        };
        let mut records: Vec<RestaurantRecord> = Vec::new();
        let mut unsaved = true;

        for (i, url) in urls.iter().enumerate() {
            if shutdown_requested(&mut shutdown) {
                warn!(remaining = urls.len() - i, "Stopping batch on shutdown request");
                summary.interrupted = true;
                break;
            }

            info!(n = i + 1, total = urls.len(), url = %url, "Scraping restaurant");
            match RecordScraper::new(session, self.profile, self.opts)
                .scrape(url)
                .await
            {
                Ok(scraped) => {
                    summary.succeeded += 1;
                    if !scraped.completion.is_natural() {
                        summary.incomplete += 1;
                    }
                    records.push(scraped.record);
                    // a failed save is retried with the full list after the next restaurant
                    unsaved = match sink.persist(&records) {
                        Ok(()) => false,
                        Err(e) => {
                            error!(err = %e, records = records.len(), "Failed to save results");
                            true
                        }
                    };
                }
                Err(e) => {
                    error!(url = %url, err = %e, "Failed to scrape restaurant");
                    summary.failed.push(FailedUrl {
                        url: url.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if unsaved {
            sink.persist(&records).context("Failed to save results")?;
        }

        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed.len(),
            incomplete = summary.incomplete,
            interrupted = summary.interrupted,
            "Batch done"
        );
        Ok(summary)
    }
}

fn shutdown_requested(rx: &mut Option<broadcast::Receiver<Signal>>) -> bool {
    match rx.as_mut().map(|rx| rx.try_recv()) {
        Some(Ok(Signal::Shutdown)) => true,
        Some(Err(TryRecvError::Lagged(_))) => true,
        Some(Err(TryRecvError::Closed)) => {
            // the listener is gone, stop asking
            *rx = None;
            false
        }
        Some(Err(TryRecvError::Empty)) | None => false,
    }
}
