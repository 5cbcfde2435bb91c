// Result sink: consumes the crawler's result stream and enforces quotas

use crate::control::StopReason;
use delve_scanner::CrawlResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// What the sink does when the crawler reports that nothing is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DonePolicy {
    /// Cancel the crawl, ending the run immediately.
    #[default]
    Cancel,
    /// Stop consuming but leave the crawl running until the deadline or an
    /// interrupt ends it.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub max_results: usize,
    pub max_errors: usize,
    pub on_done: DonePolicy,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            max_results: 50,
            max_errors: 5,
            on_done: DonePolicy::Cancel,
        }
    }
}

/// Callback invoked with every consumed result, before quota accounting.
pub type ResultObserver = Arc<dyn Fn(&CrawlResult) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct SinkOutcome {
    pub pages: Vec<PageRecord>,
    pub failures: Vec<FailureRecord>,
    pub stop_reason: StopReason,
}

/// Consume results until a quota runs out, the crawler reports `Done`, or the
/// crawl is cancelled from elsewhere.
///
/// Exhausting either quota cancels `cancel`. With `remaining = N`, the N-th
/// page is the last one consumed.
pub async fn consume_results(
    mut results: mpsc::Receiver<CrawlResult>,
    cancel: CancellationToken,
    policy: QuotaPolicy,
    observer: Option<ResultObserver>,
) -> SinkOutcome {
    let mut remaining_results = policy.max_results;
    let mut remaining_errors = policy.max_errors;
    let mut pages = Vec::new();
    let mut failures = Vec::new();

    let stop_reason = loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break StopReason::Cancelled,
            result = results.recv() => match result {
                Some(result) => result,
                None => break StopReason::Cancelled,
            },
        };

        if let Some(ref observer) = observer {
            observer(&result);
        }

        match result {
            CrawlResult::Failure { url, error } => {
                warn!("crawler result: [url: {}] error: {}", url, error);
                failures.push(FailureRecord {
                    url,
                    error: error.to_string(),
                });
                remaining_errors = remaining_errors.saturating_sub(1);
                if remaining_errors == 0 {
                    info!("Error quota of {} reached", policy.max_errors);
                    cancel.cancel();
                    break StopReason::ErrorQuota;
                }
            }
            CrawlResult::Done { message } => {
                info!("crawler result: {}", message);
                if policy.on_done == DonePolicy::Cancel {
                    cancel.cancel();
                }
                break StopReason::Exhausted;
            }
            CrawlResult::Page { url, title } => {
                info!("crawler result: [url: {}] title: {}", url, title);
                pages.push(PageRecord { url, title });
                remaining_results = remaining_results.saturating_sub(1);
                if remaining_results == 0 {
                    info!("Result quota of {} reached", policy.max_results);
                    cancel.cancel();
                    break StopReason::ResultQuota;
                }
            }
        }
    };

    SinkOutcome {
        pages,
        failures,
        stop_reason,
    }
}
