use crate::config::CrawlConfig;
use crate::control::{ControlLoop, ControlSignal, StopReason};
use crate::sink::{FailureRecord, PageRecord, QuotaPolicy, ResultObserver, consume_results};
use delve_scanner::error::{Result, ScanError};
use delve_scanner::{CrawlResult, Crawler, Fetcher};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

/// How long to wait for in-flight units after the crawl has stopped.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub seed: String,
    pub max_depth: i64,
    pub quota: QuotaPolicy,
    pub app_timeout: Duration,
    pub widen_by: i64,
    pub narrow_by: i64,
}

impl CrawlOptions {
    pub fn from_config(config: &CrawlConfig) -> Self {
        Self {
            seed: config.url.clone(),
            max_depth: config.max_depth,
            quota: QuotaPolicy {
                max_results: config.max_results,
                max_errors: config.max_errors,
                on_done: config.done_policy(),
            },
            app_timeout: config.app_timeout(),
            widen_by: config.widen_by,
            narrow_by: config.narrow_by,
        }
    }
}

/// Everything a finished crawl produced.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub seed: String,
    pub pages: Vec<PageRecord>,
    pub failures: Vec<FailureRecord>,
    pub stop_reason: StopReason,
    pub elapsed: Duration,
    pub depth_budget: i64,
    pub visited: usize,
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Run one crawl from `options.seed` until a quota runs out, the site is
/// exhausted, the deadline passes or an `Interrupt` arrives on `signals`.
pub async fn execute_crawl(
    options: CrawlOptions,
    fetcher: Arc<dyn Fetcher>,
    signals: mpsc::Receiver<ControlSignal>,
    observer: Option<ResultObserver>,
) -> Result<CrawlSummary> {
    let started = Instant::now();
    let cancel = CancellationToken::new();
    let crawler = Crawler::new(fetcher, cancel.clone());

    let results = crawler
        .results()
        .ok_or_else(|| ScanError::Other("result stream already taken".to_string()))?;
    let sink = tokio::spawn(consume_results(
        results,
        cancel.clone(),
        options.quota,
        observer,
    ));

    let control = ControlLoop::new(cancel.clone(), options.app_timeout)
        .with_depth_step(options.widen_by, options.narrow_by);

    if let Err(e) = crawler.start(&options.seed, options.max_depth) {
        cancel.cancel();
        crawler.shutdown().await;
        return Err(e);
    }

    let loop_reason = control.run(&crawler, signals).await;
    let outcome = sink.await?;

    if tokio::time::timeout(DRAIN_TIMEOUT, crawler.shutdown())
        .await
        .is_err()
    {
        warn!(
            "{} units still running after {:?}, abandoning them",
            crawler.pending(),
            DRAIN_TIMEOUT
        );
    }

    let stop_reason = match loop_reason {
        StopReason::Cancelled => outcome.stop_reason,
        reason => reason,
    };
    info!("Crawl of {} stopped: {}", options.seed, stop_reason);

    Ok(CrawlSummary {
        seed: options.seed,
        pages: outcome.pages,
        failures: outcome.failures,
        stop_reason,
        elapsed: started.elapsed(),
        depth_budget: crawler.depth_budget(),
        visited: crawler.visited_count().await,
    })
}

/// One result as a JSON object, for line-oriented output.
pub fn result_json(result: &CrawlResult) -> Value {
    match result {
        CrawlResult::Page { url, title } => json!({
            "type": "page",
            "url": url,
            "title": title,
        }),
        CrawlResult::Failure { url, error } => json!({
            "type": "failure",
            "url": url,
            "error": error.to_string(),
        }),
        CrawlResult::Done { message } => json!({
            "type": "done",
            "message": message,
        }),
    }
}

/// Generate a crawl report from a summary
pub fn generate_crawl_report(summary: &CrawlSummary) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Seed: {}\n", summary.seed));
    report.push_str(&format!("  Stopped: {}\n", summary.stop_reason));
    report.push_str(&format!("  Pages crawled: {}\n", summary.pages.len()));
    report.push_str(&format!("  Errors: {}\n", summary.failures.len()));
    report.push_str(&format!("  URLs visited: {}\n", summary.visited));
    report.push_str(&format!(
        "  Elapsed: {:.2}s\n",
        summary.elapsed.as_secs_f64()
    ));

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    // Group pages by host
    let mut by_host: BTreeMap<String, Vec<&PageRecord>> = BTreeMap::new();
    for page in &summary.pages {
        let host = Url::parse(&page.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        by_host.entry(host).or_default().push(page);
    }

    for (host, pages) in &by_host {
        report.push_str(&format!("## {}\n", host));
        report.push_str(&format!("  {} pages found\n\n", pages.len()));
        for page in pages {
            let path = extract_url_path(&page.url);
            if page.title.is_empty() {
                report.push_str(&format!("  {}\n", path));
            } else {
                report.push_str(&format!("  {}  {}\n", path, page.title));
            }
        }
        report.push('\n');
    }

    if !summary.failures.is_empty() {
        report.push_str("## Errors\n");
        for failure in &summary.failures {
            report.push_str(&format!("  {}  {}\n", failure.url, failure.error));
        }
        report.push('\n');
    }

    report
}
