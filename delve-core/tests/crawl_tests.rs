// Tests for crawl orchestration

use async_trait::async_trait;
use delve_core::config::CrawlConfig;
use delve_core::control::{ControlSignal, StopReason};
use delve_core::crawl::{CrawlOptions, execute_crawl, generate_crawl_report};
use delve_core::sink::{DonePolicy, QuotaPolicy, ResultObserver};
use delve_scanner::error::Result;
use delve_scanner::{CrawlResult, Fetcher, Page, ScanError};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct StaticPage {
    title: String,
    links: Vec<String>,
}

impl Page for StaticPage {
    fn title(&self) -> String {
        self.title.clone()
    }

    fn links(&self) -> Vec<String> {
        self.links.clone()
    }
}

/// In-memory site. URLs missing from `pages` fail with a 404; fetches of
/// URLs in `stalled` never finish until cancelled.
#[derive(Default)]
struct SiteFetcher {
    pages: HashMap<String, (String, Vec<String>)>,
    stalled: HashSet<String>,
}

impl SiteFetcher {
    fn page(mut self, url: &str, title: &str, links: &[&str]) -> Self {
        self.pages.insert(
            url.to_string(),
            (
                title.to_string(),
                links.iter().map(|l| l.to_string()).collect(),
            ),
        );
        self
    }

    fn stall(mut self, url: &str) -> Self {
        self.stalled.insert(url.to_string());
        self
    }

    /// A chain of `n` pages, each linking to the next.
    fn chain(n: usize) -> Self {
        (0..n).fold(Self::default(), |site, i| {
            let next = format!("http://site.test/{}", i + 1);
            site.page(&format!("http://site.test/{}", i), "Chain", &[&next])
        })
    }
}

#[async_trait]
impl Fetcher for SiteFetcher {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Box<dyn Page>> {
        if self.stalled.contains(url) {
            cancel.cancelled().await;
            return Err(ScanError::Cancelled(url.to_string()));
        }
        match self.pages.get(url) {
            Some((title, links)) => Ok(Box::new(StaticPage {
                title: title.clone(),
                links: links.clone(),
            })),
            None => Err(ScanError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

fn options(seed: &str, max_depth: i64) -> CrawlOptions {
    CrawlOptions {
        seed: seed.to_string(),
        max_depth,
        quota: QuotaPolicy::default(),
        app_timeout: Duration::from_secs(60),
        widen_by: 2,
        narrow_by: 2,
    }
}

fn golang_site() -> SiteFetcher {
    SiteFetcher::default()
        .page(
            "https://golang.org/",
            "The Go Programming Language",
            &["https://golang.org/pkg/", "https://golang.org/cmd/"],
        )
        .page(
            "https://golang.org/pkg/",
            "Packages",
            &[
                "https://golang.org/",
                "https://golang.org/cmd/",
                "https://golang.org/pkg/fmt/",
                "https://golang.org/pkg/os/",
            ],
        )
        .page(
            "https://golang.org/pkg/fmt/",
            "Package fmt",
            &["https://golang.org/", "https://golang.org/pkg/"],
        )
        .page(
            "https://golang.org/pkg/os/",
            "Package os",
            &["https://golang.org/", "https://golang.org/pkg/"],
        )
}

fn no_signals() -> mpsc::Receiver<ControlSignal> {
    mpsc::channel(1).1
}

// ============================================================================
// Stop Reason Tests
// ============================================================================

#[tokio::test]
async fn test_crawl_runs_to_exhaustion() {
    let summary = execute_crawl(
        options("https://golang.org/", 4),
        Arc::new(golang_site()),
        no_signals(),
        None,
    )
    .await
    .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    assert_eq!(summary.pages.len(), 4);
    // cmd/ is missing from the site
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].url, "https://golang.org/cmd/");
    assert_eq!(summary.visited, 5);

    let mut urls: Vec<&str> = summary.pages.iter().map(|p| p.url.as_str()).collect();
    urls.sort();
    urls.dedup();
    assert_eq!(urls.len(), 4);
}

#[tokio::test]
async fn test_depth_zero_finds_nothing() {
    let summary = execute_crawl(
        options("https://golang.org/", 0),
        Arc::new(golang_site()),
        no_signals(),
        None,
    )
    .await
    .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    assert!(summary.pages.is_empty());
    assert!(summary.failures.is_empty());
}

#[tokio::test]
async fn test_result_quota_ends_crawl() {
    let mut opts = options("http://site.test/0", 1000);
    opts.quota.max_results = 5;

    let summary = execute_crawl(opts, Arc::new(SiteFetcher::chain(200)), no_signals(), None)
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::ResultQuota);
    assert_eq!(summary.pages.len(), 5);
}

#[tokio::test]
async fn test_error_quota_ends_crawl() {
    let site = SiteFetcher::default().page(
        "http://site.test/",
        "Broken links",
        &[
            "http://site.test/a",
            "http://site.test/b",
            "http://site.test/c",
            "http://site.test/d",
        ],
    );
    let mut opts = options("http://site.test/", 3);
    opts.quota.max_errors = 2;

    let summary = execute_crawl(opts, Arc::new(site), no_signals(), None)
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::ErrorQuota);
    assert_eq!(summary.failures.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_ends_stalled_crawl() {
    let site = SiteFetcher::default()
        .page("http://site.test/", "Home", &["http://site.test/slow"])
        .stall("http://site.test/slow");
    let mut opts = options("http://site.test/", 3);
    opts.app_timeout = Duration::from_secs(10);

    let summary = execute_crawl(opts, Arc::new(site), no_signals(), None)
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Deadline);
    assert_eq!(summary.pages.len(), 1);
}

#[tokio::test]
async fn test_interrupt_ends_crawl() {
    let site = SiteFetcher::default()
        .page("http://site.test/", "Home", &["http://site.test/slow"])
        .stall("http://site.test/slow");
    let (tx, rx) = mpsc::channel(1);

    let observer_tx = tx.clone();
    let observer: ResultObserver = Arc::new(move |result: &CrawlResult| {
        if result.is_page() {
            let _ = observer_tx.try_send(ControlSignal::Interrupt);
        }
    });

    let summary = execute_crawl(options("http://site.test/", 3), Arc::new(site), rx, Some(observer))
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Interrupted);
    assert_eq!(summary.pages.len(), 1);
    drop(tx);
}

#[tokio::test(start_paused = true)]
async fn test_stop_policy_waits_for_deadline() {
    let mut opts = options("https://golang.org/", 4);
    opts.quota.on_done = DonePolicy::Stop;
    opts.app_timeout = Duration::from_secs(20);

    let started = tokio::time::Instant::now();
    let summary = execute_crawl(opts, Arc::new(golang_site()), no_signals(), None)
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Deadline);
    assert_eq!(summary.pages.len(), 4);
    assert!(started.elapsed() >= Duration::from_secs(20));
}

// ============================================================================
// Observer & Report Tests
// ============================================================================

#[tokio::test]
async fn test_observer_streams_results() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let observer: ResultObserver = Arc::new(move |result: &CrawlResult| {
        sink.lock().unwrap().push(result.is_done());
    });

    let summary = execute_crawl(
        options("https://golang.org/", 4),
        Arc::new(golang_site()),
        no_signals(),
        Some(observer),
    )
    .await
    .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), summary.pages.len() + summary.failures.len() + 1);
    assert_eq!(seen.last(), Some(&true));
}

#[tokio::test]
async fn test_report_from_real_crawl() {
    let summary = execute_crawl(
        options("https://golang.org/", 4),
        Arc::new(golang_site()),
        no_signals(),
        None,
    )
    .await
    .unwrap();

    let report = generate_crawl_report(&summary);
    assert!(report.contains("## golang.org\n  4 pages found"));
    assert!(report.contains("/pkg/fmt/  Package fmt"));
    assert!(report.contains("https://golang.org/cmd/  https://golang.org/cmd/ returned HTTP 404"));
}

#[tokio::test]
async fn test_concurrent_crawls_are_isolated() {
    let crawls = vec![
        execute_crawl(
            options("https://golang.org/", 4),
            Arc::new(golang_site()),
            no_signals(),
            None,
        ),
        execute_crawl(
            options("http://site.test/0", 10),
            Arc::new(SiteFetcher::chain(3)),
            no_signals(),
            None,
        ),
    ];

    let summaries = futures::future::join_all(crawls).await;
    let golang = summaries[0].as_ref().unwrap();
    let chain = summaries[1].as_ref().unwrap();

    assert_eq!(golang.pages.len(), 4);
    assert_eq!(chain.pages.len(), 3);
    assert!(chain.pages.iter().all(|p| p.url.starts_with("http://site.test/")));
}

#[test]
fn test_options_from_config() {
    let config = CrawlConfig {
        url: "http://example.com/".to_string(),
        max_depth: 7,
        max_results: 9,
        max_errors: 3,
        app_timeout: 45,
        cancel_on_done: false,
        widen_by: 4,
        ..CrawlConfig::default()
    };

    let opts = CrawlOptions::from_config(&config);
    assert_eq!(opts.seed, "http://example.com/");
    assert_eq!(opts.max_depth, 7);
    assert_eq!(opts.quota.max_results, 9);
    assert_eq!(opts.quota.max_errors, 3);
    assert_eq!(opts.quota.on_done, DonePolicy::Stop);
    assert_eq!(opts.app_timeout, Duration::from_secs(45));
    assert_eq!(opts.widen_by, 4);
    assert_eq!(opts.narrow_by, 2);
}
