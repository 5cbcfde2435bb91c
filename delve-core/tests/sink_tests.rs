// Tests for the result sink and its quota policy

use delve_core::control::StopReason;
use delve_core::sink::{DonePolicy, QuotaPolicy, ResultObserver, consume_results};
use delve_scanner::{CrawlResult, ScanError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn policy(max_results: usize, max_errors: usize) -> QuotaPolicy {
    QuotaPolicy {
        max_results,
        max_errors,
        on_done: DonePolicy::Cancel,
    }
}

fn page(n: usize) -> CrawlResult {
    CrawlResult::page(format!("http://example.com/{}", n), format!("Page {}", n))
}

fn failure(n: usize) -> CrawlResult {
    let url = format!("http://example.com/broken/{}", n);
    CrawlResult::failure(url.clone(), ScanError::Status { url, status: 500 })
}

fn queued(results: Vec<CrawlResult>) -> mpsc::Receiver<CrawlResult> {
    let (tx, rx) = mpsc::channel(results.len().max(1));
    for result in results {
        tx.try_send(result).unwrap();
    }
    rx
}

// ============================================================================
// Quota Tests
// ============================================================================

#[tokio::test]
async fn test_result_quota_stops_after_exactly_n_pages() {
    let cancel = CancellationToken::new();
    let rx = queued((0..6).map(page).collect());

    let outcome = consume_results(rx, cancel.clone(), policy(3, 5), None).await;

    assert_eq!(outcome.stop_reason, StopReason::ResultQuota);
    assert_eq!(outcome.pages.len(), 3);
    assert_eq!(outcome.pages[2].url, "http://example.com/2");
    assert!(cancel.is_cancelled());
}

#[tokio::test]
async fn test_error_quota_stops_after_exactly_n_failures() {
    let cancel = CancellationToken::new();
    let rx = queued(vec![page(0), failure(0), page(1), failure(1), failure(2)]);

    let outcome = consume_results(rx, cancel.clone(), policy(10, 2), None).await;

    assert_eq!(outcome.stop_reason, StopReason::ErrorQuota);
    assert_eq!(outcome.failures.len(), 2);
    assert_eq!(outcome.pages.len(), 2);
    assert!(outcome.failures[0].error.contains("HTTP 500"));
    assert!(cancel.is_cancelled());
}

#[tokio::test]
async fn test_failures_do_not_count_against_result_quota() {
    let cancel = CancellationToken::new();
    let rx = queued(vec![failure(0), failure(1), page(0), CrawlResult::done()]);

    let outcome = consume_results(rx, cancel.clone(), policy(1, 5), None).await;

    assert_eq!(outcome.stop_reason, StopReason::ResultQuota);
    assert_eq!(outcome.failures.len(), 2);
    assert_eq!(outcome.pages.len(), 1);
}

#[tokio::test]
async fn test_cancel_after_quota_is_idempotent() {
    let cancel = CancellationToken::new();
    let rx = queued(vec![page(0)]);

    let outcome = consume_results(rx, cancel.clone(), policy(1, 1), None).await;
    assert_eq!(outcome.stop_reason, StopReason::ResultQuota);

    cancel.cancel();
    assert!(cancel.is_cancelled());
}

// ============================================================================
// Done Tests
// ============================================================================

#[tokio::test]
async fn test_done_cancels_under_cancel_policy() {
    let cancel = CancellationToken::new();
    let rx = queued(vec![page(0), CrawlResult::done()]);

    let outcome = consume_results(rx, cancel.clone(), policy(10, 5), None).await;

    assert_eq!(outcome.stop_reason, StopReason::Exhausted);
    assert_eq!(outcome.pages.len(), 1);
    assert!(cancel.is_cancelled());
}

#[tokio::test]
async fn test_done_leaves_crawl_running_under_stop_policy() {
    let cancel = CancellationToken::new();
    let rx = queued(vec![page(0), CrawlResult::done()]);
    let policy = QuotaPolicy {
        on_done: DonePolicy::Stop,
        ..policy(10, 5)
    };

    let outcome = consume_results(rx, cancel.clone(), policy, None).await;

    assert_eq!(outcome.stop_reason, StopReason::Exhausted);
    assert!(!cancel.is_cancelled());
}

// ============================================================================
// Cancellation Tests
// ============================================================================

#[tokio::test]
async fn test_closed_channel_ends_consumption() {
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(1);
    drop(tx);

    let outcome = consume_results(rx, cancel.clone(), policy(10, 5), None).await;

    assert_eq!(outcome.stop_reason, StopReason::Cancelled);
    assert!(outcome.pages.is_empty());
}

#[tokio::test]
async fn test_external_cancel_wins_over_queued_results() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let rx = queued((0..3).map(page).collect());

    let outcome = consume_results(rx, cancel, policy(10, 5), None).await;

    assert_eq!(outcome.stop_reason, StopReason::Cancelled);
    assert!(outcome.pages.is_empty());
}

#[tokio::test]
async fn test_cancel_while_waiting_for_results() {
    let cancel = CancellationToken::new();
    let (_tx, rx) = mpsc::channel::<CrawlResult>(1);

    let sink = tokio::spawn(consume_results(rx, cancel.clone(), policy(10, 5), None));
    tokio::task::yield_now().await;
    cancel.cancel();

    let outcome = sink.await.unwrap();
    assert_eq!(outcome.stop_reason, StopReason::Cancelled);
}

// ============================================================================
// Observer Tests
// ============================================================================

#[tokio::test]
async fn test_observer_sees_every_consumed_result() {
    let cancel = CancellationToken::new();
    let rx = queued(vec![page(0), failure(0), page(1), page(2)]);
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let observer: ResultObserver = Arc::new(move |_result: &CrawlResult| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let outcome = consume_results(rx, cancel, policy(2, 5), Some(observer)).await;

    assert_eq!(outcome.stop_reason, StopReason::ResultQuota);
    // The third page is never consumed.
    assert_eq!(seen.load(Ordering::SeqCst), 3);
}
