use crate::error::{Result, ScanError};
use crate::fetcher::Fetcher;
use crate::result::CrawlResult;
use crate::visited::VisitedSet;
use crate::work::{WorkCounter, WorkGuard};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// tokio has no zero-capacity channel; one slot is the closest to a
/// rendezvous and still makes every unit wait on the consumer.
const RESULT_CHANNEL_CAPACITY: usize = 1;

/// A traversal unit waiting to be spawned.
struct Job {
    url: String,
    depth: i64,
    guard: WorkGuard,
}

/// State shared by every unit of one crawl.
struct Session {
    fetcher: Arc<dyn Fetcher>,
    visited: VisitedSet,
    depth_budget: AtomicI64,
    work: Arc<WorkCounter>,
    results: mpsc::Sender<CrawlResult>,
    jobs: mpsc::UnboundedSender<Job>,
    cancel: CancellationToken,
}

/// Concurrent depth-bounded traversal engine.
///
/// Every discovered link becomes its own task. Results (pages, failures and
/// the final `Done`) leave the engine only through the channel returned by
/// [`Crawler::results`].
pub struct Crawler {
    session: Arc<Session>,
    tasks: TaskTracker,
    launch: Mutex<Option<(WorkGuard, mpsc::UnboundedReceiver<Job>)>>,
    results_rx: Mutex<Option<mpsc::Receiver<CrawlResult>>>,
}

impl Crawler {
    /// Build the engine and start its completion watcher. The root unit is
    /// counted as outstanding from here on, so the watcher cannot report
    /// `Done` before [`Crawler::start`] has run.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(fetcher: Arc<dyn Fetcher>, cancel: CancellationToken) -> Self {
        let (results_tx, results_rx) = mpsc::channel(RESULT_CHANNEL_CAPACITY);
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (work, root) = WorkCounter::new();

        let session = Arc::new(Session {
            fetcher,
            visited: VisitedSet::new(),
            depth_budget: AtomicI64::new(0),
            work,
            results: results_tx,
            jobs: jobs_tx,
            cancel: cancel.child_token(),
        });

        let tasks = TaskTracker::new();
        tasks.spawn(watch_completion(session.clone()));

        Self {
            session,
            tasks,
            launch: Mutex::new(Some((root, jobs_rx))),
            results_rx: Mutex::new(Some(results_rx)),
        }
    }

    /// Schedule the root unit and begin dispatching. Returns as soon as the
    /// root is queued.
    pub fn start(&self, url: &str, depth: i64) -> Result<()> {
        let (root, jobs) = self
            .launch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(ScanError::AlreadyStarted)?;

        info!("Starting crawl of {} with depth {}", url, depth);
        self.tasks
            .spawn(dispatch(self.session.clone(), jobs, self.tasks.clone()));
        self.session.schedule(Job {
            url: url.to_string(),
            depth,
            guard: root,
        });
        Ok(())
    }

    /// The receiving end of the result stream. Handed out once.
    pub fn results(&self) -> Option<mpsc::Receiver<CrawlResult>> {
        self.results_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Add `delta` to the depth budget applied to every unit spawned from now
    /// on. Returns the new budget.
    /// Saturates at the `i64` bounds.
    pub fn adjust_depth(&self, delta: i64) -> i64 {
        let previous = self
            .session
            .depth_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |budget| {
                Some(budget.saturating_add(delta))
            })
            .unwrap_or_else(|budget| budget);
        let budget = previous.saturating_add(delta);
        info!("Depth budget adjusted by {} (now {})", delta, budget);
        budget
    }

    pub fn depth_budget(&self) -> i64 {
        self.session.depth_budget.load(Ordering::SeqCst)
    }

    /// Units scheduled but not yet finished, including the root until it ends.
    pub fn pending(&self) -> usize {
        self.session.work.pending()
    }

    pub async fn visited_count(&self) -> usize {
        self.session.visited.len().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.session.cancel.is_cancelled()
    }

    /// Cancel this crawl and wait for the dispatcher, the watcher and every
    /// spawned unit to return. In-flight fetches end at their next
    /// cancellation check.
    pub async fn shutdown(&self) {
        self.session.cancel.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        debug!("Crawler shut down with {} units pending", self.pending());
    }
}

impl Drop for Crawler {
    fn drop(&mut self) {
        self.session.cancel.cancel();
    }
}

impl Session {
    fn schedule(&self, job: Job) {
        if let Err(mpsc::error::SendError(job)) = self.jobs.send(job) {
            debug!("Dispatcher stopped, dropping {}", job.url);
        }
    }

    fn child_depth(&self, parent_depth: i64) -> i64 {
        parent_depth
            .saturating_sub(1)
            .saturating_add(self.depth_budget.load(Ordering::SeqCst))
    }

    fn spawn_child(&self, url: String, parent_depth: i64, parent: &WorkGuard) {
        if self.cancel.is_cancelled() {
            return;
        }
        let depth = self.child_depth(parent_depth);
        self.schedule(Job {
            url,
            depth,
            guard: parent.fork(),
        });
    }

    /// Hand a result to the consumer. Gives up (returning `false`) once the
    /// crawl is cancelled so no unit waits on a consumer that has left.
    async fn emit(&self, result: CrawlResult) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.results.send(result) => sent.is_ok(),
        }
    }

    async fn visit(self: Arc<Self>, job: Job) {
        let Job { url, depth, guard } = job;
        debug!("start {} (depth {})", url, depth);
        self.scan(&url, depth, &guard).await;
        debug!("finish {} (depth {})", url, depth);
        drop(guard);
    }

    async fn scan(&self, url: &str, depth: i64, guard: &WorkGuard) {
        if depth <= 0 {
            debug!("Depth exhausted at {}", url);
            return;
        }

        if !self.visited.insert(url).await {
            debug!("Already visited {}", url);
            return;
        }

        if self.cancel.is_cancelled() {
            debug!("Crawl cancelled before fetching {}", url);
            return;
        }

        match self.fetcher.fetch(url, &self.cancel).await {
            Err(e) if e.is_cancelled() => {
                debug!("Fetch of {} cancelled", url);
            }
            Err(e) => {
                warn!("Crawl error for {}: {}", url, e);
                self.emit(CrawlResult::failure(url, e)).await;
            }
            Ok(page) => {
                let title = page.title();
                let links = page.links();
                if !self.emit(CrawlResult::page(url, title)).await {
                    return;
                }
                debug!("Scheduling {} links from {}", links.len(), url);
                for link in links {
                    self.spawn_child(link, depth, guard);
                }
            }
        }
    }
}

/// Turns queued jobs into tasks until the crawl is cancelled. Jobs left in
/// the queue are dropped with the receiver, which releases their guards.
async fn dispatch(
    session: Arc<Session>,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    tasks: TaskTracker,
) {
    loop {
        let job = tokio::select! {
            biased;
            _ = session.cancel.cancelled() => break,
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };
        tasks.spawn(session.clone().visit(job));
    }
    jobs.close();
    debug!("Dispatcher stopped");
}

/// Emits the single `Done` once the outstanding work count reaches zero,
/// unless the crawl was cancelled first.
async fn watch_completion(session: Arc<Session>) {
    tokio::select! {
        _ = session.cancel.cancelled() => return,
        _ = session.work.wait_idle() => {}
    }
    if session.cancel.is_cancelled() {
        return;
    }

    info!(
        "All urls already scanned ({} visited)",
        session.visited.len().await
    );
    session.emit(CrawlResult::done()).await;
}
