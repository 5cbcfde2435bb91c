use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Outstanding traversal units: scheduled but not yet finished.
///
/// The counter starts at one, owned by the root [`WorkGuard`]. New guards can
/// only be forked from a live guard, so once the count has dropped to zero it
/// never rises again and the idle transition happens exactly once.
#[derive(Debug)]
pub struct WorkCounter {
    pending: AtomicUsize,
    idle: Notify,
}

impl WorkCounter {
    pub fn new() -> (Arc<Self>, WorkGuard) {
        let counter = Arc::new(Self {
            pending: AtomicUsize::new(1),
            idle: Notify::new(),
        });
        let root = WorkGuard {
            counter: counter.clone(),
        };
        (counter, root)
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Resolves once the last guard has been dropped. Meant for a single
    /// waiter; the wake-up is stored if nobody is waiting yet.
    pub async fn wait_idle(&self) {
        if self.is_idle() {
            return;
        }
        self.idle.notified().await;
    }
}

/// One unit of outstanding work. Dropping it is the only way to finish a unit.
#[derive(Debug)]
pub struct WorkGuard {
    counter: Arc<WorkCounter>,
}

impl WorkGuard {
    /// Count one more unit, scheduled by the unit holding `self`.
    pub fn fork(&self) -> WorkGuard {
        self.counter.pending.fetch_add(1, Ordering::SeqCst);
        WorkGuard {
            counter: self.counter.clone(),
        }
    }
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        if self.counter.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.counter.idle.notify_one();
        }
    }
}
