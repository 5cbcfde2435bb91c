// Control loop: deadline, interrupt and live depth adjustment

use delve_scanner::Crawler;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const DEFAULT_DEPTH_STEP: i64 = 2;

/// Used when `now + timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Requests delivered to a running crawl from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Cancel the crawl.
    Interrupt,
    /// Raise the depth budget by the widen step.
    Widen,
    /// Lower the depth budget by the narrow step.
    Narrow,
}

/// Why a crawl ended. None of these are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    ResultQuota,
    ErrorQuota,
    Exhausted,
    Deadline,
    Interrupted,
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::ResultQuota => "result quota reached",
            StopReason::ErrorQuota => "error quota reached",
            StopReason::Exhausted => "all urls already scanned",
            StopReason::Deadline => "deadline exceeded",
            StopReason::Interrupted => "interrupted",
            StopReason::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

pub struct ControlLoop {
    cancel: CancellationToken,
    deadline: Instant,
    widen_by: i64,
    narrow_by: i64,
}

impl ControlLoop {
    /// The deadline is fixed here, `timeout` from now. Timeouts too large to
    /// represent are capped at roughly thirty years.
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self {
            cancel,
            deadline,
            widen_by: DEFAULT_DEPTH_STEP,
            narrow_by: DEFAULT_DEPTH_STEP,
        }
    }

    pub fn with_depth_step(mut self, widen_by: i64, narrow_by: i64) -> Self {
        self.widen_by = widen_by;
        self.narrow_by = narrow_by;
        self
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Relay signals to `crawler` until the crawl is cancelled or the
    /// deadline passes. A closed signal channel is not a reason to stop.
    pub async fn run(
        &self,
        crawler: &Crawler,
        mut signals: mpsc::Receiver<ControlSignal>,
    ) -> StopReason {
        let deadline = sleep_until(self.deadline);
        tokio::pin!(deadline);
        let mut signals_open = true;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return StopReason::Cancelled,
                _ = &mut deadline => {
                    info!("Crawl deadline reached");
                    self.cancel.cancel();
                    return StopReason::Deadline;
                }
                signal = signals.recv(), if signals_open => match signal {
                    Some(ControlSignal::Interrupt) => {
                        info!("Interrupt received");
                        self.cancel.cancel();
                        return StopReason::Interrupted;
                    }
                    Some(ControlSignal::Widen) => {
                        info!("Widen request received");
                        crawler.adjust_depth(self.widen_by);
                    }
                    Some(ControlSignal::Narrow) => {
                        info!("Narrow request received");
                        crawler.adjust_depth(-self.narrow_by);
                    }
                    None => signals_open = false,
                },
            }
        }
    }
}
