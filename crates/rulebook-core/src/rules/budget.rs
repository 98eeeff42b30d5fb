//! Per-run limits for long scans.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The operator asked the engine to stop.
    Stopped,
    ItemLimit,
    TimeLimit,
}

/// Item cap + wall-clock limit + stop signal, checked between items.
#[derive(Debug)]
pub struct ScanBudget {
    max_items: usize,
    time_limit: Duration,
    started: Instant,
    stop: watch::Receiver<bool>,
}

impl ScanBudget {
    pub fn new(max_items: usize, time_limit: Duration, stop: watch::Receiver<bool>) -> Self {
        Self {
            max_items,
            time_limit,
            started: Instant::now(),
            stop,
        }
    }

    /// `None` while another item may be processed.
    pub fn check(&self, processed: usize) -> Option<StopReason> {
        if *self.stop.borrow() {
            Some(StopReason::Stopped)
        } else if processed >= self.max_items {
            Some(StopReason::ItemLimit)
        } else if self.started.elapsed() >= self.time_limit {
            Some(StopReason::TimeLimit)
        } else {
            None
        }
    }
}
