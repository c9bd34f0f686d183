//! Termination detection and the shared stop signal
//!
//! Processes publish their send progress on a [`ProgressBoard`]. The
//! [`TerminationCoordinator`] polls the board and, once every process has met
//! its quota, waits a grace interval for in-flight messages and then flips
//! the [`StopSignal`]. Stop is cooperative: processes observe it between
//! steps and drain their mailbox once more before exiting.

use crate::clock::ProcessId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Per-process send progress shared between processes and the coordinator
#[derive(Debug)]
pub struct ProgressBoard {
    quota_events: Vec<AtomicU64>,
    messages_sent: Vec<AtomicU64>,
}

impl ProgressBoard {
    /// Board for `n` processes, all at zero
    pub fn new(n: usize) -> Self {
        Self {
            quota_events: (0..n).map(|_| AtomicU64::new(0)).collect(),
            messages_sent: (0..n).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Record a send-branch event; `delivered` is false for a degraded send
    pub fn record_send(&self, process: ProcessId, delivered: bool) {
        if let Some(counter) = self.quota_events.get(process.index()) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        if delivered {
            if let Some(counter) = self.messages_sent.get(process.index()) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Send-branch events completed by `process`
    pub fn quota_progress(&self, process: ProcessId) -> u64 {
        self.quota_events
            .get(process.index())
            .map_or(0, |c| c.load(Ordering::SeqCst))
    }

    /// Messages actually handed to a mailbox by `process`
    pub fn messages_sent(&self, process: ProcessId) -> u64 {
        self.messages_sent
            .get(process.index())
            .map_or(0, |c| c.load(Ordering::SeqCst))
    }

    /// True once every process has completed `quota` send-branch events
    pub fn all_reached(&self, quota: u64) -> bool {
        self.quota_events
            .iter()
            .all(|c| c.load(Ordering::SeqCst) >= quota)
    }
}

/// Receiving side of the run-wide stop broadcast
#[derive(Debug, Clone)]
pub struct StopSignal(watch::Receiver<bool>);

impl StopSignal {
    /// True once stop has been broadcast
    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    /// Wait until stop is broadcast
    ///
    /// Also returns if the coordinator was dropped without stopping.
    pub async fn stopped(&mut self) {
        while !*self.0.borrow_and_update() {
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Sending side of the stop broadcast
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<watch::Sender<bool>>);

impl StopHandle {
    /// Fresh, unstopped signal pair
    pub fn new() -> (Self, StopSignal) {
        let (tx, rx) = watch::channel(false);
        (Self(Arc::new(tx)), StopSignal(rx))
    }

    /// Broadcast stop to every process
    pub fn stop(&self) {
        self.0.send_replace(true);
    }

    /// Another receiver for a process
    pub fn subscribe(&self) -> StopSignal {
        StopSignal(self.0.subscribe())
    }
}

/// Watches send progress and broadcasts stop
#[derive(Debug)]
pub struct TerminationCoordinator {
    board: Arc<ProgressBoard>,
    quota: u64,
    poll_interval: Duration,
    grace: Duration,
    stop: StopHandle,
}

impl TerminationCoordinator {
    /// Coordinator for `quota` sends per process
    pub fn new(
        board: Arc<ProgressBoard>,
        quota: u64,
        poll_interval: Duration,
        grace: Duration,
        stop: StopHandle,
    ) -> Self {
        Self {
            board,
            quota,
            poll_interval,
            grace,
            stop,
        }
    }

    /// True once every process has met the quota
    pub fn is_satisfied(&self) -> bool {
        self.board.all_reached(self.quota)
    }

    /// Poll until satisfied, wait the grace interval, then broadcast stop
    pub async fn run(self) {
        let mut polls: u64 = 0;
        while !self.is_satisfied() {
            polls += 1;
            tokio::time::sleep(self.poll_interval).await;
        }
        info!(
            quota = self.quota,
            polls,
            grace_ms = self.grace.as_millis() as u64,
            "send quota reached by every process"
        );

        tokio::time::sleep(self.grace).await;
        debug!("broadcasting stop");
        self.stop.stop();
    }
}
