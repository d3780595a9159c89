//! # Scan Scheduler
//!
//! Runs a [`ChecksumScan`] on a fixed interval, first tick immediately.
//!
//! Admission is a single atomic slot: a tick either flips the slot from
//! idle to running and spawns the scan on its own task, or finds it already
//! taken and is skipped with a warning. The slot is released by a drop
//! guard owned by the spawned task, so a panicking scan cannot wedge the
//! scheduler.
//!
//! Cancellation stops the tick loop promptly, including while it is waiting
//! for the next tick. An in-flight scan is not awaited.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::IntegrityError;
use crate::scanner::{ChecksumIntegrity, ScanReport};

/// A unit of integrity work run by the scheduler.
#[async_trait]
pub trait ChecksumScan: Send + Sync + 'static {
    /// Run one full scan.
    async fn run_scan(&self) -> Result<ScanReport, IntegrityError>;
}

#[async_trait]
impl ChecksumScan for ChecksumIntegrity {
    async fn run_scan(&self) -> Result<ScanReport, IntegrityError> {
        self.run().await
    }
}

/// How a tick ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The scan ran to completion.
    Completed,
    /// The scan returned an error.
    Failed,
    /// The tick found a scan in flight.
    Skipped,
}

impl ScanOutcome {
    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Callback notified of every tick outcome.
pub type ScanObserver = Arc<dyn Fn(ScanOutcome) + Send + Sync>;

/// Result of one [`ScanScheduler::tick`].
#[derive(Debug)]
pub enum TickOutcome {
    /// A scan was started on this task.
    Launched(JoinHandle<ScanOutcome>),
    /// A scan was already running.
    Skipped,
}

/// Releases the running slot when the scan task ends.
struct SlotGuard(Arc<AtomicBool>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Interval driver for a [`ChecksumScan`].
pub struct ScanScheduler<S: ChecksumScan> {
    scan: Arc<S>,
    interval: Duration,
    running: Arc<AtomicBool>,
    observer: Option<ScanObserver>,
}

impl<S: ChecksumScan> std::fmt::Debug for ScanScheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanScheduler")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl<S: ChecksumScan> ScanScheduler<S> {
    /// Scheduler firing every `interval`.
    pub fn new(scan: Arc<S>, interval: Duration) -> Self {
        Self {
            scan,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            observer: None,
        }
    }

    /// Report every tick outcome to `observer`.
    pub fn with_observer(mut self, observer: ScanObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Whether a scan currently holds the slot.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn observe(&self, outcome: ScanOutcome) {
        if let Some(observer) = &self.observer {
            observer(outcome);
        }
    }

    /// Start a scan unless one is already running.
    pub fn tick(&self) -> TickOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("checksum scan still running; skipping tick");
            self.observe(ScanOutcome::Skipped);
            return TickOutcome::Skipped;
        }

        let guard = SlotGuard(self.running.clone());
        let scan = self.scan.clone();
        let observer = self.observer.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            let outcome = match scan.run_scan().await {
                Ok(report) => {
                    tracing::info!(
                        examined = report.examined,
                        repaired = report.repaired,
                        failed = report.failed,
                        removed = report.removed,
                        "checksum scan completed"
                    );
                    ScanOutcome::Completed
                }
                Err(err) => {
                    tracing::warn!(error = %err, "checksum scan failed");
                    ScanOutcome::Failed
                }
            };
            if let Some(observer) = observer {
                observer(outcome);
            }
            outcome
        });
        TickOutcome::Launched(handle)
    }

    /// Tick until `token` is cancelled.
    pub async fn run(self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval = ?self.interval, "checksum scanner started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let _ = self.tick();
                }
            }
        }
        tracing::info!("checksum scanner stopped");
    }
}
