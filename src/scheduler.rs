//! Sweep scheduler.
//!
//! Drives the agent: one sweep over every category in catalog order, then an
//! idle wait of the configured interval, repeated until shutdown is
//! signalled. Probe failures never end a sweep early; only shutdown does.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use tokio::sync::{RwLock, watch};

use crate::probe::ProbeCatalog;
use crate::sink::RetryReport;
use crate::snapshot::{ProbeOutcome, SnapshotBuilder, format};

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SchedulerState {
    /// Executing probes.
    Running,
    /// Waiting out the interval between sweeps.
    Idle,
    /// Shutdown observed; no further sweeps.
    Stopped,
}

/// Summary of one sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Probes executed.
    pub attempted: usize,
    /// Probes whose snapshot reached the remote store.
    pub pushed: usize,
    /// Probes whose subtree was missing or unreadable.
    pub skipped: usize,
    /// Probes logged locally whose push failed.
    pub push_failed: usize,
    /// Retry queue pass run before the probes, in retry mode.
    pub retried: Option<RetryReport>,
    /// Shutdown arrived before every probe was attempted.
    pub interrupted: bool,
}

impl SweepReport {
    fn begin() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            attempted: 0,
            pushed: 0,
            skipped: 0,
            push_failed: 0,
            retried: None,
            interrupted: false,
        }
    }

    fn tally(&mut self, outcome: &ProbeOutcome) {
        self.attempted += 1;
        match outcome {
            ProbeOutcome::Pushed { .. } => self.pushed += 1,
            ProbeOutcome::PushFailed { .. } => self.push_failed += 1,
            ProbeOutcome::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Snapshot of scheduler progress, shared with the health server.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub state: SchedulerState,
    pub sweeps_completed: u64,
    pub probe_count: usize,
    pub pending_retries: usize,
    pub last_sweep: Option<SweepReport>,
    pub next_sweep_at: Option<DateTime<Utc>>,
}

/// Shared, read-mostly handle to [`AgentStatus`].
pub type StatusHandle = Arc<RwLock<AgentStatus>>;

/// Periodic sweep driver.
pub struct SweepScheduler {
    catalog: ProbeCatalog,
    builder: SnapshotBuilder,
    interval: Duration,
    status: StatusHandle,
}

impl SweepScheduler {
    pub fn new(catalog: ProbeCatalog, builder: SnapshotBuilder, interval: Duration) -> Self {
        let status = AgentStatus {
            state: SchedulerState::Running,
            sweeps_completed: 0,
            probe_count: catalog.probe_count(),
            pending_retries: 0,
            last_sweep: None,
            next_sweep_at: None,
        };

        Self {
            catalog,
            builder,
            interval,
            status: Arc::new(RwLock::new(status)),
        }
    }

    /// Handle for observers such as the health server.
    pub fn status(&self) -> StatusHandle {
        Arc::clone(&self.status)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn catalog(&self) -> &ProbeCatalog {
        &self.catalog
    }

    /// Run one complete sweep.
    pub async fn sweep(&mut self) -> SweepReport {
        self.sweep_inner(None).await
    }

    /// Sweep every `interval` until `shutdown` turns `true` or its sender is
    /// dropped.
    ///
    /// Shutdown is honoured between probes and during the idle wait. An
    /// interrupted sweep writes no completion marker.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval = ?self.interval,
            probes = self.catalog.probe_count(),
            "Sweep scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.sweep_inner(Some(&shutdown)).await;
            if report.interrupted {
                break;
            }

            let next = chrono::Duration::from_std(self.interval)
                .ok()
                .and_then(|d| Utc::now().checked_add_signed(d));
            self.set_idle(next).await;
            tracing::debug!(next_sweep_at = ?next, "Scheduler idle");

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = async {
                    let _ = shutdown.wait_for(|stop| *stop).await;
                } => break,
            }
        }

        self.status.write().await.state = SchedulerState::Stopped;
        tracing::info!("Sweep scheduler stopped");
    }

    async fn sweep_inner(&mut self, shutdown: Option<&watch::Receiver<bool>>) -> SweepReport {
        let stop_requested = || shutdown.is_some_and(|rx| *rx.borrow());
        let mut report = SweepReport::begin();
        self.set_running().await;

        report.retried = self.builder.retry_pending(&stop_requested).await;
        if stop_requested() {
            tracing::warn!("Shutdown requested during retry pass, skipping sweep");
            report.interrupted = true;
            report.finished_at = Utc::now();
            self.finish_sweep(&report).await;
            return report;
        }

        self.builder.record(&format::sweep_started());
        tracing::info!(probes = self.catalog.probe_count(), "Sweep started");

        'categories: for category in self.catalog.categories() {
            self.builder.record(&format::category_banner(&category.banner));
            tracing::debug!(category = %category.name, "Collecting category");

            for probe in &category.probes {
                if stop_requested() {
                    report.interrupted = true;
                    break 'categories;
                }
                let outcome = self.builder.run(probe).await;
                report.tally(&outcome);
            }
        }

        if report.interrupted {
            tracing::warn!(
                attempted = report.attempted,
                "Sweep interrupted by shutdown"
            );
        } else {
            self.builder.record(&format::sweep_completed());
            tracing::info!(
                attempted = report.attempted,
                pushed = report.pushed,
                skipped = report.skipped,
                push_failed = report.push_failed,
                "Sweep completed"
            );
        }

        report.finished_at = Utc::now();
        self.finish_sweep(&report).await;
        report
    }

    async fn set_running(&self) {
        let mut status = self.status.write().await;
        status.state = SchedulerState::Running;
        status.next_sweep_at = None;
    }

    async fn set_idle(&self, next: Option<DateTime<Utc>>) {
        let mut status = self.status.write().await;
        status.state = SchedulerState::Idle;
        status.next_sweep_at = next;
    }

    async fn finish_sweep(&self, report: &SweepReport) {
        let mut status = self.status.write().await;
        if !report.interrupted {
            status.sweeps_completed += 1;
        }
        status.pending_retries = self.builder.pending_retries();
        status.last_sweep = Some(report.clone());
    }
}

impl std::fmt::Debug for SweepScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepScheduler")
            .field("interval", &self.interval)
            .field("probe_count", &self.catalog.probe_count())
            .field("builder", &self.builder)
            .finish_non_exhaustive()
    }
}
