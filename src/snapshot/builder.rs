//! Per-probe execution.

use std::sync::Arc;

use super::format;
use super::types::Snapshot;
use crate::probe::Probe;
use crate::sink::{LocalLog, PendingPush, RemoteSink, RetryQueue, RetryReport, SinkError};
use crate::store::{SourceError, StoreReader};

/// What happened to one probe.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// Snapshot taken and pushed; `key` is the remote's generated key.
    Pushed { snapshot: Snapshot, key: String },
    /// Snapshot taken and logged locally, but the push failed.
    PushFailed { snapshot: Snapshot, error: SinkError },
    /// The subtree could not be read; nothing was pushed.
    Skipped { error: SourceError },
}

impl ProbeOutcome {
    /// The snapshot, if the subtree was readable.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::Pushed { snapshot, .. } | Self::PushFailed { snapshot, .. } => Some(snapshot),
            Self::Skipped { .. } => None,
        }
    }

    pub fn is_pushed(&self) -> bool {
        matches!(self, Self::Pushed { .. })
    }
}

/// Runs probes against the store and writes the results to both sinks.
///
/// # Ordering
///
/// 1. Probe header to the local log
/// 2. One store enumeration
/// 3. One local line per entry, or one diagnostic line on failure
/// 4. One push, only after every entry is known
///
/// Every failure is contained here. Local write errors are reported through
/// `tracing` and never interrupt the probe.
pub struct SnapshotBuilder {
    reader: Arc<dyn StoreReader>,
    local: LocalLog,
    remote: Arc<dyn RemoteSink>,
    retry: Option<RetryQueue>,
}

impl SnapshotBuilder {
    /// Builder with best-effort delivery.
    pub fn new(reader: Arc<dyn StoreReader>, local: LocalLog, remote: Arc<dyn RemoteSink>) -> Self {
        Self {
            reader,
            local,
            remote,
            retry: None,
        }
    }

    /// Park failed pushes in `queue` instead of discarding them.
    pub fn with_retry_queue(mut self, queue: RetryQueue) -> Self {
        self.retry = Some(queue);
        self
    }

    pub fn local_log(&self) -> &LocalLog {
        &self.local
    }

    /// Number of pushes waiting for a retry.
    pub fn pending_retries(&self) -> usize {
        self.retry.as_ref().map_or(0, RetryQueue::len)
    }

    /// Append a line to the local log, reporting failures on the console.
    pub fn record(&self, line: &str) {
        if let Err(e) = self.local.append(line) {
            tracing::error!(error = %e, "Local log write failed");
        }
    }

    /// Re-attempt parked pushes until `stop` fires. `None` in best-effort
    /// mode.
    pub async fn retry_pending(&mut self, stop: impl Fn() -> bool) -> Option<RetryReport> {
        let queue = self.retry.as_mut()?;
        if queue.is_empty() {
            return Some(RetryReport::default());
        }
        let report = queue.drain(self.remote.as_ref(), stop).await;
        tracing::info!(
            delivered = report.delivered,
            requeued = report.requeued,
            dropped = report.dropped,
            deferred = report.deferred,
            "Retry queue drained"
        );
        Some(report)
    }

    /// Execute one probe.
    pub async fn run(&mut self, probe: &Probe) -> ProbeOutcome {
        self.record(&format::probe_header(&probe.description));

        let entries = match self.enumerate(probe).await {
            Ok(entries) => entries,
            Err(error) => {
                let line = match &error {
                    SourceError::NotFound { path } => format::not_found(path),
                    SourceError::Access { reason, .. } => format::access_error(reason),
                };
                self.record(&line);
                tracing::warn!(
                    probe = %probe.description,
                    root = %probe.root,
                    path = %probe.path,
                    error = %error,
                    "Probe skipped"
                );
                return ProbeOutcome::Skipped { error };
            }
        };

        for entry in &entries {
            self.record(&format::entry_line(&probe.path, entry));
        }

        let snapshot = Snapshot::new(probe, entries);
        let record = snapshot.to_record();

        match self.remote.push(&probe.remote_path, &record).await {
            Ok(key) => {
                tracing::info!(
                    probe = %probe.description,
                    key = %key,
                    entries = snapshot.entries.len(),
                    "Successfully uploaded data to {}",
                    probe.remote_path
                );
                ProbeOutcome::Pushed { snapshot, key }
            }
            Err(error) => {
                tracing::warn!(
                    probe = %probe.description,
                    remote_path = %probe.remote_path,
                    error = %error,
                    "Failed to upload data"
                );
                if let Some(queue) = self.retry.as_mut() {
                    queue.enqueue(PendingPush::failed_once(&probe.remote_path, record));
                }
                ProbeOutcome::PushFailed { snapshot, error }
            }
        }
    }

    /// Enumerate on a blocking thread; store reads may touch the disk.
    async fn enumerate(&self, probe: &Probe) -> Result<Vec<crate::store::Entry>, SourceError> {
        let reader = Arc::clone(&self.reader);
        let (root, path) = (probe.root, probe.path.clone());

        tokio::task::spawn_blocking(move || reader.enumerate(root, &path))
            .await
            .unwrap_or_else(|e| {
                Err(SourceError::access(
                    &probe.path,
                    format!("reader task failed: {e}"),
                ))
            })
    }
}

impl std::fmt::Debug for SnapshotBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotBuilder")
            .field("reader", &self.reader.name())
            .field("remote", &self.remote.endpoint())
            .field("local", &self.local.path())
            .field("pending_retries", &self.pending_retries())
            .finish()
    }
}
