//! Bounded retry queue for failed pushes.
//!
//! Only used when delivery mode is `retry_queue`. Failed pushes are parked
//! here and re-attempted once at the start of each following sweep until
//! they succeed or run out of attempts. When the queue is full the oldest
//! entry is dropped.

use std::collections::VecDeque;

use super::RemoteSink;
use crate::snapshot::SnapshotRecord;

/// A push waiting for another attempt.
#[derive(Debug, Clone)]
pub struct PendingPush {
    pub path: String,
    pub record: SnapshotRecord,
    /// Attempts made so far, including the original one.
    pub attempts: u32,
}

impl PendingPush {
    /// A push whose first attempt just failed.
    pub fn failed_once(path: impl Into<String>, record: SnapshotRecord) -> Self {
        Self {
            path: path.into(),
            record,
            attempts: 1,
        }
    }
}

/// Counts from one [`RetryQueue::drain`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RetryReport {
    pub delivered: usize,
    pub requeued: usize,
    pub dropped: usize,
    /// Left untouched because `stop` fired first.
    pub deferred: usize,
}

/// FIFO of failed pushes with a fixed capacity and attempt limit.
#[derive(Debug)]
pub struct RetryQueue {
    pending: VecDeque<PendingPush>,
    capacity: usize,
    max_attempts: u32,
}

impl RetryQueue {
    pub fn new(capacity: usize, max_attempts: u32) -> Self {
        Self {
            pending: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Park a failed push.
    ///
    /// Returns the push that was discarded to make room, or `push` itself if
    /// it has already used all its attempts.
    pub fn enqueue(&mut self, push: PendingPush) -> Option<PendingPush> {
        if push.attempts >= self.max_attempts {
            tracing::warn!(
                path = %push.path,
                attempts = push.attempts,
                "Push exhausted its attempts, dropping"
            );
            return Some(push);
        }

        let evicted = if self.pending.len() >= self.capacity {
            let oldest = self.pending.pop_front();
            if let Some(ref old) = oldest {
                tracing::warn!(
                    path = %old.path,
                    capacity = self.capacity,
                    "Retry queue full, dropping oldest push"
                );
            }
            oldest
        } else {
            None
        };

        self.pending.push_back(push);
        evicted
    }

    /// Re-attempt every parked push once, in FIFO order.
    ///
    /// `stop` is checked before each attempt. Once it returns `true` the
    /// remaining pushes stay parked, ahead of any that were requeued.
    pub async fn drain(&mut self, sink: &dyn RemoteSink, stop: impl Fn() -> bool) -> RetryReport {
        let mut report = RetryReport::default();
        let mut batch = std::mem::take(&mut self.pending);

        while let Some(mut push) = batch.pop_front() {
            if stop() {
                batch.push_front(push);
                report.deferred = batch.len();
                tracing::info!(deferred = report.deferred, "Retry pass stopped early");
                break;
            }

            push.attempts += 1;
            match sink.push(&push.path, &push.record).await {
                Ok(key) => {
                    tracing::info!(
                        path = %push.path,
                        key = %key,
                        attempts = push.attempts,
                        "Retried push delivered"
                    );
                    report.delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %push.path, attempts = push.attempts, error = %e, "Retried push failed");
                    match self.enqueue(push) {
                        Some(dropped) if dropped.attempts >= self.max_attempts => {
                            report.dropped += 1;
                        }
                        Some(_) => {
                            report.requeued += 1;
                            report.dropped += 1;
                        }
                        None => report.requeued += 1,
                    }
                }
            }
        }

        batch.append(&mut self.pending);
        self.pending = batch;
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;
    use crate::sink::SinkError;

    fn record(desc: &str) -> SnapshotRecord {
        SnapshotRecord {
            description: desc.to_string(),
            sub_key: "X".to_string(),
            values: Vec::new(),
            collected_at: Utc::now(),
        }
    }

    /// Fails the first `failures` pushes, then succeeds.
    struct FlakySink {
        failures: Mutex<usize>,
        pushed: Mutex<Vec<String>>,
    }

    impl FlakySink {
        fn new(failures: usize) -> Self {
            Self {
                failures: Mutex::new(failures),
                pushed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl RemoteSink for FlakySink {
        fn endpoint(&self) -> &str {
            "flaky"
        }

        async fn push(&self, path: &str, record: &SnapshotRecord) -> Result<String, SinkError> {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(SinkError::Push {
                    path: path.to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            self.pushed.lock().unwrap().push(record.description.clone());
            Ok(format!("-key{}", self.pushed.lock().unwrap().len()))
        }
    }

    #[test]
    fn test_enqueue_evicts_oldest_when_full() {
        let mut queue = RetryQueue::new(2, 3);
        assert!(queue.enqueue(PendingPush::failed_once("/a", record("a"))).is_none());
        assert!(queue.enqueue(PendingPush::failed_once("/b", record("b"))).is_none());

        let evicted = queue
            .enqueue(PendingPush::failed_once("/c", record("c")))
            .unwrap();
        assert_eq!(evicted.path, "/a");
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_enqueue_rejects_exhausted_push() {
        let mut queue = RetryQueue::new(4, 1);
        let rejected = queue.enqueue(PendingPush::failed_once("/a", record("a")));
        assert!(rejected.is_some());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_drain_delivers_pending() {
        let sink = FlakySink::new(0);
        let mut queue = RetryQueue::new(4, 3);
        queue.enqueue(PendingPush::failed_once("/a", record("a")));
        queue.enqueue(PendingPush::failed_once("/b", record("b")));

        let report = queue.drain(&sink, || false).await;
        assert_eq!(
            report,
            RetryReport {
                delivered: 2,
                requeued: 0,
                dropped: 0,
                deferred: 0,
            }
        );
        assert!(queue.is_empty());
        assert_eq!(*sink.pushed.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_drain_respects_attempt_limit() {
        let sink = FlakySink::new(usize::MAX);
        let mut queue = RetryQueue::new(4, 3);
        queue.enqueue(PendingPush::failed_once("/a", record("a")));

        // Attempt 2 fails, push is parked again.
        let report = queue.drain(&sink, || false).await;
        assert_eq!(report.requeued, 1);
        assert_eq!(queue.len(), 1);

        // Attempt 3 fails and exhausts the limit.
        let report = queue.drain(&sink, || false).await;
        assert_eq!(report.dropped, 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_drain_stops_early_and_keeps_order() {
        let sink = FlakySink::new(0);
        let mut queue = RetryQueue::new(4, 3);
        for name in ["a", "b", "c"] {
            queue.enqueue(PendingPush::failed_once(format!("/{name}"), record(name)));
        }

        let attempts = std::cell::Cell::new(0);
        let report = queue
            .drain(&sink, || {
                attempts.set(attempts.get() + 1);
                attempts.get() > 1
            })
            .await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.deferred, 2);
        assert_eq!(queue.len(), 2);

        queue.drain(&sink, || false).await;
        assert!(queue.is_empty());
        assert_eq!(*sink.pushed.lock().unwrap(), vec!["a", "b", "c"]);
    }
}
