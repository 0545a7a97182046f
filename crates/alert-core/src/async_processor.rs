//! Async processor: a bounded worker pool draining a fixed-capacity queue, used for
//! webhook work that does not require a synchronous response body.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant as TokioInstant;

use crate::error::StageError;
use crate::model::Alert;
use crate::processor::AlertProcessor;

/// One unit of out-of-band work.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub job_type: String,
    pub alert: Alert,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub attempts: u32,
}

/// Counters exposed for metrics export.
#[derive(Debug, Default, Clone, Copy)]
pub struct AsyncProcessorStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub dropped: u64,
    pub queue_depth: usize,
}

/// Outcome of a graceful stop: how many in-flight jobs finished within the stop
/// deadline versus how many were cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub drained: usize,
    pub cancelled: usize,
}

struct Counters {
    submitted: AtomicU32,
    completed: AtomicU32,
    failed: AtomicU32,
    dropped: AtomicU32,
    in_flight: AtomicUsize,
}

/// A fixed pool of worker tasks draining a bounded FIFO queue. `try_submit` fails
/// fast with `queue-full` instead of blocking the caller.
pub struct AsyncProcessor {
    sender: mpsc::Sender<Job>,
    workers: Vec<tokio::task::JoinHandle<()>>,
    counters: Arc<Counters>,
    queue_capacity: usize,
}

impl AsyncProcessor {
    /// Spawns `worker_count` workers draining a queue of `queue_capacity`. Every
    /// worker invokes `processor.process` for each job, with `per_job_timeout` and
    /// up to `max_attempts` requeues with exponential backoff on transient failure.
    pub fn start(
        worker_count: usize,
        queue_capacity: usize,
        max_attempts: u32,
        per_job_timeout: Duration,
        processor: Arc<AlertProcessor>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let counters = Arc::new(Counters {
            submitted: AtomicU32::new(0),
            completed: AtomicU32::new(0),
            failed: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
        });

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let receiver = receiver.clone();
            let sender = sender.clone();
            let processor = processor.clone();
            let counters = counters.clone();
            workers.push(tokio::spawn(Self::worker_loop(
                worker_id,
                receiver,
                sender,
                processor,
                counters,
                max_attempts,
                per_job_timeout,
            )));
        }

        Self {
            sender,
            workers,
            counters,
            queue_capacity,
        }
    }

    async fn worker_loop(
        _worker_id: usize,
        receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
        sender: mpsc::Sender<Job>,
        processor: Arc<AlertProcessor>,
        counters: Arc<Counters>,
        max_attempts: u32,
        per_job_timeout: Duration,
    ) {
        loop {
            let job = {
                let mut receiver = receiver.lock().await;
                receiver.recv().await
            };
            let Some(job) = job else {
                break;
            };

            counters.in_flight.fetch_add(1, Ordering::Relaxed);
            let outcome = tokio::time::timeout(
                per_job_timeout,
                processor.process(&job.alert, per_job_timeout),
            )
            .await;
            counters.in_flight.fetch_sub(1, Ordering::Relaxed);

            match outcome {
                Ok(Ok(_)) => {
                    counters.completed.fetch_add(1, Ordering::Relaxed);
                }
                (Ok(Err(_)) | Err(_)) if job.attempts + 1 < max_attempts => {
                    let delay = Duration::from_millis(250 * 2u64.pow(job.attempts));
                    let mut requeued = job.clone();
                    requeued.attempts += 1;
                    let sender = sender.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = sender.send(requeued).await;
                    });
                }
                Ok(Err(_)) | Err(_) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Non-blocking submission. Returns `queue-full` immediately if the channel's
    /// bounded capacity is exhausted, never waits for space.
    pub fn try_submit(&self, alert: Alert, job_type: impl Into<String>) -> Result<(), StageError> {
        let job = Job {
            id: uuid::Uuid::new_v4().to_string(),
            job_type: job_type.into(),
            alert,
            created_at: chrono::Utc::now(),
            attempts: 0,
        };
        match self.sender.try_send(job) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                Err(StageError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(StageError::Permanent(
                "async processor is shut down".into(),
            )),
        }
    }

    pub fn stats(&self) -> AsyncProcessorStats {
        AsyncProcessorStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed) as u64,
            completed: self.counters.completed.load(Ordering::Relaxed) as u64,
            failed: self.counters.failed.load(Ordering::Relaxed) as u64,
            dropped: self.counters.dropped.load(Ordering::Relaxed) as u64,
            queue_depth: self.queue_capacity - self.sender.capacity(),
        }
    }

    /// Stops accepting new jobs, drains in-flight work up to `stop_deadline`, and
    /// aborts whatever workers are still running past it.
    pub async fn stop(mut self, stop_deadline: Duration) -> ShutdownReport {
        drop(self.sender);
        let deadline = TokioInstant::now() + stop_deadline;

        let mut drained = 0;
        let mut cancelled = 0;
        for handle in self.workers.drain(..) {
            let remaining = deadline.saturating_duration_since(TokioInstant::now());
            match tokio::time::timeout(remaining, handle).await {
                Ok(_) => drained += 1,
                Err(_) => cancelled += 1,
            }
        }

        ShutdownReport { drained, cancelled }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryL2Cache;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use crate::classification::{ClassificationService, FallbackClassifier};
    use crate::config::{CacheConfig, ClassificationConfig, FilterConfig, PublishingConfig, IngestMode};
    use crate::filter::FilterEngine;
    use crate::ports::{ClassifierClient, HistoryEntry, HistorySink, SecretStoreReader};
    use crate::publishing::PublishingManager;
    use crate::silence::{SilenceManager, SilenceStore};
    use crate::model::{AlertStatus, Category, ClassificationResult, ClassificationSource, PublishingTarget, Severity};
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashMap};

    struct FixedClient;
    #[async_trait]
    impl ClassifierClient for FixedClient {
        async fn classify(&self, _alert: &Alert) -> Result<ClassificationResult, StageError> {
            Ok(ClassificationResult {
                category: Category::Performance,
                severity: Severity::Warning,
                confidence: 0.8,
                source: ClassificationSource::Llm,
                model_identifier: None,
                produced_at: chrono::Utc::now(),
            })
        }
        async fn health(&self) -> Result<(), StageError> {
            Ok(())
        }
    }

    struct NoSecrets;
    #[async_trait]
    impl SecretStoreReader for NoSecrets {
        async fn list_targets(&self) -> Result<Vec<PublishingTarget>, StageError> {
            Ok(Vec::new())
        }
        async fn resolve_credential(&self, _handle: &str) -> Result<String, StageError> {
            Ok(String::new())
        }
    }

    struct NoSilences;
    #[async_trait]
    impl SilenceStore for NoSilences {
        async fn list(&self) -> Result<Vec<crate::model::Silence>, StageError> {
            Ok(Vec::new())
        }
        async fn delete(&self, _id: &str) -> Result<(), StageError> {
            Ok(())
        }
    }

    struct NoopHistory;
    #[async_trait]
    impl HistorySink for NoopHistory {
        async fn record(&self, _entry: HistoryEntry) -> Result<(), StageError> {
            Ok(())
        }
    }

    fn test_processor() -> Arc<AlertProcessor> {
        let classification = ClassificationService::new(
            ClassificationConfig::default(),
            CacheConfig::default(),
            CircuitBreakerConfig::default(),
            Arc::new(InMemoryL2Cache::new()),
            Arc::new(FixedClient),
            FallbackClassifier::new(vec![]),
            4,
        );
        let filter = FilterEngine::new(FilterConfig::default());
        let publishing = PublishingManager::new(
            PublishingConfig::default(),
            CircuitBreakerConfig::default(),
            Arc::new(NoSecrets),
            HashMap::new(),
        );
        let silence = Arc::new(SilenceManager::new(Default::default(), Arc::new(NoSilences)));
        Arc::new(AlertProcessor::new(
            classification,
            filter,
            publishing,
            silence,
            Arc::new(NoopHistory),
            true,
            IngestMode::Sync,
        ))
    }

    fn alert() -> Alert {
        Alert {
            status: AlertStatus::Firing,
            labels: BTreeMap::from([("alertname".to_string(), "X".to_string())]),
            annotations: BTreeMap::new(),
            starts_at: chrono::Utc::now(),
            ends_at: None,
            source: "test".into(),
        }
    }

    #[tokio::test]
    async fn submission_fails_fast_when_queue_is_full() {
        let processor = test_processor();
        let async_processor = AsyncProcessor::start(0, 1, 3, Duration::from_secs(1), processor);
        // With zero live workers nothing drains the queue, so the second submission
        // observes it at capacity.
        assert!(async_processor.try_submit(alert(), "webhook").is_ok());
        assert_eq!(
            async_processor.try_submit(alert(), "webhook"),
            Err(StageError::QueueFull)
        );
    }

    #[tokio::test]
    async fn jobs_are_drained_and_counted_as_completed() {
        let processor = test_processor();
        let async_processor = AsyncProcessor::start(2, 10, 3, Duration::from_secs(1), processor);
        for _ in 0..5 {
            async_processor.try_submit(alert(), "webhook").unwrap();
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        let stats = async_processor.stats();
        assert_eq!(stats.completed, 5);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn stop_drains_in_flight_work() {
        let processor = test_processor();
        let async_processor = AsyncProcessor::start(2, 10, 3, Duration::from_secs(1), processor);
        for _ in 0..3 {
            async_processor.try_submit(alert(), "webhook").unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        let report = async_processor.stop(Duration::from_secs(2)).await;
        assert_eq!(report.cancelled, 0);
        assert_eq!(report.drained, 2);
    }
}
