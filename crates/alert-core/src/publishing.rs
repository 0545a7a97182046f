//! Publishing manager: parallel fan-out to every enabled target, each wrapped by
//! its own circuit breaker and retry loop, with per-target fault isolation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use alert_observability::AlertMetrics;
use parking_lot::RwLock;
use tokio::task::JoinSet;

use crate::circuit_breaker::{BreakerCounters, BreakerState, CircuitBreaker, CircuitBreakerConfig};
use crate::config::PublishingConfig;
use crate::error::StageError;
use crate::model::{Alert, ClassificationResult, PublishResult, PublishingTarget};
use crate::ports::{SecretStoreReader, TargetPublisher};
use crate::retry::with_retry_after;

/// Per-target counters snapshot, combining publish attempt accounting with the
/// target's circuit breaker state.
#[derive(Debug, Clone)]
pub struct TargetStats {
    pub target_name: String,
    pub attempts_total: u64,
    pub successes_total: u64,
    pub failures_total: u64,
    pub breaker_state: BreakerState,
}

struct TargetEntry {
    target: PublishingTarget,
    breaker: Arc<CircuitBreaker>,
    attempts_total: std::sync::atomic::AtomicU64,
    successes_total: std::sync::atomic::AtomicU64,
    failures_total: std::sync::atomic::AtomicU64,
}

/// Fans an allowed alert out to every enabled target in parallel; one target's
/// failure never affects another's breaker state or retry budget.
pub struct PublishingManager {
    config: PublishingConfig,
    breaker_config: CircuitBreakerConfig,
    secrets: Arc<dyn SecretStoreReader>,
    publishers: HashMap<crate::model::TargetKind, Arc<dyn TargetPublisher>>,
    targets: RwLock<Arc<Vec<Arc<TargetEntry>>>>,
    metrics: Option<Arc<AlertMetrics>>,
}

impl PublishingManager {
    pub fn new(
        config: PublishingConfig,
        breaker_config: CircuitBreakerConfig,
        secrets: Arc<dyn SecretStoreReader>,
        publishers: HashMap<crate::model::TargetKind, Arc<dyn TargetPublisher>>,
    ) -> Self {
        Self {
            config,
            breaker_config,
            secrets,
            publishers,
            targets: RwLock::new(Arc::new(Vec::new())),
            metrics: None,
        }
    }

    /// Attaches a metrics handle, backfilling every already-discovered target's
    /// breaker and applying it to any breaker created by a later `refresh_targets`.
    #[must_use]
    pub fn with_metrics(self, metrics: Arc<AlertMetrics>) -> Self {
        for entry in self.targets.read().iter() {
            entry.breaker.set_metrics(metrics.clone());
        }
        Self {
            metrics: Some(metrics),
            ..self
        }
    }

    /// Reloads the target set from the secret store and atomically swaps it in.
    /// Breakers for targets that survive the refresh (same name) keep their state;
    /// new targets start closed.
    pub async fn refresh_targets(&self) -> Result<(), StageError> {
        let fetched = self.secrets.list_targets().await?;
        let previous = self.targets.read().clone();

        let mut entries = Vec::with_capacity(fetched.len());
        for target in fetched {
            let breaker = previous
                .iter()
                .find(|e| e.target.name == target.name)
                .map(|e| e.breaker.clone())
                .unwrap_or_else(|| {
                    let mut breaker = CircuitBreaker::new(target.name.clone(), self.breaker_config);
                    if let Some(metrics) = &self.metrics {
                        breaker = breaker.with_metrics(metrics.clone());
                    }
                    Arc::new(breaker)
                });
            entries.push(Arc::new(TargetEntry {
                target,
                breaker,
                attempts_total: std::sync::atomic::AtomicU64::new(0),
                successes_total: std::sync::atomic::AtomicU64::new(0),
                failures_total: std::sync::atomic::AtomicU64::new(0),
            }));
        }

        *self.targets.write() = Arc::new(entries);
        Ok(())
    }

    pub fn list_targets(&self) -> Vec<PublishingTarget> {
        self.targets
            .read()
            .iter()
            .map(|e| e.target.clone())
            .collect()
    }

    /// Publishes to every enabled target concurrently; per-target deadline is
    /// `min(remaining, per_target_timeout)`. Targets still running when `deadline`
    /// elapses are recorded as timeout failures.
    pub async fn publish(
        &self,
        alert: &Alert,
        classification: &ClassificationResult,
        deadline: Duration,
    ) -> Vec<PublishResult> {
        if !self.config.enabled {
            return Vec::new();
        }

        let snapshot = self.targets.read().clone();
        let per_target_timeout = self.config.per_target_timeout.min(deadline);
        let enabled: Vec<_> = snapshot.iter().filter(|e| e.target.enabled).cloned().collect();

        let mut joinset = JoinSet::new();
        for entry in &enabled {
            let entry = entry.clone();
            let publisher = self.publishers.get(&entry.target.kind).cloned();
            let alert = alert.clone();
            let classification = classification.clone();
            let retry = self.config.retry;
            let metrics = self.metrics.clone();

            joinset.spawn(async move {
                Self::publish_one(entry, publisher, alert, classification, retry, per_target_timeout, metrics).await
            });
        }

        let mut results: Vec<PublishResult> = Vec::new();
        let overall = tokio::time::timeout(deadline, async {
            while let Some(joined) = joinset.join_next().await {
                if let Ok(result) = joined {
                    results.push(result);
                }
            }
        })
        .await;

        if overall.is_err() {
            joinset.abort_all();
            for entry in &enabled {
                if results.iter().any(|r| r.target_name == entry.target.name) {
                    continue;
                }
                results.push(PublishResult {
                    target_name: entry.target.name.clone(),
                    success: false,
                    attempts: 0,
                    duration: deadline,
                    terminal_error: Some("deadline exceeded".into()),
                });
            }
        }

        results
    }

    async fn publish_one(
        entry: Arc<TargetEntry>,
        publisher: Option<Arc<dyn TargetPublisher>>,
        alert: Alert,
        classification: ClassificationResult,
        retry: crate::retry::RetryPolicy,
        timeout: Duration,
        metrics: Option<Arc<AlertMetrics>>,
    ) -> PublishResult {
        let start = Instant::now();
        let target_name = entry.target.name.clone();

        let Some(publisher) = publisher else {
            return PublishResult {
                target_name,
                success: false,
                attempts: 0,
                duration: start.elapsed(),
                terminal_error: Some("no publisher registered for target kind".into()),
            };
        };

        let payload = match publisher.format(&alert, &classification) {
            Ok(payload) => payload,
            Err(err) => {
                return PublishResult {
                    target_name,
                    success: false,
                    attempts: 0,
                    duration: start.elapsed(),
                    terminal_error: Some(err.to_string()),
                };
            }
        };

        let attempts = std::sync::atomic::AtomicU32::new(0);
        let target_for_publish = entry.target.clone();

        let result = tokio::time::timeout(
            timeout,
            entry.breaker.call(|| {
                let publisher = publisher.clone();
                let target = target_for_publish.clone();
                let payload = payload.clone();
                let attempts = &attempts;
                with_retry_after(&retry, move |attempt| {
                    attempts.store(attempt, std::sync::atomic::Ordering::SeqCst);
                    let publisher = publisher.clone();
                    let target = target.clone();
                    let payload = payload.clone();
                    async move { publisher.publish(&target, &payload).await }
                })
            }),
        )
        .await;

        entry
            .attempts_total
            .fetch_add(
                attempts.load(std::sync::atomic::Ordering::SeqCst).max(1) as u64,
                std::sync::atomic::Ordering::Relaxed,
            );

        let outcome = match result {
            Ok(Ok(())) => {
                entry
                    .successes_total
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                PublishResult {
                    target_name,
                    success: true,
                    attempts: attempts.load(std::sync::atomic::Ordering::SeqCst).max(1),
                    duration: start.elapsed(),
                    terminal_error: None,
                }
            }
            Ok(Err(err)) => {
                entry
                    .failures_total
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                PublishResult {
                    target_name,
                    success: false,
                    attempts: attempts.load(std::sync::atomic::Ordering::SeqCst).max(1),
                    duration: start.elapsed(),
                    terminal_error: Some(err.to_string()),
                }
            }
            Err(_) => {
                entry
                    .failures_total
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                PublishResult {
                    target_name,
                    success: false,
                    attempts: attempts.load(std::sync::atomic::Ordering::SeqCst).max(1),
                    duration: start.elapsed(),
                    terminal_error: Some(format!("timed out after {timeout:?}")),
                }
            }
        };

        if let Some(metrics) = &metrics {
            let label = if outcome.success { "success" } else { "failure" };
            metrics
                .publish_attempts_total
                .with_label_values(&[&outcome.target_name, label])
                .inc();
            metrics
                .publish_duration_seconds
                .with_label_values(&[&outcome.target_name])
                .observe(outcome.duration.as_secs_f64());
        }

        outcome
    }

    pub fn stats(&self) -> Vec<TargetStats> {
        self.targets
            .read()
            .iter()
            .map(|e| TargetStats {
                target_name: e.target.name.clone(),
                attempts_total: e.attempts_total.load(std::sync::atomic::Ordering::Relaxed),
                successes_total: e.successes_total.load(std::sync::atomic::Ordering::Relaxed),
                failures_total: e.failures_total.load(std::sync::atomic::Ordering::Relaxed),
                breaker_state: e.breaker.state(),
            })
            .collect()
    }

    pub fn breaker_counters(&self, target_name: &str) -> Option<BreakerCounters> {
        self.targets
            .read()
            .iter()
            .find(|e| e.target.name == target_name)
            .map(|e| e.breaker.counters())
    }
}
