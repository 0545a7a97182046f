//! Classification service: two-tier cache, single-flight coalescing, circuit-breaker
//! protected classifier RPC, and rule-based fallback.

use std::sync::Arc;
use std::time::{Duration, Instant};

use alert_observability::AlertMetrics;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use crate::cache::{L1Cache, L2Cache};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::config::{CacheConfig, ClassificationConfig};
use crate::error::StageError;
use crate::model::{Alert, Category, ClassificationResult, ClassificationSource, Severity};
use crate::ports::ClassifierClient;
use crate::retry::{with_retry, RetryPolicy};
use crate::single_flight::SingleFlight;

/// Aggregate health of the classification service, derived from the breaker state
/// and a direct probe of the underlying client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Ok,
    Degraded,
    Down,
}

/// Rule-based best-effort classifier used when the LLM call fails terminally.
/// Always produces a result; never fails.
pub struct FallbackClassifier {
    noisy_namespaces: Vec<String>,
}

impl FallbackClassifier {
    pub fn new(noisy_namespaces: Vec<String>) -> Self {
        Self { noisy_namespaces }
    }

    pub fn classify(&self, alert: &Alert) -> ClassificationResult {
        let alertname_lower = alert.alertname().to_ascii_lowercase();
        let severity_label = alert.label("severity").to_ascii_lowercase();
        let namespace = alert.namespace();

        let (category, severity, confidence) = if alertname_lower.contains("test") {
            (Category::Test, Severity::Noise, 0.5)
        } else if self.noisy_namespaces.iter().any(|ns| ns == namespace) {
            (Category::Noise, Severity::Noise, 0.4)
        } else {
            let severity = match severity_label.as_str() {
                "critical" => Severity::Critical,
                "warning" => Severity::Warning,
                "info" => Severity::Info,
                _ => Severity::Warning,
            };
            let category = if alertname_lower.contains("security")
                || alertname_lower.contains("breach")
            {
                Category::Security
            } else if alertname_lower.contains("down") || alertname_lower.contains("unavailable") {
                Category::Availability
            } else {
                Category::Performance
            };
            (category, severity, 0.5)
        };

        ClassificationResult {
            category,
            severity,
            confidence,
            source: ClassificationSource::Fallback,
            model_identifier: None,
            produced_at: chrono::Utc::now(),
        }
    }
}

/// Produces a `ClassificationResult` for an alert with bounded latency, minimizing
/// calls to the external classifier via a two-tier cache and single-flight
/// coalescing.
pub struct ClassificationService {
    config: ClassificationConfig,
    cache_config: CacheConfig,
    l1: L1Cache,
    l2: Arc<dyn L2Cache>,
    client: Arc<dyn ClassifierClient>,
    fallback: FallbackClassifier,
    breaker: CircuitBreaker,
    single_flight: SingleFlight<ClassificationResult>,
    retry_policy: RetryPolicy,
    warm_concurrency: usize,
    metrics: Option<Arc<AlertMetrics>>,
}

impl ClassificationService {
    pub fn new(
        config: ClassificationConfig,
        cache_config: CacheConfig,
        breaker_config: CircuitBreakerConfig,
        l2: Arc<dyn L2Cache>,
        client: Arc<dyn ClassifierClient>,
        fallback: FallbackClassifier,
        warm_concurrency: usize,
    ) -> Self {
        let retry_policy = config.retry_policy();
        Self {
            l1: L1Cache::new(cache_config.l1_capacity),
            cache_config,
            breaker: CircuitBreaker::new("classifier", breaker_config),
            single_flight: SingleFlight::new(),
            retry_policy,
            fallback,
            client,
            config,
            l2,
            warm_concurrency,
            metrics: None,
        }
    }

    /// Attaches a metrics handle, propagating it to the internal classifier breaker
    /// as well.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<AlertMetrics>) -> Self {
        self.breaker.set_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    fn record_cache_lookup(&self, tier: &str, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.cache_lookups_total.with_label_values(&[tier, outcome]).inc();
        }
    }

    fn record_classifier_call(&self, source: &str, outcome: &str, duration: Duration) {
        if let Some(metrics) = &self.metrics {
            metrics.classifier_calls_total.with_label_values(&[source, outcome]).inc();
            metrics
                .classifier_call_duration_seconds
                .with_label_values(&[source])
                .observe(duration.as_secs_f64());
        }
    }

    /// Classifies one alert within `deadline`. Never returns an error: on any
    /// terminal failure the fallback classifier's result is returned instead.
    pub async fn classify(&self, alert: &Alert, deadline: Duration) -> ClassificationResult {
        if !self.config.enabled {
            return ClassificationResult::disabled();
        }

        let fingerprint = alert.fingerprint();

        if let Some(mut hit) = self.l1.get(&fingerprint) {
            self.record_cache_lookup("l1", "hit");
            hit.source = ClassificationSource::L1Cache;
            return hit;
        }
        self.record_cache_lookup("l1", "miss");

        match self.l2.get(&fingerprint).await {
            Ok(Some(mut hit)) => {
                self.record_cache_lookup("l2", "hit");
                self.l1.put(fingerprint, hit.clone());
                hit.source = ClassificationSource::L2Cache;
                return hit;
            }
            Ok(None) => {
                self.record_cache_lookup("l2", "miss");
            }
            Err(err) => {
                self.record_cache_lookup("l2", "error");
                tracing::warn!(error = %err, "l2 cache read failed, treating as miss");
            }
        }

        let deadline_start = Instant::now();
        let client = self.client.clone();
        let alert_owned = alert.clone();
        let timeout = self.config.timeout.min(deadline);

        let call_started = Instant::now();
        let result = self
            .single_flight
            .run(&fingerprint, || async move {
                Self::classify_via_breaker_and_retry(
                    &self.breaker,
                    &self.retry_policy,
                    client,
                    alert_owned,
                    timeout,
                )
                .await
            })
            .await;
        let call_elapsed = call_started.elapsed();

        match result {
            Ok(classification) => {
                self.record_classifier_call("llm", "success", call_elapsed);
                self.l1.put(fingerprint.clone(), classification.clone());
                if let Err(err) = self
                    .l2
                    .put(&fingerprint, classification.clone(), self.cache_config.l2_ttl)
                    .await
                {
                    tracing::warn!(error = %err, "l2 cache write failed");
                }
                classification
            }
            Err(_) if self.config.fallback_enabled => {
                self.record_classifier_call("llm", "error", call_elapsed);
                let _ = deadline_start.elapsed();
                self.record_classifier_call("fallback", "success", Duration::ZERO);
                self.fallback.classify(alert)
            }
            Err(_) => {
                self.record_classifier_call("llm", "error", call_elapsed);
                ClassificationResult::disabled()
            }
        }
    }

    async fn classify_via_breaker_and_retry(
        breaker: &CircuitBreaker,
        policy: &RetryPolicy,
        client: Arc<dyn ClassifierClient>,
        alert: Alert,
        timeout: Duration,
    ) -> Result<ClassificationResult, StageError> {
        breaker
            .call(|| {
                let client = client.clone();
                let alert = alert.clone();
                async move {
                    with_retry(policy, |_attempt| {
                        let client = client.clone();
                        let alert = alert.clone();
                        async move {
                            match tokio::time::timeout(timeout, client.classify(&alert)).await {
                                Ok(result) => result,
                                Err(_) => Err(StageError::Timeout(timeout)),
                            }
                        }
                    })
                    .await
                }
            })
            .await
    }

    /// Classifies multiple alerts concurrently, bounded by the same worker-count
    /// configuration as the async processor.
    pub async fn classify_batch(
        &self,
        alerts: &[Alert],
        deadline: Duration,
        max_concurrency: usize,
    ) -> Vec<ClassificationResult> {
        let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
        let mut futures = FuturesUnordered::new();
        for (idx, alert) in alerts.iter().enumerate() {
            let semaphore = semaphore.clone();
            let alert = alert.clone();
            futures.push(async move {
                let _permit = semaphore.acquire_owned().await;
                (idx, self.classify(&alert, deadline).await)
            });
        }

        let mut results = vec![ClassificationResult::disabled(); alerts.len()];
        while let Some((idx, result)) = futures.next().await {
            results[idx] = result;
        }
        results
    }

    /// Best-effort concurrent L2 prefetch for the given fingerprints. Populates L1
    /// for any fingerprint found in L2; does not invoke the classifier.
    pub async fn warm(&self, fingerprints: &[String]) {
        let semaphore = Arc::new(Semaphore::new(self.warm_concurrency.max(1)));
        let mut futures = FuturesUnordered::new();
        for fp in fingerprints {
            let semaphore = semaphore.clone();
            let fp = fp.clone();
            futures.push(async move {
                let _permit = semaphore.acquire_owned().await;
                (fp.clone(), self.l2.get(&fp).await)
            });
        }
        while let Some((fp, result)) = futures.next().await {
            if let Ok(Some(hit)) = result {
                self.l1.put(fp, hit);
            }
        }
    }

    pub async fn health(&self) -> Health {
        use crate::circuit_breaker::BreakerState;
        match self.breaker.state() {
            BreakerState::Closed => match self.client.health().await {
                Ok(()) => Health::Ok,
                Err(_) => Health::Degraded,
            },
            BreakerState::HalfOpen => Health::Degraded,
            BreakerState::Open => Health::Down,
        }
    }
}
