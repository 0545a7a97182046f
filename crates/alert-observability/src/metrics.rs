//! Prometheus metrics for the alert proxy core.
//!
//! One [`AlertMetrics`] is constructed per process and threaded into the stage
//! services that want to record against it; none of `alert-core`'s stage services
//! require it (they work uninstrumented), but every production deployment wires one.
//!
//! # Metric groups
//! - Classification: cache hits/misses by tier, breaker state changes, LLM call latency.
//! - Filter: allow/deny counts by reason.
//! - Publishing: attempts/successes/failures by target, per-target duration.
//! - Async processor: queue depth, jobs submitted/completed/failed/dropped.

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use crate::error::Result;

const CLASSIFY_LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
const PUBLISH_LATENCY_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

#[derive(Clone)]
pub struct AlertMetrics {
    pub registry: Registry,

    /// Cache lookups by tier (`l1`, `l2`) and outcome (`hit`, `miss`, `error`).
    pub cache_lookups_total: IntCounterVec,
    /// Classifier calls by source (`llm`, `fallback`) and outcome (`success`, `error`).
    pub classifier_calls_total: IntCounterVec,
    /// Classifier call duration, labeled by source.
    pub classifier_call_duration_seconds: HistogramVec,
    /// Breaker state transitions, labeled by breaker name and `{from, to}`.
    pub breaker_state_transitions_total: IntCounterVec,
    /// Calls rejected by an open breaker, labeled by breaker name.
    pub breaker_blocked_total: IntCounterVec,

    /// Filter decisions by `allow`/`deny` and reason.
    pub filter_decisions_total: IntCounterVec,

    /// Publish attempts by target name and outcome (`success`, `transient`, `permanent`, `breaker_open`).
    pub publish_attempts_total: IntCounterVec,
    /// Publish call duration, labeled by target name.
    pub publish_duration_seconds: HistogramVec,

    /// Async processor queue depth (gauge).
    pub queue_depth: IntGauge,
    /// Async jobs by terminal outcome (`completed`, `failed`, `dropped`).
    pub async_jobs_total: IntCounterVec,
    /// Async job duration.
    pub async_job_duration_seconds: Histogram,

    /// Currently active silences, by status.
    pub silences_active: IntGaugeVec,
}

impl AlertMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let cache_lookups_total = IntCounterVec::new(
            Opts::new("alert_proxy_cache_lookups_total", "Cache lookups by tier and outcome"),
            &["tier", "outcome"],
        )?;
        let classifier_calls_total = IntCounterVec::new(
            Opts::new("alert_proxy_classifier_calls_total", "Classifier invocations by source and outcome"),
            &["source", "outcome"],
        )?;
        let classifier_call_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "alert_proxy_classifier_call_duration_seconds",
                "Classifier call duration in seconds",
            )
            .buckets(CLASSIFY_LATENCY_BUCKETS.to_vec()),
            &["source"],
        )?;
        let breaker_state_transitions_total = IntCounterVec::new(
            Opts::new("alert_proxy_breaker_state_transitions_total", "Circuit breaker state transitions"),
            &["breaker", "from", "to"],
        )?;
        let breaker_blocked_total = IntCounterVec::new(
            Opts::new("alert_proxy_breaker_blocked_total", "Calls rejected by an open circuit breaker"),
            &["breaker"],
        )?;
        let filter_decisions_total = IntCounterVec::new(
            Opts::new("alert_proxy_filter_decisions_total", "Filter decisions by allow/deny and reason"),
            &["allowed", "reason"],
        )?;
        let publish_attempts_total = IntCounterVec::new(
            Opts::new("alert_proxy_publish_attempts_total", "Publish attempts by target and outcome"),
            &["target", "outcome"],
        )?;
        let publish_duration_seconds = HistogramVec::new(
            HistogramOpts::new("alert_proxy_publish_duration_seconds", "Per-target publish duration in seconds")
                .buckets(PUBLISH_LATENCY_BUCKETS.to_vec()),
            &["target"],
        )?;
        let queue_depth = IntGauge::new("alert_proxy_async_queue_depth", "Current async job queue depth")?;
        let async_jobs_total = IntCounterVec::new(
            Opts::new("alert_proxy_async_jobs_total", "Async jobs by terminal outcome"),
            &["outcome"],
        )?;
        let async_job_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "alert_proxy_async_job_duration_seconds",
            "Async job handler duration in seconds",
        ))?;
        let silences_active = IntGaugeVec::new(
            Opts::new("alert_proxy_silences_active", "Silence count by status"),
            &["status"],
        )?;

        registry.register(Box::new(cache_lookups_total.clone()))?;
        registry.register(Box::new(classifier_calls_total.clone()))?;
        registry.register(Box::new(classifier_call_duration_seconds.clone()))?;
        registry.register(Box::new(breaker_state_transitions_total.clone()))?;
        registry.register(Box::new(breaker_blocked_total.clone()))?;
        registry.register(Box::new(filter_decisions_total.clone()))?;
        registry.register(Box::new(publish_attempts_total.clone()))?;
        registry.register(Box::new(publish_duration_seconds.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(async_jobs_total.clone()))?;
        registry.register(Box::new(async_job_duration_seconds.clone()))?;
        registry.register(Box::new(silences_active.clone()))?;

        Ok(Self {
            registry,
            cache_lookups_total,
            classifier_calls_total,
            classifier_call_duration_seconds,
            breaker_state_transitions_total,
            breaker_blocked_total,
            filter_decisions_total,
            publish_attempts_total,
            publish_duration_seconds,
            queue_depth,
            async_jobs_total,
            async_job_duration_seconds,
            silences_active,
        })
    }

    /// Renders the registry in the Prometheus text exposition format, for a scrape
    /// endpoint the embedding HTTP layer owns (out of scope for this crate).
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registers_without_duplicate_metric_error() {
        let metrics = AlertMetrics::new().expect("metrics should register cleanly");
        metrics.cache_lookups_total.with_label_values(&["l1", "hit"]).inc();
        metrics.queue_depth.set(42);
        let text = metrics.export().expect("export should succeed");
        assert!(text.contains("alert_proxy_cache_lookups_total"));
        assert!(text.contains("alert_proxy_async_queue_depth 42"));
    }
}
