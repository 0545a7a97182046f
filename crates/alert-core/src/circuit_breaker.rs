//! Three-state circuit breaker (closed / open / half-open), the shared primitive
//! guarding the classifier RPC and every target publisher.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use alert_observability::AlertMetrics;
use parking_lot::Mutex;

use crate::error::StageError;

fn state_label(state: BreakerState) -> &'static str {
    match state {
        BreakerState::Closed => "closed",
        BreakerState::Open => "open",
        BreakerState::HalfOpen => "half_open",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitBreakerConfig {
    pub max_failures: u32,
    pub reset_timeout: Duration,
    pub failure_threshold: f64,
    pub time_window: Duration,
    pub min_samples: u32,
    pub slow_call_duration: Duration,
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            reset_timeout: Duration::from_secs(30),
            failure_threshold: 0.5,
            time_window: Duration::from_secs(60),
            min_samples: 20,
            slow_call_duration: Duration::from_secs(5),
            half_open_max_calls: 3,
        }
    }
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_issued: u32,
    half_open_successes: u32,
    window: VecDeque<(Instant, bool)>,
}

/// Point-in-time counters for observability. `{from, to}`-labeled state-change counts
/// are reported separately via [`CircuitBreaker::state`] comparisons by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct BreakerCounters {
    pub requests: u64,
    pub blocked: u64,
    pub failures: u64,
    pub successes: u64,
    pub state_changes: u64,
}

/// A named, thread-safe circuit breaker instance. One instance guards one downstream
/// collaborator (one classifier, or one publishing target); breaker state never
/// crosses instances.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    metrics: Mutex<Option<Arc<AlertMetrics>>>,
    requests: AtomicU64,
    blocked: AtomicU64,
    failures: AtomicU64,
    successes: AtomicU64,
    state_changes: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                half_open_issued: 0,
                half_open_successes: 0,
                window: VecDeque::new(),
            }),
            metrics: Mutex::new(None),
            requests: AtomicU64::new(0),
            blocked: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            state_changes: AtomicU64::new(0),
        }
    }

    /// Attaches a metrics handle. Callable at any point in the breaker's lifetime,
    /// including on an already-`Arc`-shared instance.
    #[must_use]
    pub fn with_metrics(self, metrics: Arc<AlertMetrics>) -> Self {
        self.set_metrics(metrics);
        self
    }

    pub fn set_metrics(&self, metrics: Arc<AlertMetrics>) {
        *self.metrics.lock() = Some(metrics);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    pub fn counters(&self) -> BreakerCounters {
        BreakerCounters {
            requests: self.requests.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            state_changes: self.state_changes.load(Ordering::Relaxed),
        }
    }

    /// Runs `f` if the breaker admits a call, recording success/failure for breaker
    /// accounting. A call whose duration exceeds `slow_call_duration` is recorded as
    /// a failure even though its `Ok` result is still returned to the caller.
    pub async fn call<F, Fut, T>(&self, f: F) -> Result<T, StageError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, StageError>>,
    {
        self.try_admit()?;
        self.requests.fetch_add(1, Ordering::Relaxed);

        let start = Instant::now();
        let result = f().await;
        let elapsed = start.elapsed();
        let is_failure = result.is_err() || elapsed > self.config.slow_call_duration;
        self.record_outcome(is_failure);
        result
    }

    fn try_admit(&self) -> Result<(), StageError> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let opened_at = inner.opened_at.unwrap_or_else(Instant::now);
                if opened_at.elapsed() >= self.config.reset_timeout {
                    self.transition(&mut inner, BreakerState::HalfOpen);
                    inner.half_open_issued = 1;
                    inner.half_open_successes = 0;
                    Ok(())
                } else {
                    self.record_blocked();
                    Err(StageError::BreakerOpen)
                }
            }
            BreakerState::HalfOpen => {
                if inner.half_open_issued < self.config.half_open_max_calls {
                    inner.half_open_issued += 1;
                    Ok(())
                } else {
                    self.record_blocked();
                    Err(StageError::BreakerOpen)
                }
            }
        }
    }

    fn record_blocked(&self) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = self.metrics.lock().as_ref() {
            metrics.breaker_blocked_total.with_label_values(&[&self.name]).inc();
        }
    }

    fn record_outcome(&self, is_failure: bool) {
        if is_failure {
            self.failures.fetch_add(1, Ordering::Relaxed);
        } else {
            self.successes.fetch_add(1, Ordering::Relaxed);
        }

        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.window.push_back((now, is_failure));
        self.prune_window(&mut inner, now);

        match inner.state {
            BreakerState::Closed => {
                if is_failure {
                    inner.consecutive_failures += 1;
                } else {
                    inner.consecutive_failures = 0;
                }
                if inner.consecutive_failures >= self.config.max_failures
                    || self.ratio_tripped(&inner)
                {
                    self.transition(&mut inner, BreakerState::Open);
                    inner.opened_at = Some(now);
                }
            }
            BreakerState::HalfOpen => {
                if is_failure {
                    self.transition(&mut inner, BreakerState::Open);
                    inner.opened_at = Some(now);
                } else {
                    inner.half_open_successes += 1;
                    if inner.half_open_successes >= self.config.half_open_max_calls {
                        self.transition(&mut inner, BreakerState::Closed);
                        inner.consecutive_failures = 0;
                    }
                }
            }
            BreakerState::Open => {}
        }
    }

    fn prune_window(&self, inner: &mut Inner, now: Instant) {
        while let Some((ts, _)) = inner.window.front() {
            if now.duration_since(*ts) > self.config.time_window {
                inner.window.pop_front();
            } else {
                break;
            }
        }
    }

    fn ratio_tripped(&self, inner: &Inner) -> bool {
        let total = inner.window.len() as u32;
        if total < self.config.min_samples {
            return false;
        }
        let failures = inner.window.iter().filter(|(_, f)| *f).count() as f64;
        failures / total as f64 >= self.config.failure_threshold
    }

    fn transition(&self, inner: &mut Inner, to: BreakerState) {
        if inner.state != to {
            tracing::info!(breaker = %self.name, from = ?inner.state, to = ?to, "circuit breaker state change");
            self.state_changes.fetch_add(1, Ordering::Relaxed);
            if let Some(metrics) = self.metrics.lock().as_ref() {
                metrics
                    .breaker_state_transitions_total
                    .with_label_values(&[&self.name, state_label(inner.state), state_label(to)])
                    .inc();
            }
            inner.state = to;
        }
    }
}
