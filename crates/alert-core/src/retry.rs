//! Exponential backoff with jitter, shared by the classifier and every target
//! publisher.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::StageError;

/// Exponential-backoff retry configuration.
///
/// Defaults match the publishing fan-out policy in the design notes: `base = 500ms`,
/// `multiplier = 2`, `max_delay = 30s`, `max_attempts = 3`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Fraction of the computed delay (0.0-1.0) to randomize, avoiding thundering herd.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.3,
        }
    }
}

impl RetryPolicy {
    /// `n` attempts, teacher-default base/max delay and jitter.
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// `n` attempts with explicit base/max delay in milliseconds.
    pub fn exponential_with_params(max_attempts: u32, base_ms: u64, max_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
            ..Self::default()
        }
    }

    /// The classifier's default: 2 retries (3 total attempts at the call site, since
    /// the first attempt is not itself a "retry").
    pub fn classifier_default() -> Self {
        Self::exponential_with_params(2, 500, 10_000)
    }

    /// Delay before the given 1-indexed attempt number, with jitter applied.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let raw_ms = (self.base_delay.as_millis() as f64 * exp).min(self.max_delay.as_millis() as f64);
        let jitter_span = raw_ms * self.jitter;
        let jittered = if jitter_span > 0.0 {
            let offset = rand::thread_rng().gen_range(-jitter_span..=jitter_span);
            (raw_ms + offset).max(0.0)
        } else {
            raw_ms
        };
        Duration::from_millis(jittered as u64)
    }
}

/// Retry-After hint a publisher may carry back from an HTTP 429 response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAfter(pub Duration);

/// Runs `op` up to `policy.max_attempts` times, sleeping with exponential backoff
/// between attempts. Stops early on a non-retryable error. `retry_after` lets the
/// caller honor an upstream `Retry-After` header instead of the computed delay.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, StageError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, StageError>>,
{
    with_retry_after(policy, |attempt| async {
        (op(attempt).await, None)
    })
    .await
}

/// Like [`with_retry`], but `op` may additionally report a `Retry-After` hint that
/// overrides the computed backoff delay for the next attempt.
pub async fn with_retry_after<T, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, StageError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = (Result<T, StageError>, Option<RetryAfter>)>,
{
    let mut attempt = 1;
    loop {
        let (result, retry_after) = op(attempt).await;
        match result {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && err.is_retryable() => {
                let delay = retry_after
                    .map(|r| r.0)
                    .unwrap_or_else(|| policy.delay_for_attempt(attempt));
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
