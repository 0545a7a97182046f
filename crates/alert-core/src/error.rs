//! Error taxonomy shared by every stage.
//!
//! Stages never propagate these as bare `Result` failures to the orchestrator; each
//! stage folds its own errors into a `(decision, outcome-status)` pair and only the
//! `Validation` kind (or a `strict`-mode failure) ever surfaces as a top-level error.

use thiserror::Error;

/// Language-neutral error kind, matching the taxonomy in the design notes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StageError {
    /// Malformed input; never retried; surfaces as a 4xx to the caller.
    #[error("validation error: {0}")]
    Validation(String),

    /// Deadline elapsed; retried at the stage level if budget remains.
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Network error, 5xx, or 429; retried with backoff.
    #[error("transient error: {0}")]
    Transient(String),

    /// 4xx (other than 429) or contract violation; not retried.
    #[error("permanent error: {0}")]
    Permanent(String),

    /// Downstream temporarily refused by a circuit breaker.
    #[error("circuit breaker open")]
    BreakerOpen,

    /// Async submission rejected because the queue is at capacity.
    #[error("queue is full")]
    QueueFull,

    /// Non-fatal: treated as a miss, logged, and classification continues.
    #[error("cache miss")]
    CacheMiss,

    /// Non-fatal: a cache read or write failed; treated as a miss/no-op.
    #[error("cache error: {0}")]
    CacheError(String),

    /// Some targets failed; the request still returns success with a per-target
    /// breakdown.
    #[error("partial failure: {0}")]
    Partial(String),
}

impl StageError {
    /// Whether this kind should be retried by a generic retry loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StageError::Timeout(_) | StageError::Transient(_))
    }
}

pub type StageResult<T> = Result<T, StageError>;
