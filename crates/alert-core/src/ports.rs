//! Capability-set traits for every external collaborator the pipeline depends on.
//!
//! Each trait names only the operations a given stage actually needs; there is no
//! shared base "client" type. `alert-classifier`, `alert-targets` and `alert-secrets`
//! provide real implementations, `alert-testing` provides mocks.

use async_trait::async_trait;

use crate::error::StageError;
use crate::model::{Alert, ClassificationResult, PublishingTarget};
use crate::retry::RetryAfter;

/// Produces a classification for an alert. Implementations own their own transport,
/// retry and timeout handling; the circuit breaker wrapping calls to this trait lives
/// in `ClassificationService`, not in the implementation.
#[async_trait]
pub trait ClassifierClient: Send + Sync {
    async fn classify(&self, alert: &Alert) -> Result<ClassificationResult, StageError>;

    /// Cheap liveness probe used by health aggregation; must not itself classify.
    async fn health(&self) -> Result<(), StageError>;
}

/// Delivers a classified, filtered alert to one external target.
#[async_trait]
pub trait TargetPublisher: Send + Sync {
    /// Renders the alert into this target's wire format. Pure; no I/O.
    fn format(&self, alert: &Alert, classification: &ClassificationResult) -> Result<String, StageError>;

    /// Sends the already-formatted payload. The returned `Option<RetryAfter>` carries
    /// a `Retry-After` hint parsed from a 429 response, if any; the retry loop uses it
    /// in place of its own computed backoff for the next attempt.
    async fn publish(
        &self,
        target: &PublishingTarget,
        payload: &str,
    ) -> (Result<(), StageError>, Option<RetryAfter>);

    async fn health(&self, target: &PublishingTarget) -> Result<(), StageError>;
}

/// Resolves opaque credential handles to usable secret values and enumerates the
/// configured publishing targets.
#[async_trait]
pub trait SecretStoreReader: Send + Sync {
    async fn list_targets(&self) -> Result<Vec<PublishingTarget>, StageError>;

    async fn resolve_credential(&self, handle: &str) -> Result<String, StageError>;
}

/// Records a terminal processing outcome for audit/replay. Best-effort: a failure
/// here must never fail the request it is recording.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, entry: HistoryEntry) -> Result<(), StageError>;
}

/// One row of the processing history: an alert's outcome through the pipeline.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub fingerprint: String,
    pub alert: Alert,
    pub classification: Option<ClassificationResult>,
    pub allowed: bool,
    pub publish_results: Vec<crate::model::PublishResult>,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}
