//! Mock implementations of every capability-set trait in `alert_core::ports`
//! (plus the silence store), configurable with canned responses and call counters.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use alert_core::error::StageError;
use alert_core::model::{Alert, ClassificationResult, PublishingTarget, Silence};
use alert_core::ports::{ClassifierClient, HistoryEntry, HistorySink, SecretStoreReader};
use alert_core::silence::SilenceStore;
use async_trait::async_trait;
use parking_lot::Mutex;

/// A scripted classifier: returns `responses[call_index % responses.len()]`, or the
/// configured failure if `responses` is empty.
pub struct MockClassifierClient {
    responses: Mutex<Vec<Result<ClassificationResult, StageError>>>,
    pub calls: AtomicU32,
    healthy: std::sync::atomic::AtomicBool,
}

impl MockClassifierClient {
    pub fn succeeding(result: ClassificationResult) -> Self {
        Self {
            responses: Mutex::new(vec![Ok(result)]),
            calls: AtomicU32::new(0),
            healthy: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn failing(error: StageError) -> Self {
        Self {
            responses: Mutex::new(vec![Err(error)]),
            calls: AtomicU32::new(0),
            healthy: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn scripted(responses: Vec<Result<ClassificationResult, StageError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: AtomicU32::new(0),
            healthy: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClassifierClient for MockClassifierClient {
    async fn classify(&self, _alert: &Alert) -> Result<ClassificationResult, StageError> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        let responses = self.responses.lock();
        if responses.is_empty() {
            return Err(StageError::Permanent("no scripted response".into()));
        }
        responses[idx % responses.len()].clone()
    }

    async fn health(&self) -> Result<(), StageError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StageError::Transient("mock classifier unhealthy".into()))
        }
    }
}

/// A scripted target publisher: formats to a fixed string, publishes according to a
/// scripted sequence of outcomes.
pub struct MockTargetPublisher {
    publish_responses: Mutex<Vec<Result<(), StageError>>>,
    pub publish_calls: AtomicU32,
    pub format_calls: AtomicU32,
}

impl MockTargetPublisher {
    pub fn succeeding() -> Self {
        Self {
            publish_responses: Mutex::new(vec![Ok(())]),
            publish_calls: AtomicU32::new(0),
            format_calls: AtomicU32::new(0),
        }
    }

    pub fn failing(error: StageError) -> Self {
        Self {
            publish_responses: Mutex::new(vec![Err(error)]),
            publish_calls: AtomicU32::new(0),
            format_calls: AtomicU32::new(0),
        }
    }

    pub fn scripted(responses: Vec<Result<(), StageError>>) -> Self {
        Self {
            publish_responses: Mutex::new(responses),
            publish_calls: AtomicU32::new(0),
            format_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl alert_core::ports::TargetPublisher for MockTargetPublisher {
    fn format(&self, _alert: &Alert, _classification: &ClassificationResult) -> Result<String, StageError> {
        self.format_calls.fetch_add(1, Ordering::SeqCst);
        Ok("{}".to_string())
    }

    async fn publish(
        &self,
        _target: &PublishingTarget,
        _payload: &str,
    ) -> (Result<(), StageError>, Option<alert_core::retry::RetryAfter>) {
        let idx = self.publish_calls.fetch_add(1, Ordering::SeqCst) as usize;
        let responses = self.publish_responses.lock();
        if responses.is_empty() {
            return (Err(StageError::Permanent("no scripted response".into())), None);
        }
        (responses[idx % responses.len()].clone(), None)
    }

    async fn health(&self, _target: &PublishingTarget) -> Result<(), StageError> {
        Ok(())
    }
}

/// An in-memory secret store returning a fixed target list.
pub struct MockSecretStore {
    targets: Vec<PublishingTarget>,
}

impl MockSecretStore {
    pub fn new(targets: Vec<PublishingTarget>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl SecretStoreReader for MockSecretStore {
    async fn list_targets(&self) -> Result<Vec<PublishingTarget>, StageError> {
        Ok(self.targets.clone())
    }

    async fn resolve_credential(&self, handle: &str) -> Result<String, StageError> {
        Ok(format!("secret-for-{handle}"))
    }
}

/// Records every entry passed to `record` for later assertion.
pub struct MockHistorySink {
    pub entries: Mutex<Vec<HistoryEntry>>,
}

impl MockHistorySink {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded_count(&self) -> usize {
        self.entries.lock().len()
    }
}

impl Default for MockHistorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistorySink for MockHistorySink {
    async fn record(&self, entry: HistoryEntry) -> Result<(), StageError> {
        self.entries.lock().push(entry);
        Ok(())
    }
}

/// An in-memory silence store, mutable for CRUD-style test setup.
pub struct MockSilenceStore {
    silences: Mutex<Vec<Silence>>,
}

impl MockSilenceStore {
    pub fn new(silences: Vec<Silence>) -> Self {
        Self {
            silences: Mutex::new(silences),
        }
    }

    pub fn push(&self, silence: Silence) {
        self.silences.lock().push(silence);
    }
}

#[async_trait]
impl SilenceStore for MockSilenceStore {
    async fn list(&self) -> Result<Vec<Silence>, StageError> {
        Ok(self.silences.lock().clone())
    }

    async fn delete(&self, id: &str) -> Result<(), StageError> {
        self.silences.lock().retain(|s| s.id != id);
        Ok(())
    }
}

/// Convenience alias for wiring a mock behind the `Arc<dyn Trait>` every stage
/// service expects.
pub fn arc<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
