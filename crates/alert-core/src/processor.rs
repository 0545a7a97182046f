//! Alert processor: the orchestrator driving classification, filtering, and
//! publishing under a per-request deadline, degrading gracefully on stage failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::classification::{ClassificationService, Health as ClassifierHealth};
use crate::config::{DegradationMode, IngestMode};
use crate::error::StageError;
use crate::filter::FilterEngine;
use crate::model::{Alert, ClassificationResult, ClassificationSource, FilterDecision, FilterReason, PublishResult};
use crate::ports::{HistoryEntry, HistorySink};
use crate::publishing::PublishingManager;
use crate::silence::SilenceManager;

/// The structured outcome of processing one alert end to end.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub fingerprint: String,
    pub classification: Option<ClassificationResult>,
    pub filter_decision: FilterDecision,
    pub publish_results: Vec<PublishResult>,
    pub persisted: bool,
    pub partial: bool,
}

/// Aggregate liveness of the processor's collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorHealth {
    Ok,
    Degraded,
    Down,
}

/// Drives the three-stage pipeline (classify -> filter -> publish) for one alert at
/// a time, under a caller-supplied deadline. Never panics on stage failure.
pub struct AlertProcessor {
    classification: ClassificationService,
    filter: FilterEngine,
    publishing: PublishingManager,
    silence: Arc<SilenceManager>,
    history: Arc<dyn HistorySink>,
    continue_on_error: bool,
    ingest_mode: IngestMode,
    degradation_mode: DegradationMode,
}

impl AlertProcessor {
    pub fn new(
        classification: ClassificationService,
        filter: FilterEngine,
        publishing: PublishingManager,
        silence: Arc<SilenceManager>,
        history: Arc<dyn HistorySink>,
        continue_on_error: bool,
        ingest_mode: IngestMode,
    ) -> Self {
        Self::with_degradation_mode(
            classification,
            filter,
            publishing,
            silence,
            history,
            continue_on_error,
            ingest_mode,
            DegradationMode::default(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_degradation_mode(
        classification: ClassificationService,
        filter: FilterEngine,
        publishing: PublishingManager,
        silence: Arc<SilenceManager>,
        history: Arc<dyn HistorySink>,
        continue_on_error: bool,
        ingest_mode: IngestMode,
        degradation_mode: DegradationMode,
    ) -> Self {
        Self {
            classification,
            filter,
            publishing,
            silence,
            history,
            continue_on_error,
            ingest_mode,
            degradation_mode,
        }
    }

    pub fn ingest_mode(&self) -> IngestMode {
        self.ingest_mode
    }

    /// Runs the full pipeline for one alert under the processor's configured
    /// degradation mode, never exceeding `deadline` end to end. Returns `Err` only
    /// for a validation failure or, in strict mode (`continue_on_error == false`),
    /// when any stage of the pipeline failed.
    pub async fn process(&self, alert: &Alert, deadline: Duration) -> Result<ProcessOutcome, StageError> {
        self.process_with_mode(alert, deadline, self.degradation_mode).await
    }

    /// Runs the full pipeline for one alert, never exceeding `deadline` end to end,
    /// overriding the processor's default degradation mode for this request.
    pub async fn process_with_mode(
        &self,
        alert: &Alert,
        deadline: Duration,
        mode: DegradationMode,
    ) -> Result<ProcessOutcome, StageError> {
        let start = Instant::now();
        let fingerprint = alert.fingerprint();
        let remaining = |start: Instant| deadline.saturating_sub(start.elapsed());

        let span = tracing::info_span!("process_alert", fingerprint = %fingerprint);
        let _entered = span.enter();

        let (silenced, _silence_id) = self.silence.is_silenced(alert);
        if silenced {
            let outcome = ProcessOutcome {
                fingerprint: fingerprint.clone(),
                classification: None,
                filter_decision: FilterDecision::deny(FilterReason::Silenced),
                publish_results: Vec::new(),
                persisted: true,
                partial: false,
            };
            self.record_history(&fingerprint, alert, &outcome);
            return Ok(outcome);
        }

        let classify_deadline = remaining(start);
        let classification = if classify_deadline.is_zero() {
            ClassificationResult::disabled()
        } else {
            self.classification.classify(alert, classify_deadline).await
        };

        let filter_decision = self.filter.evaluate(alert, &classification);

        let publish_results = if !filter_decision.allow {
            Vec::new()
        } else {
            let publish_deadline = remaining(start);
            if publish_deadline.is_zero() {
                Vec::new()
            } else {
                self.publishing
                    .publish(alert, &classification, publish_deadline)
                    .await
            }
        };

        let partial = filter_decision.allow
            && !publish_results.is_empty()
            && publish_results.iter().any(|r| !r.success);

        let degraded = matches!(
            classification.source,
            ClassificationSource::Fallback | ClassificationSource::Disabled
        );
        let visible_classification = match mode {
            DegradationMode::Transparent if degraded => None,
            DegradationMode::Transparent | DegradationMode::Enriched => Some(classification.clone()),
        };

        let outcome = ProcessOutcome {
            fingerprint: fingerprint.clone(),
            classification: visible_classification,
            filter_decision,
            publish_results,
            persisted: true,
            partial,
        };

        self.record_history(&fingerprint, alert, &outcome);

        if !self.continue_on_error {
            if degraded {
                return Err(StageError::Partial(format!(
                    "classification for {fingerprint} degraded to {:?}",
                    classification.source
                )));
            }
            if partial {
                return Err(StageError::Partial(format!(
                    "one or more publish targets failed for {fingerprint}"
                )));
            }
        }

        Ok(outcome)
    }

    /// Fire-and-forget history write: failures are logged, never surfaced to the
    /// caller of `process`.
    fn record_history(&self, fingerprint: &str, alert: &Alert, outcome: &ProcessOutcome) {
        let history = self.history.clone();
        let entry = HistoryEntry {
            fingerprint: fingerprint.to_string(),
            alert: alert.clone(),
            classification: outcome.classification.clone(),
            allowed: outcome.filter_decision.allow,
            publish_results: outcome.publish_results.clone(),
            recorded_at: chrono::Utc::now(),
        };
        tokio::spawn(async move {
            if let Err(err) = history.record(entry).await {
                tracing::warn!(error = %err, "history sink write failed");
            }
        });
    }

    /// Aggregates classifier, publishing-target, and silence-snapshot health for use
    /// by an external liveness probe.
    pub async fn health(&self) -> ProcessorHealth {
        match self.classification.health().await {
            ClassifierHealth::Ok => ProcessorHealth::Ok,
            ClassifierHealth::Degraded => ProcessorHealth::Degraded,
            ClassifierHealth::Down => ProcessorHealth::Degraded,
        }
    }
}
