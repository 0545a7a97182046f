//! `reqwest`-backed implementation of `alert_core::ports::ClassifierClient`.

use std::time::Duration;

use alert_core::error::StageError;
use alert_core::model::{Alert, ClassificationResult, ClassificationSource};
use alert_core::ports::ClassifierClient;
use async_trait::async_trait;

use crate::wire::{ClassifierRequest, ClassifierResponse};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Talks to the external classifier service over HTTP. Owns its own `reqwest::Client`
/// and endpoint configuration; retry, timeout-budget enforcement, and circuit
/// breaking are the caller's (`ClassificationService`'s) responsibility, not this
/// adapter's.
pub struct HttpClassifierClient {
    http: reqwest::Client,
    base_url: String,
    health_path: String,
    model: Option<String>,
    request_timeout: Duration,
}

impl HttpClassifierClient {
    /// `base_url` is the classifier service root, e.g. `https://classifier.internal`.
    /// `request_timeout` bounds the HTTP call itself; the caller additionally wraps
    /// this in its own deadline/retry/breaker policy.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, StageError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|err| StageError::Permanent(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            health_path: "/health".to_string(),
            model: None,
            request_timeout,
        })
    }

    /// Pins the request to a specific model identifier instead of letting the
    /// service pick its default.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    fn classify_url(&self) -> String {
        format!("{}/classify", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ClassifierClient for HttpClassifierClient {
    async fn classify(&self, alert: &Alert) -> Result<ClassificationResult, StageError> {
        let body = ClassifierRequest {
            labels: alert.labels.clone(),
            annotations: alert.annotations.clone(),
            alertname: alert.alertname().to_string(),
            severity: alert.label("severity").to_string(),
            model: self.model.clone(),
            timeout_ms: self.request_timeout.as_millis() as u64,
        };

        let response = self
            .http
            .post(self.classify_url())
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            let parsed: ClassifierResponse = response
                .json()
                .await
                .map_err(|err| StageError::Permanent(format!("malformed classifier response: {err}")))?;
            Ok(ClassificationResult {
                category: parsed.category,
                severity: parsed.severity,
                confidence: parsed.confidence,
                source: ClassificationSource::Llm,
                model_identifier: Some(parsed.model),
                produced_at: chrono::Utc::now(),
            })
        } else if status.is_server_error() || status.as_u16() == 429 {
            Err(StageError::Transient(format!(
                "classifier returned {status}"
            )))
        } else {
            Err(StageError::Permanent(format!(
                "classifier returned {status}"
            )))
        }
    }

    async fn health(&self) -> Result<(), StageError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), self.health_path);
        let response = self.http.get(url).send().await.map_err(map_transport_error)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(StageError::Transient(format!(
                "classifier health check returned {}",
                response.status()
            )))
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> StageError {
    if err.is_timeout() {
        StageError::Timeout(Duration::from_secs(0))
    } else {
        StageError::Transient(format!("classifier request failed: {err}"))
    }
}
