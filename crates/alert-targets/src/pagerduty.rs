//! PagerDuty Events API v2 publisher: `POST {endpoint}` (normally
//! `https://events.pagerduty.com/v2/enqueue`), deduplicated on the alert fingerprint.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use alert_core::error::StageError;
use alert_core::model::{Alert, ClassificationResult, PublishingTarget, Severity};
use alert_core::ports::{SecretStoreReader, TargetPublisher};
use alert_core::retry::RetryAfter;
use async_trait::async_trait;
use serde::Serialize;

use crate::http;

#[derive(Debug, Serialize)]
struct PagerDutyEvent<'a> {
    routing_key: &'a str,
    event_action: &'static str,
    dedup_key: &'a str,
    payload: PagerDutyPayload<'a>,
}

#[derive(Debug, Serialize)]
struct PagerDutyPayload<'a> {
    summary: String,
    source: &'a str,
    severity: &'static str,
    custom_details: &'a BTreeMap<String, String>,
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "critical",
        Severity::Warning => "warning",
        Severity::Noise => "info",
        Severity::Info => "info",
    }
}

pub struct PagerDutyPublisher {
    http: reqwest::Client,
    secrets: Arc<dyn SecretStoreReader>,
}

impl PagerDutyPublisher {
    pub fn new(secrets: Arc<dyn SecretStoreReader>, request_timeout: Duration) -> Result<Self, StageError> {
        Ok(Self {
            http: http::build_client(request_timeout)?,
            secrets,
        })
    }
}

#[async_trait]
impl TargetPublisher for PagerDutyPublisher {
    fn format(&self, alert: &Alert, classification: &ClassificationResult) -> Result<String, StageError> {
        let summary = alert
            .labels
            .get("alertname")
            .cloned()
            .unwrap_or_else(|| "alert".to_string());
        let dedup_key = alert.fingerprint();
        let event = PagerDutyEvent {
            // The routing key is a secret; it is injected at publish time, not cached
            // in the formatted payload.
            routing_key: "",
            event_action: "trigger",
            dedup_key: &dedup_key,
            payload: PagerDutyPayload {
                summary,
                source: &alert.source,
                severity: severity_label(classification.severity),
                custom_details: &alert.labels,
            },
        };
        serde_json::to_string(&event)
            .map_err(|err| StageError::Permanent(format!("failed to encode pagerduty payload: {err}")))
    }

    async fn publish(
        &self,
        target: &PublishingTarget,
        payload: &str,
    ) -> (Result<(), StageError>, Option<RetryAfter>) {
        let routing_key = match self.secrets.resolve_credential(&target.credential_handle).await {
            Ok(key) => key,
            Err(err) => return (Err(err), None),
        };
        let mut value = match serde_json::from_str::<serde_json::Value>(payload) {
            Ok(value) => value,
            Err(err) => return (Err(StageError::Permanent(format!("invalid cached payload: {err}"))), None),
        };
        value["routing_key"] = serde_json::Value::String(routing_key);
        let body = match serde_json::to_string(&value) {
            Ok(body) => body,
            Err(err) => return (Err(StageError::Permanent(format!("failed to rebuild payload: {err}"))), None),
        };
        http::post_json(&self.http, &target.endpoint, &target.headers, &body).await
    }

    async fn health(&self, target: &PublishingTarget) -> Result<(), StageError> {
        self.http
            .head(&target.endpoint)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| StageError::Transient(format!("pagerduty health check failed: {err}")))
    }
}
