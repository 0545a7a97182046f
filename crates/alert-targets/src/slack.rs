//! Slack incoming-webhook publisher: `POST {endpoint}` with a `blocks`-formatted
//! message, falling back to `text` for simple delivery.

use std::sync::Arc;
use std::time::Duration;

use alert_core::error::StageError;
use alert_core::model::{Alert, Category, ClassificationResult, PublishingTarget, Severity};
use alert_core::ports::{SecretStoreReader, TargetPublisher};
use alert_core::retry::RetryAfter;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use crate::http;

fn emoji(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => ":rotating_light:",
        Severity::Warning => ":warning:",
        Severity::Noise | Severity::Info => ":information_source:",
    }
}

fn category_label(category: Category) -> &'static str {
    match category {
        Category::Performance => "performance",
        Category::Availability => "availability",
        Category::Security => "security",
        Category::Noise => "noise",
        Category::Test => "test",
    }
}

#[derive(Debug, Serialize)]
struct SlackMessage {
    text: String,
    blocks: Vec<serde_json::Value>,
}

pub struct SlackPublisher {
    http: reqwest::Client,
    /// Unused today; kept for targets that gate their webhook behind a bearer token
    /// rather than embedding the secret in the URL itself.
    secrets: Arc<dyn SecretStoreReader>,
}

impl SlackPublisher {
    pub fn new(secrets: Arc<dyn SecretStoreReader>, request_timeout: Duration) -> Result<Self, StageError> {
        Ok(Self {
            http: http::build_client(request_timeout)?,
            secrets,
        })
    }
}

#[async_trait]
impl TargetPublisher for SlackPublisher {
    fn format(&self, alert: &Alert, classification: &ClassificationResult) -> Result<String, StageError> {
        let alertname = alert
            .labels
            .get("alertname")
            .cloned()
            .unwrap_or_else(|| "alert".to_string());
        let text = format!(
            "{} *{}* ({}, {:.0}% confidence)",
            emoji(classification.severity),
            alertname,
            category_label(classification.category),
            classification.confidence * 100.0
        );
        let fields: Vec<serde_json::Value> = alert
            .labels
            .iter()
            .map(|(k, v)| json!({ "type": "mrkdwn", "text": format!("*{k}*\n{v}") }))
            .collect();
        let message = SlackMessage {
            text: text.clone(),
            blocks: vec![
                json!({ "type": "section", "text": { "type": "mrkdwn", "text": text } }),
                json!({ "type": "section", "fields": fields }),
            ],
        };
        serde_json::to_string(&message)
            .map_err(|err| StageError::Permanent(format!("failed to encode slack payload: {err}")))
    }

    async fn publish(
        &self,
        target: &PublishingTarget,
        payload: &str,
    ) -> (Result<(), StageError>, Option<RetryAfter>) {
        let mut headers = target.headers.clone();
        if !target.credential_handle.is_empty() {
            match self.secrets.resolve_credential(&target.credential_handle).await {
                Ok(token) if !token.is_empty() => {
                    headers.insert("authorization".to_string(), format!("Bearer {token}"));
                }
                Ok(_) => {}
                Err(err) => return (Err(err), None),
            }
        }
        http::post_json(&self.http, &target.endpoint, &headers, payload).await
    }

    async fn health(&self, target: &PublishingTarget) -> Result<(), StageError> {
        self.http
            .head(&target.endpoint)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| StageError::Transient(format!("slack health check failed: {err}")))
    }
}
