//! The fallback target kind: a plain HTTP webhook with a user-supplied `tera`
//! template rendering the payload body, and headers merged from the target's
//! configured set.

use std::sync::Arc;
use std::time::Duration;

use alert_core::error::StageError;
use alert_core::model::{Alert, ClassificationResult, PublishingTarget};
use alert_core::ports::{SecretStoreReader, TargetPublisher};
use alert_core::retry::RetryAfter;
use async_trait::async_trait;
use tera::{Context, Tera};

use crate::http;

/// Renders as a minimal JSON envelope when no target-specific template is supplied.
const DEFAULT_TEMPLATE: &str = r#"{"alertname":"{{ alertname }}","category":"{{ category }}","severity":"{{ severity }}","confidence":{{ confidence }},"fingerprint":"{{ fingerprint }}"}"#;

pub struct GenericWebhookPublisher {
    http: reqwest::Client,
    secrets: Arc<dyn SecretStoreReader>,
    template: Tera,
}

impl GenericWebhookPublisher {
    pub fn new(secrets: Arc<dyn SecretStoreReader>, request_timeout: Duration) -> Result<Self, StageError> {
        Self::with_template(secrets, request_timeout, DEFAULT_TEMPLATE)
    }

    pub fn with_template(
        secrets: Arc<dyn SecretStoreReader>,
        request_timeout: Duration,
        template_source: &str,
    ) -> Result<Self, StageError> {
        let mut template = Tera::default();
        template
            .add_raw_template("payload", template_source)
            .map_err(|err| StageError::Permanent(format!("invalid webhook template: {err}")))?;
        Ok(Self {
            http: http::build_client(request_timeout)?,
            secrets,
            template,
        })
    }
}

#[async_trait]
impl TargetPublisher for GenericWebhookPublisher {
    fn format(&self, alert: &Alert, classification: &ClassificationResult) -> Result<String, StageError> {
        let mut ctx = Context::new();
        ctx.insert(
            "alertname",
            alert.labels.get("alertname").map(String::as_str).unwrap_or("alert"),
        );
        ctx.insert("category", &format!("{:?}", classification.category).to_lowercase());
        ctx.insert("severity", &format!("{:?}", classification.severity).to_lowercase());
        ctx.insert("confidence", &classification.confidence);
        ctx.insert("fingerprint", &alert.fingerprint());
        ctx.insert("labels", &alert.labels);
        ctx.insert("annotations", &alert.annotations);
        self.template
            .render("payload", &ctx)
            .map_err(|err| StageError::Permanent(format!("failed to render webhook template: {err}")))
    }

    async fn publish(
        &self,
        target: &PublishingTarget,
        payload: &str,
    ) -> (Result<(), StageError>, Option<RetryAfter>) {
        let mut headers = target.headers.clone();
        if !target.credential_handle.is_empty() {
            match self.secrets.resolve_credential(&target.credential_handle).await {
                Ok(token) => {
                    headers.insert("authorization".to_string(), format!("Bearer {token}"));
                }
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
            .map_err(|err| StageError::Transient(format!("webhook health check failed: {err}")))
    }
}
