//! Rootly incident publisher: `POST {endpoint}/incidents`.

use std::time::Duration;

use alert_core::error::StageError;
use alert_core::model::{Alert, ClassificationResult, PublishingTarget, Severity};
use alert_core::ports::{SecretStoreReader, TargetPublisher};
use alert_core::retry::RetryAfter;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::http;

#[derive(Debug, Serialize)]
struct RootlyIncident<'a> {
    title: &'a str,
    severity: &'a str,
    description: String,
    labels: &'a std::collections::BTreeMap<String, String>,
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "critical",
        Severity::Warning => "high",
        Severity::Noise => "low",
        Severity::Info => "low",
    }
}

pub struct RootlyPublisher {
    http: reqwest::Client,
    secrets: Arc<dyn SecretStoreReader>,
}

impl RootlyPublisher {
    pub fn new(secrets: Arc<dyn SecretStoreReader>, request_timeout: Duration) -> Result<Self, StageError> {
        Ok(Self {
            http: http::build_client(request_timeout)?,
            secrets,
        })
    }
}

#[async_trait]
impl TargetPublisher for RootlyPublisher {
    fn format(&self, alert: &Alert, classification: &ClassificationResult) -> Result<String, StageError> {
        let title = alert
            .labels
            .get("alertname")
            .cloned()
            .unwrap_or_else(|| "alert".to_string());
        let description = alert
            .annotations
            .get("description")
            .cloned()
            .unwrap_or_else(|| format!("classified as {:?}/{:?}", classification.category, classification.severity));
        let incident = RootlyIncident {
            title: &title,
            severity: severity_label(classification.severity),
            description,
            labels: &alert.labels,
        };
        serde_json::to_string(&incident)
            .map_err(|err| StageError::Permanent(format!("failed to encode rootly payload: {err}")))
    }

    async fn publish(
        &self,
        target: &PublishingTarget,
        payload: &str,
    ) -> (Result<(), StageError>, Option<RetryAfter>) {
        let token = match self.secrets.resolve_credential(&target.credential_handle).await {
            Ok(token) => token,
            Err(err) => return (Err(err), None),
        };
        let mut headers = target.headers.clone();
        headers.insert("authorization".to_string(), format!("Bearer {token}"));
        let url = format!("{}/incidents", target.endpoint.trim_end_matches('/'));
        http::post_json(&self.http, &url, &headers, payload).await
    }

    async fn health(&self, target: &PublishingTarget) -> Result<(), StageError> {
        self.http
            .get(target.endpoint.trim_end_matches('/'))
            .send()
            .await
            .map_err(|err| StageError::Transient(format!("rootly health check failed: {err}")))
            .and_then(|response| {
                if response.status().is_success() {
                    Ok(())
                } else {
                    Err(StageError::Transient(format!("rootly unhealthy: {}", response.status())))
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_core::model::{Category, ClassificationSource};
    use alert_testing::fixtures::{classification, AlertBuilder};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticSecrets;

    #[async_trait]
    impl SecretStoreReader for StaticSecrets {
        async fn list_targets(&self) -> Result<Vec<PublishingTarget>, StageError> {
            Ok(vec![])
        }

        async fn resolve_credential(&self, _handle: &str) -> Result<String, StageError> {
            Ok("rootly-token".to_string())
        }
    }

    fn target(endpoint: String) -> PublishingTarget {
        PublishingTarget {
            name: "rootly-primary".to_string(),
            kind: alert_core::model::TargetKind::Rootly,
            endpoint,
            credential_handle: "rootly/primary".to_string(),
            headers: Default::default(),
            enabled: true,
            discovery_labels: Default::default(),
        }
    }

    #[tokio::test]
    async fn posts_incident_and_succeeds_on_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/incidents"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let publisher = RootlyPublisher::new(Arc::new(StaticSecrets), Duration::from_secs(1)).unwrap();
        let alert = AlertBuilder::new().label("alertname", "disk-full").build();
        let payload = publisher
            .format(&alert, &classification(Category::Availability, Severity::Critical, 0.9, ClassificationSource::Llm))
            .unwrap();
        let (result, retry_after) = publisher.publish(&target(server.uri()), &payload).await;

        assert!(result.is_ok());
        assert!(retry_after.is_none());
    }

    #[test]
    fn format_produces_stable_incident_shape() {
        let publisher = RootlyPublisher::new(Arc::new(StaticSecrets), Duration::from_secs(1)).unwrap();
        let alert = Alert {
            status: alert_core::model::AlertStatus::Firing,
            labels: std::collections::BTreeMap::from([("alertname".to_string(), "disk-full".to_string())]),
            annotations: std::collections::BTreeMap::from([(
                "description".to_string(),
                "disk usage above 90%".to_string(),
            )]),
            starts_at: chrono::Utc::now(),
            ends_at: None,
            source: "test".into(),
        };
        let payload = publisher
            .format(&alert, &classification(Category::Availability, Severity::Critical, 0.9, ClassificationSource::Llm))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        insta::assert_snapshot!(serde_json::to_string_pretty(&value).unwrap(), @r#"
        {
          "description": "disk usage above 90%",
          "labels": {
            "alertname": "disk-full"
          },
          "severity": "critical",
          "title": "disk-full"
        }
        "#);
    }

    #[tokio::test]
    async fn rate_limit_surfaces_retry_after_hint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/incidents"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let publisher = RootlyPublisher::new(Arc::new(StaticSecrets), Duration::from_secs(1)).unwrap();
        let alert = AlertBuilder::new().label("alertname", "disk-full").build();
        let payload = publisher
            .format(&alert, &classification(Category::Availability, Severity::Critical, 0.9, ClassificationSource::Llm))
            .unwrap();
        let (result, retry_after) = publisher.publish(&target(server.uri()), &payload).await;

        assert!(result.is_err());
        assert_eq!(retry_after, Some(RetryAfter(Duration::from_secs(7))));
    }

    #[tokio::test]
    async fn satisfies_publisher_contract() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/incidents"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let publisher = RootlyPublisher::new(Arc::new(StaticSecrets), Duration::from_secs(1)).unwrap();
        alert_testing::contract_tests::assert_publisher_contract(&publisher, &target(server.uri())).await;
    }
}
