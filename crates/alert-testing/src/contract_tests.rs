//! Reusable contract-test suites: one async function per trait, parameterized over
//! any implementation, so every adapter crate (`alert-classifier`, `alert-targets`,
//! `alert-secrets`) can assert the same behavioral contract against its own type.

use alert_core::model::{Alert, AlertStatus, PublishingTarget};
use alert_core::ports::{ClassifierClient, SecretStoreReader, TargetPublisher};
use std::collections::BTreeMap;

fn sample_alert() -> Alert {
    Alert {
        status: AlertStatus::Firing,
        labels: BTreeMap::from([
            ("alertname".to_string(), "HighCPU".to_string()),
            ("namespace".to_string(), "prod".to_string()),
        ]),
        annotations: BTreeMap::new(),
        starts_at: chrono::Utc::now(),
        ends_at: None,
        source: "contract-test".into(),
    }
}

/// Asserts that a healthy classifier returns a confidence in `[0.0, 1.0]` and never
/// panics on a well-formed alert.
pub async fn assert_classifier_contract(client: &dyn ClassifierClient) {
    let result = client.classify(&sample_alert()).await;
    if let Ok(classification) = result {
        assert!(
            (0.0..=1.0).contains(&classification.confidence),
            "confidence must be within [0.0, 1.0], got {}",
            classification.confidence
        );
    }
}

/// Asserts that `format` is pure (same input produces the same payload) and that
/// `publish` does not panic against a minimal target.
pub async fn assert_publisher_contract(publisher: &dyn TargetPublisher, target: &PublishingTarget) {
    let alert = sample_alert();
    let classification = alert_testing_classification_fixture();

    let first = publisher.format(&alert, &classification);
    let second = publisher.format(&alert, &classification);
    match (first, second) {
        (Ok(a), Ok(b)) => assert_eq!(a, b, "format must be deterministic for identical inputs"),
        (Err(_), Err(_)) => {}
        _ => panic!("format must be deterministic: got different Ok/Err across identical calls"),
    }

    let _ = publisher.publish(target, "{}").await;
}

/// Asserts that `list_targets` never returns a target with an empty name, since the
/// orchestrator uses target name as a stable key for breaker reuse across refreshes.
pub async fn assert_secret_store_contract(store: &dyn SecretStoreReader) {
    let targets = store.list_targets().await.unwrap_or_default();
    for target in &targets {
        assert!(!target.name.is_empty(), "target name must not be empty");
    }
}

fn alert_testing_classification_fixture() -> alert_core::model::ClassificationResult {
    crate::fixtures::classification(
        alert_core::model::Category::Performance,
        alert_core::model::Severity::Warning,
        0.8,
        alert_core::model::ClassificationSource::Llm,
    )
}
