//! End-to-end scenarios for the full pipeline: classification -> filter ->
//! publishing, wired together the way a real deployment would assemble them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alert_core::cache::InMemoryL2Cache;
use alert_core::circuit_breaker::CircuitBreakerConfig;
use alert_core::classification::{ClassificationService, FallbackClassifier};
use alert_core::config::{CacheConfig, ClassificationConfig, FilterConfig, IngestMode, PublishingConfig};
use alert_core::error::StageError;
use alert_core::filter::FilterEngine;
use alert_core::model::{Category, ClassificationSource, Severity, TargetKind};
use alert_core::ports::TargetPublisher;
use alert_core::processor::AlertProcessor;
use alert_core::publishing::PublishingManager;
use alert_core::silence::SilenceManager;
use alert_observability::AlertMetrics;
use alert_testing::fixtures::{classification, eq_matcher, regex_matcher, AlertBuilder};
use alert_testing::{MockClassifierClient, MockHistorySink, MockSecretStore, MockSilenceStore, MockTargetPublisher};

fn target(name: &str, kind: TargetKind) -> alert_core::model::PublishingTarget {
    alert_core::model::PublishingTarget {
        name: name.to_string(),
        kind,
        endpoint: "https://example.test".into(),
        credential_handle: "handle".into(),
        headers: Default::default(),
        enabled: true,
        discovery_labels: Default::default(),
    }
}

struct Harness {
    processor: AlertProcessor,
    history: Arc<MockHistorySink>,
    metrics: Arc<AlertMetrics>,
}

async fn build_harness(
    classifier: MockClassifierClient,
    targets: Vec<alert_core::model::PublishingTarget>,
    publishers: HashMap<TargetKind, Arc<dyn TargetPublisher>>,
    silences: Vec<alert_core::model::Silence>,
) -> Harness {
    build_harness_with_classification_config(ClassificationConfig::default(), classifier, targets, publishers, silences).await
}

async fn build_harness_with_classification_config(
    classification_config: ClassificationConfig,
    classifier: MockClassifierClient,
    targets: Vec<alert_core::model::PublishingTarget>,
    publishers: HashMap<TargetKind, Arc<dyn TargetPublisher>>,
    silences: Vec<alert_core::model::Silence>,
) -> Harness {
    let metrics = Arc::new(AlertMetrics::new().expect("metrics registry should register cleanly"));
    let classification = ClassificationService::new(
        classification_config,
        CacheConfig::default(),
        CircuitBreakerConfig::default(),
        Arc::new(InMemoryL2Cache::new()),
        Arc::new(classifier),
        FallbackClassifier::new(vec![]),
        4,
    )
    .with_metrics(metrics.clone());
    let filter = FilterEngine::new(FilterConfig::default());
    let publishing = PublishingManager::new(
        PublishingConfig::default(),
        CircuitBreakerConfig::default(),
        Arc::new(MockSecretStore::new(targets)),
        publishers,
    )
    .with_metrics(metrics.clone());
    publishing.refresh_targets().await.expect("refresh targets from mock store");
    let silence = Arc::new(SilenceManager::new(
        Default::default(),
        Arc::new(MockSilenceStore::new(silences)),
    ));
    silence.sync_snapshot().await.expect("sync silence snapshot from mock store");
    let history = Arc::new(MockHistorySink::new());

    Harness {
        processor: AlertProcessor::new(
            classification,
            filter,
            publishing,
            silence,
            history.clone(),
            true,
            IngestMode::Sync,
        ),
        history,
        metrics,
    }
}

#[tokio::test]
async fn scenario_happy_path_cached() {
    let harness = build_harness(
        MockClassifierClient::succeeding(classification(
            Category::Performance,
            Severity::Critical,
            0.9,
            ClassificationSource::Llm,
        )),
        vec![target("slack-main", TargetKind::Slack)],
        HashMap::from([(
            TargetKind::Slack,
            Arc::new(MockTargetPublisher::succeeding()) as Arc<dyn TargetPublisher>,
        )]),
        Vec::new(),
    )
    .await;

    let alert = AlertBuilder::new()
        .alertname("HighCPU")
        .severity("critical")
        .namespace("prod")
        .build();

    let outcome = harness.processor.process(&alert, Duration::from_secs(1)).await.unwrap();

    assert!(outcome.filter_decision.allow);
    assert_eq!(outcome.publish_results.len(), 1);
    assert!(outcome.publish_results[0].success);
    assert_eq!(outcome.publish_results[0].attempts, 1);

    // history is recorded fire-and-forget; give the spawned task a moment to land.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(harness.history.recorded_count(), 1);
}

#[tokio::test]
async fn scenario_classifier_down_uses_fallback() {
    let harness = build_harness(
        MockClassifierClient::failing(StageError::BreakerOpen),
        vec![target("slack-main", TargetKind::Slack)],
        HashMap::from([(
            TargetKind::Slack,
            Arc::new(MockTargetPublisher::succeeding()) as Arc<dyn TargetPublisher>,
        )]),
        Vec::new(),
    )
    .await;

    let alert = AlertBuilder::new()
        .alertname("HighCPU")
        .severity("critical")
        .namespace("prod")
        .build();

    let outcome = harness.processor.process(&alert, Duration::from_secs(1)).await.unwrap();

    let classification = outcome.classification.expect("classification present");
    assert_eq!(classification.source, ClassificationSource::Fallback);
    assert!(classification.confidence <= 0.5);
    assert!(outcome.filter_decision.allow);
    assert_eq!(outcome.publish_results.len(), 1);
    assert!(outcome.publish_results[0].success);
}

#[tokio::test]
async fn scenario_classifier_breaker_open_increments_blocked_metric() {
    // No retries: each process() call should drive exactly one admit decision
    // against the classifier breaker instead of burning attempts on backoff.
    let harness = build_harness_with_classification_config(
        ClassificationConfig {
            max_retries: 0,
            ..ClassificationConfig::default()
        },
        MockClassifierClient::failing(StageError::Permanent("classifier down".into())),
        vec![target("slack-main", TargetKind::Slack)],
        HashMap::from([(
            TargetKind::Slack,
            Arc::new(MockTargetPublisher::succeeding()) as Arc<dyn TargetPublisher>,
        )]),
        Vec::new(),
    )
    .await;

    let alert = AlertBuilder::new()
        .alertname("HighCPU")
        .severity("critical")
        .namespace("prod")
        .build();

    // CircuitBreakerConfig::default().max_failures is 5: five consecutive failed
    // classifier calls trips the breaker open.
    for _ in 0..5 {
        harness.processor.process(&alert, Duration::from_secs(1)).await.unwrap();
    }

    assert_eq!(
        harness
            .metrics
            .breaker_blocked_total
            .with_label_values(&["classifier"])
            .get(),
        0,
        "breaker should still be closed before the sixth call"
    );

    // The sixth call is rejected by the now-open breaker without reaching the client.
    harness.processor.process(&alert, Duration::from_secs(1)).await.unwrap();

    assert_eq!(
        harness
            .metrics
            .breaker_blocked_total
            .with_label_values(&["classifier"])
            .get(),
        1
    );
}

#[tokio::test]
async fn scenario_noise_denied_no_publishing() {
    let harness = build_harness(
        MockClassifierClient::succeeding(classification(
            Category::Test,
            Severity::Noise,
            0.95,
            ClassificationSource::Llm,
        )),
        vec![target("slack-main", TargetKind::Slack)],
        HashMap::from([(
            TargetKind::Slack,
            Arc::new(MockTargetPublisher::succeeding()) as Arc<dyn TargetPublisher>,
        )]),
        Vec::new(),
    )
    .await;

    let alert = AlertBuilder::new().alertname("TestAlert_E2E").severity("info").build();
    let outcome = harness.processor.process(&alert, Duration::from_secs(1)).await.unwrap();

    assert!(!outcome.filter_decision.allow);
    assert_eq!(outcome.filter_decision.reason, alert_core::model::FilterReason::TestAlert);
    assert!(outcome.publish_results.is_empty());
}

#[tokio::test]
async fn scenario_partial_fan_out_isolates_target_failures() {
    let mut publishers: HashMap<TargetKind, Arc<dyn TargetPublisher>> = HashMap::new();
    publishers.insert(TargetKind::Slack, Arc::new(MockTargetPublisher::succeeding()));
    publishers.insert(
        TargetKind::PagerDuty,
        Arc::new(MockTargetPublisher::failing(StageError::Transient("503".into()))),
    );

    let harness = build_harness(
        MockClassifierClient::succeeding(classification(
            Category::Availability,
            Severity::Critical,
            0.9,
            ClassificationSource::Llm,
        )),
        vec![
            target("slack-main", TargetKind::Slack),
            target("pagerduty-main", TargetKind::PagerDuty),
        ],
        publishers,
        Vec::new(),
    )
    .await;

    let alert = AlertBuilder::new().alertname("ServiceDown").namespace("prod").build();
    let outcome = harness.processor.process(&alert, Duration::from_secs(5)).await.unwrap();

    assert!(outcome.partial);
    let slack = outcome
        .publish_results
        .iter()
        .find(|r| r.target_name == "slack-main")
        .unwrap();
    assert!(slack.success);
    let pagerduty = outcome
        .publish_results
        .iter()
        .find(|r| r.target_name == "pagerduty-main")
        .unwrap();
    assert!(!pagerduty.success);
}

#[tokio::test]
async fn scenario_silenced_alert_skips_classifier_and_publishers() {
    let classifier = MockClassifierClient::succeeding(classification(
        Category::Availability,
        Severity::Critical,
        0.9,
        ClassificationSource::Llm,
    ));
    let silence = alert_testing::fixtures::active_silence(
        "s1",
        vec![regex_matcher("namespace", "^prod-staging$")],
    );

    let harness = build_harness(
        classifier,
        vec![target("slack-main", TargetKind::Slack)],
        HashMap::from([(
            TargetKind::Slack,
            Arc::new(MockTargetPublisher::succeeding()) as Arc<dyn TargetPublisher>,
        )]),
        vec![silence],
    )
    .await;

    let alert = AlertBuilder::new().alertname("X").namespace("prod-staging").build();
    let outcome = harness.processor.process(&alert, Duration::from_secs(1)).await.unwrap();

    assert_eq!(outcome.filter_decision.reason, alert_core::model::FilterReason::Silenced);
    assert!(outcome.classification.is_none());
    assert!(outcome.publish_results.is_empty());
}

#[tokio::test]
async fn scenario_exact_matcher_does_not_silence_other_namespaces() {
    let classifier = MockClassifierClient::succeeding(classification(
        Category::Performance,
        Severity::Warning,
        0.8,
        ClassificationSource::Llm,
    ));
    let silence = alert_testing::fixtures::active_silence("s1", vec![eq_matcher("namespace", "staging")]);

    let harness = build_harness(classifier, Vec::new(), HashMap::new(), vec![silence]).await;

    let alert = AlertBuilder::new().alertname("X").namespace("prod").build();
    let outcome = harness.processor.process(&alert, Duration::from_secs(1)).await.unwrap();

    assert_ne!(outcome.filter_decision.reason, alert_core::model::FilterReason::Silenced);
}
