//! Runnable walkthrough of the alert proxy core: wires every stage service to
//! in-memory test-double collaborators (the real LLM, secret store, and target
//! endpoints are out of scope per spec §1) and drives a handful of alerts through
//! `AlertProcessor`, printing the response envelope from spec §6 for each.
//!
//! Run with `cargo run -p alert-proxy-demo`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use alert_core::circuit_breaker::CircuitBreakerConfig;
use alert_core::classification::{ClassificationService, FallbackClassifier};
use alert_core::config::{CacheConfig, ClassificationConfig, Config, FilterConfig, PublishingConfig};
use alert_core::filter::FilterEngine;
use alert_core::model::{
    Alert, AlertStatus, Category, ClassificationResult, ClassificationSource, MatchOp, Matcher,
    PublishingTarget, Severity, Silence, TargetKind,
};
use alert_core::ports::TargetPublisher;
use alert_core::processor::AlertProcessor;
use alert_core::publishing::PublishingManager;
use alert_core::silence::SilenceManager;
use alert_observability::{init_tracing, TracingConfig};
use alert_testing::mocks::{MockClassifierClient, MockHistorySink, MockSecretStore, MockTargetPublisher};
use chrono::Utc;

fn demo_target(name: &str, kind: TargetKind) -> PublishingTarget {
    PublishingTarget {
        name: name.to_string(),
        kind,
        endpoint: format!("https://example.test/{name}"),
        credential_handle: format!("demo/{name}"),
        headers: BTreeMap::new(),
        enabled: true,
        discovery_labels: BTreeMap::new(),
    }
}

fn alert(labels: &[(&str, &str)], status: AlertStatus) -> Alert {
    Alert {
        status,
        labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        annotations: BTreeMap::new(),
        starts_at: Utc::now() - chrono::Duration::minutes(5),
        ends_at: None,
        source: "demo-webhook".into(),
    }
}

fn llm_result(category: Category, severity: Severity, confidence: f64) -> ClassificationResult {
    ClassificationResult {
        category,
        severity,
        confidence,
        source: ClassificationSource::Llm,
        model_identifier: Some("demo-classifier-v1".into()),
        produced_at: Utc::now(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(TracingConfig::new().with_service_name("alert-proxy-demo"))
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;

    let config = Config::default();

    // Classification service: a scripted "LLM" that alternates a couple of
    // plausible responses, an in-memory L2 cache, and the rule-based fallback.
    let classifier = MockClassifierClient::succeeding(llm_result(Category::Performance, Severity::Critical, 0.92));
    let classification = ClassificationService::new(
        ClassificationConfig {
            max_retries: config.classification.max_retries,
            ..ClassificationConfig::default()
        },
        CacheConfig::default(),
        CircuitBreakerConfig::default(),
        Arc::new(alert_core::cache::InMemoryL2Cache::new()),
        Arc::new(classifier),
        FallbackClassifier::new(vec!["sandbox".into()]),
        4,
    );

    let filter = FilterEngine::new(FilterConfig::default());

    // Publishing manager: one healthy target per kind, discovered from a mock
    // secret store, published to with in-memory stand-in publishers.
    let targets = vec![
        demo_target("slack-oncall", TargetKind::Slack),
        demo_target("pagerduty-primary", TargetKind::PagerDuty),
        demo_target("rootly-default", TargetKind::Rootly),
    ];
    let secrets = Arc::new(MockSecretStore::new(targets));
    let mut publishers: HashMap<TargetKind, Arc<dyn TargetPublisher>> = HashMap::new();
    publishers.insert(TargetKind::Slack, Arc::new(MockTargetPublisher::succeeding()));
    publishers.insert(TargetKind::PagerDuty, Arc::new(MockTargetPublisher::succeeding()));
    publishers.insert(TargetKind::Rootly, Arc::new(MockTargetPublisher::succeeding()));
    let publishing = PublishingManager::new(PublishingConfig::default(), CircuitBreakerConfig::default(), secrets, publishers);
    publishing.refresh_targets().await?;

    // Silence manager: one active rule suppressing the `prod-staging` namespace.
    let silence_store = Arc::new(alert_testing::mocks::MockSilenceStore::new(vec![Silence {
        id: "demo-silence-1".into(),
        matchers: vec![Matcher {
            label_name: "namespace".into(),
            op: MatchOp::Re,
            value: "^prod-staging$".into(),
        }],
        starts_at: Utc::now() - chrono::Duration::hours(1),
        ends_at: Utc::now() + chrono::Duration::hours(1),
        creator: "demo".into(),
        comment: "suppress staging noise".into(),
    }]));
    let silence = Arc::new(SilenceManager::new(config.silence.clone(), silence_store));
    silence.sync_snapshot().await?;

    let processor = AlertProcessor::new(
        classification,
        filter,
        publishing,
        silence,
        Arc::new(MockHistorySink::new()),
        config.continue_on_error,
        config.ingest_mode,
    );

    let scenarios: Vec<(&str, Alert)> = vec![
        (
            "firing, allowed, fans out to all three targets",
            alert(&[("alertname", "HighCPU"), ("namespace", "prod"), ("severity", "critical")], AlertStatus::Firing),
        ),
        (
            "test alert, denied by the filter engine before publishing",
            alert(&[("alertname", "TestAlert_E2E"), ("severity", "info")], AlertStatus::Firing),
        ),
        (
            "silenced namespace, short-circuits before classification",
            alert(&[("namespace", "prod-staging"), ("alertname", "FlappyCheck")], AlertStatus::Firing),
        ),
    ];

    for (label, alert) in scenarios {
        let started = Instant::now();
        let outcome = processor
            .process(&alert, Duration::from_millis(50))
            .await
            .expect("demo runs with continue_on_error enabled");
        let duration_ms = started.elapsed().as_millis();

        let published: Vec<_> = outcome
            .publish_results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "target": r.target_name,
                    "success": r.success,
                    "attempts": r.attempts,
                    "error": r.terminal_error,
                })
            })
            .collect();

        let envelope = serde_json::json!({
            "received": 1,
            "classified": outcome.classification.is_some() as u8,
            "filtered_out": (!outcome.filter_decision.allow) as u8,
            "published": published,
            "duration_ms": duration_ms,
        });

        println!("--- {label} ---");
        println!("fingerprint: {}", outcome.fingerprint);
        println!("filter_decision: {:?}", outcome.filter_decision);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        println!();
    }

    Ok(())
}
