//! Filter engine: a closed, ordered rule set deciding allow/deny for an
//! (alert, classification) pair. First deny wins.

use chrono::Utc;

use crate::config::FilterConfig;
use crate::model::{Alert, AlertStatus, Category, ClassificationResult, ClassificationSource, FilterDecision, FilterReason};

/// Per-reason decision counters, exposed for metrics export.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilterStats {
    pub allowed: u64,
    pub denied_noise: u64,
    pub denied_test_alert: u64,
    pub denied_low_confidence: u64,
    pub denied_disabled_namespace: u64,
    pub denied_empty_name: u64,
    pub denied_stale_resolved: u64,
    pub denied_silenced: u64,
}

impl FilterStats {
    fn record(&mut self, decision: FilterDecision) {
        match decision.reason {
            FilterReason::Allowed => self.allowed += 1,
            FilterReason::Noise => self.denied_noise += 1,
            FilterReason::TestAlert => self.denied_test_alert += 1,
            FilterReason::LowConfidence => self.denied_low_confidence += 1,
            FilterReason::DisabledNamespace => self.denied_disabled_namespace += 1,
            FilterReason::EmptyName => self.denied_empty_name += 1,
            FilterReason::StaleResolved => self.denied_stale_resolved += 1,
            FilterReason::Silenced => self.denied_silenced += 1,
        }
    }
}

/// Pure, side-effect-free decision engine. The rule set is closed: no dynamic
/// extension, only the configured parameters vary.
pub struct FilterEngine {
    config: FilterConfig,
    stats: parking_lot::Mutex<FilterStats>,
}

impl FilterEngine {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            stats: parking_lot::Mutex::new(FilterStats::default()),
        }
    }

    /// Evaluates the default rule set in order; the first matching deny wins.
    pub fn evaluate(&self, alert: &Alert, classification: &ClassificationResult) -> FilterDecision {
        let decision = self.evaluate_inner(alert, classification);
        self.stats.lock().record(decision);
        decision
    }

    fn evaluate_inner(&self, alert: &Alert, classification: &ClassificationResult) -> FilterDecision {
        if classification.category == Category::Noise {
            return FilterDecision::deny(FilterReason::Noise);
        }

        let alertname_lower = alert.alertname().to_ascii_lowercase();
        let severity_label = alert.label("severity").to_ascii_lowercase();
        let environment_label = alert.label("environment").to_ascii_lowercase();
        if alertname_lower.contains("test")
            || severity_label == "test"
            || self
                .config
                .test_environment_blocklist
                .iter()
                .any(|env| env.eq_ignore_ascii_case(&environment_label))
        {
            return FilterDecision::deny(FilterReason::TestAlert);
        }

        if classification.confidence < self.config.min_confidence
            && classification.source != ClassificationSource::Fallback
        {
            return FilterDecision::deny(FilterReason::LowConfidence);
        }

        if self
            .config
            .disabled_namespaces
            .iter()
            .any(|ns| ns == alert.namespace())
        {
            return FilterDecision::deny(FilterReason::DisabledNamespace);
        }

        if alert.alertname().is_empty() {
            return FilterDecision::deny(FilterReason::EmptyName);
        }

        if alert.status == AlertStatus::Resolved {
            if let Some(ends_at) = alert.ends_at {
                if Utc::now().signed_duration_since(ends_at).to_std().unwrap_or_default()
                    > self.config.stale_resolved_ttl
                {
                    return FilterDecision::deny(FilterReason::StaleResolved);
                }
            }
        }

        FilterDecision::allow()
    }

    pub fn stats(&self) -> FilterStats {
        *self.stats.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;
    use std::collections::BTreeMap;

    fn alert(status: AlertStatus, labels: &[(&str, &str)], ends_at: Option<chrono::DateTime<Utc>>) -> Alert {
        Alert {
            status,
            labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            annotations: BTreeMap::new(),
            starts_at: Utc::now(),
            ends_at,
            source: "test".into(),
        }
    }

    fn classification(category: Category, confidence: f64, source: ClassificationSource) -> ClassificationResult {
        ClassificationResult {
            category,
            severity: Severity::Warning,
            confidence,
            source,
            model_identifier: None,
            produced_at: Utc::now(),
        }
    }

    #[test]
    fn denies_noise_category_first() {
        let engine = FilterEngine::new(FilterConfig::default());
        let a = alert(AlertStatus::Firing, &[("alertname", "X")], None);
        let c = classification(Category::Noise, 0.9, ClassificationSource::Llm);
        assert_eq!(engine.evaluate(&a, &c).reason, FilterReason::Noise);
    }

    #[test]
    fn denies_test_alerts_by_name() {
        let engine = FilterEngine::new(FilterConfig::default());
        let a = alert(AlertStatus::Firing, &[("alertname", "TestAlert_E2E")], None);
        let c = classification(Category::Performance, 0.9, ClassificationSource::Llm);
        assert_eq!(engine.evaluate(&a, &c).reason, FilterReason::TestAlert);
    }

    #[test]
    fn low_confidence_denies_unless_fallback() {
        let engine = FilterEngine::new(FilterConfig::default());
        let a = alert(AlertStatus::Firing, &[("alertname", "X")], None);

        let llm = classification(Category::Performance, 0.1, ClassificationSource::Llm);
        assert_eq!(engine.evaluate(&a, &llm).reason, FilterReason::LowConfidence);

        let fallback = classification(Category::Performance, 0.1, ClassificationSource::Fallback);
        assert_eq!(engine.evaluate(&a, &fallback).reason, FilterReason::Allowed);
    }

    #[test]
    fn denies_disabled_namespace() {
        let mut config = FilterConfig::default();
        config.disabled_namespaces = vec!["quarantine".into()];
        let engine = FilterEngine::new(config);
        let a = alert(AlertStatus::Firing, &[("alertname", "X"), ("namespace", "quarantine")], None);
        let c = classification(Category::Performance, 0.9, ClassificationSource::Llm);
        assert_eq!(engine.evaluate(&a, &c).reason, FilterReason::DisabledNamespace);
    }

    #[test]
    fn denies_empty_alertname() {
        let engine = FilterEngine::new(FilterConfig::default());
        let a = alert(AlertStatus::Firing, &[], None);
        let c = classification(Category::Performance, 0.9, ClassificationSource::Llm);
        assert_eq!(engine.evaluate(&a, &c).reason, FilterReason::EmptyName);
    }

    #[test]
    fn denies_stale_resolved_alerts() {
        let mut config = FilterConfig::default();
        config.stale_resolved_ttl = std::time::Duration::from_secs(3600);
        let engine = FilterEngine::new(config);
        let ends_at = Utc::now() - chrono::Duration::hours(25);
        let a = alert(AlertStatus::Resolved, &[("alertname", "X")], Some(ends_at));
        let c = classification(Category::Performance, 0.9, ClassificationSource::Llm);
        assert_eq!(engine.evaluate(&a, &c).reason, FilterReason::StaleResolved);
    }

    #[test]
    fn allows_otherwise() {
        let engine = FilterEngine::new(FilterConfig::default());
        let a = alert(AlertStatus::Firing, &[("alertname", "HighCPU"), ("namespace", "prod")], None);
        let c = classification(Category::Performance, 0.9, ClassificationSource::Llm);
        let decision = engine.evaluate(&a, &c);
        assert!(decision.allow);
        assert_eq!(decision.reason, FilterReason::Allowed);
    }
}
