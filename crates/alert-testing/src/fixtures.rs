//! Builders for constructing `Alert`/`ClassificationResult`/`Silence` values in
//! tests without repeating field boilerplate at every call site.

use std::collections::BTreeMap;

use alert_core::model::{
    Alert, AlertStatus, Category, ClassificationResult, ClassificationSource, Matcher, MatchOp,
    Severity, Silence,
};
use chrono::Utc;

/// Fluent builder for `Alert` test fixtures. `alertname("HighCPU").namespace("prod")`
/// reads like the label set it produces.
pub struct AlertBuilder {
    status: AlertStatus,
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
    ends_at: Option<chrono::DateTime<Utc>>,
}

impl AlertBuilder {
    pub fn new() -> Self {
        Self {
            status: AlertStatus::Firing,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            ends_at: None,
        }
    }

    pub fn label(mut self, name: &str, value: &str) -> Self {
        self.labels.insert(name.to_string(), value.to_string());
        self
    }

    pub fn alertname(self, name: &str) -> Self {
        self.label("alertname", name)
    }

    pub fn namespace(self, namespace: &str) -> Self {
        self.label("namespace", namespace)
    }

    pub fn severity(self, severity: &str) -> Self {
        self.label("severity", severity)
    }

    pub fn resolved_at(mut self, ends_at: chrono::DateTime<Utc>) -> Self {
        self.status = AlertStatus::Resolved;
        self.ends_at = Some(ends_at);
        self
    }

    pub fn build(self) -> Alert {
        Alert {
            status: self.status,
            labels: self.labels,
            annotations: self.annotations,
            starts_at: Utc::now(),
            ends_at: self.ends_at,
            source: "alert-testing".into(),
        }
    }
}

impl Default for AlertBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn classification(
    category: Category,
    severity: Severity,
    confidence: f64,
    source: ClassificationSource,
) -> ClassificationResult {
    ClassificationResult {
        category,
        severity,
        confidence,
        source,
        model_identifier: None,
        produced_at: Utc::now(),
    }
}

pub fn active_silence(id: &str, matchers: Vec<Matcher>) -> Silence {
    Silence {
        id: id.to_string(),
        matchers,
        starts_at: Utc::now() - chrono::Duration::hours(1),
        ends_at: Utc::now() + chrono::Duration::hours(1),
        creator: "alert-testing".into(),
        comment: String::new(),
    }
}

pub fn eq_matcher(label_name: &str, value: &str) -> Matcher {
    Matcher {
        label_name: label_name.to_string(),
        op: MatchOp::Eq,
        value: value.to_string(),
    }
}

pub fn regex_matcher(label_name: &str, pattern: &str) -> Matcher {
    Matcher {
        label_name: label_name.to_string(),
        op: MatchOp::Re,
        value: pattern.to_string(),
    }
}
