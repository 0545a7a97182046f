//! Core data model: Alert, ClassificationResult, FilterDecision, PublishingTarget,
//! PublishResult and Silence.
//!
//! All types here are immutable value objects; nothing in this module performs I/O.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Firing/resolved lifecycle state of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Firing,
    Resolved,
}

/// The ingress record. Created on ingress, immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub status: AlertStatus,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub source: String,
}

impl Alert {
    /// A stable identifier derived from a canonical hash of labels.
    ///
    /// Labels are sorted by key (guaranteed by `BTreeMap` iteration order) before
    /// hashing, so the same label set always produces the same fingerprint,
    /// independent of insertion order, process, or instance.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (k, v) in &self.labels {
            hasher.update(k.as_bytes());
            hasher.update(b"\0");
            hasher.update(v.as_bytes());
            hasher.update(b"\x1e");
        }
        hex::encode(hasher.finalize())
    }

    pub fn label(&self, name: &str) -> &str {
        self.labels.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn alertname(&self) -> &str {
        self.label("alertname")
    }

    pub fn namespace(&self) -> &str {
        self.label("namespace")
    }
}

/// Domain tag produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Performance,
    Availability,
    Security,
    Noise,
    Test,
}

/// Normalized severity, independent of the alert's own `severity` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Noise,
    Warning,
    Critical,
}

/// Where a `ClassificationResult` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Llm,
    L1Cache,
    L2Cache,
    Fallback,
    Disabled,
}

/// The output of the classification stage. Cached by alert fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: Category,
    pub severity: Severity,
    pub confidence: f64,
    pub source: ClassificationSource,
    pub model_identifier: Option<String>,
    pub produced_at: DateTime<Utc>,
}

impl ClassificationResult {
    /// The result substituted when classification is disabled or fails and
    /// `continue_on_error` is set.
    pub fn disabled() -> Self {
        Self {
            category: Category::Noise,
            severity: Severity::Info,
            confidence: 0.0,
            source: ClassificationSource::Disabled,
            model_identifier: None,
            produced_at: Utc::now(),
        }
    }
}

/// Why the filter engine allowed or denied an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterReason {
    Noise,
    TestAlert,
    LowConfidence,
    DisabledNamespace,
    EmptyName,
    StaleResolved,
    Silenced,
    Allowed,
}

/// The outcome of the filter stage. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDecision {
    pub allow: bool,
    pub reason: FilterReason,
}

impl FilterDecision {
    pub fn allow() -> Self {
        Self {
            allow: true,
            reason: FilterReason::Allowed,
        }
    }

    pub fn deny(reason: FilterReason) -> Self {
        Self {
            allow: false,
            reason,
        }
    }
}

/// Kind of external delivery endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Rootly,
    PagerDuty,
    Slack,
    GenericWebhook,
}

/// A configured external delivery endpoint, loaded from the secret store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishingTarget {
    pub name: String,
    pub kind: TargetKind,
    pub endpoint: String,
    /// Opaque reference into the secret store; never the credential value itself.
    pub credential_handle: String,
    pub headers: BTreeMap<String, String>,
    pub enabled: bool,
    pub discovery_labels: BTreeMap<String, String>,
}

/// Per-target outcome of a publish attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResult {
    pub target_name: String,
    pub success: bool,
    pub attempts: u32,
    pub duration: Duration,
    pub terminal_error: Option<String>,
}

/// A matcher operator for silences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOp {
    Eq,
    Ne,
    Re,
    NotRe,
}

/// A single label predicate within a silence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matcher {
    pub label_name: String,
    pub op: MatchOp,
    pub value: String,
}

/// Computed lifecycle state of a `Silence`, a function of the current clock and window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SilenceStatus {
    Pending,
    Active,
    Expired,
}

/// A user-defined suppression rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Silence {
    pub id: String,
    pub matchers: Vec<Matcher>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub creator: String,
    pub comment: String,
}

impl Silence {
    /// Status is always recomputed from the clock; it is never stored as ground truth.
    pub fn status_at(&self, now: DateTime<Utc>) -> SilenceStatus {
        if now < self.starts_at {
            SilenceStatus::Pending
        } else if now > self.ends_at {
            SilenceStatus::Expired
        } else {
            SilenceStatus::Active
        }
    }
}
