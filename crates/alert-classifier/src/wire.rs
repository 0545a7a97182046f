//! Wire types for the classifier's request/response contract (spec §6).

use std::collections::BTreeMap;

use alert_core::model::{Category, Severity};
use serde::{Deserialize, Serialize};

/// Request body sent to the external classifier service.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierRequest {
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub alertname: String,
    pub severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub timeout_ms: u64,
}

/// Response body returned by the external classifier service on success.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierResponse {
    pub category: Category,
    pub severity: Severity,
    pub confidence: f64,
    pub model: String,
    #[serde(default)]
    pub recommendations: Option<Vec<String>>,
}
