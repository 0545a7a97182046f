//! L2 cache contract: an external, TTL-bearing key-value store, plus an in-memory
//! implementation used in tests and single-node deployments.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StageError;
use crate::model::ClassificationResult;

/// The external cache collaborator. A real deployment backs this with Redis or an
/// equivalent; tests and the demo binary use [`InMemoryL2Cache`].
#[async_trait]
pub trait L2Cache: Send + Sync {
    async fn get(&self, fingerprint: &str) -> Result<Option<ClassificationResult>, StageError>;
    async fn put(
        &self,
        fingerprint: &str,
        result: ClassificationResult,
        ttl: Duration,
    ) -> Result<(), StageError>;
}

struct Entry {
    value: ClassificationResult,
    expires_at: Instant,
}

/// A `DashMap`-backed L2 cache with per-entry TTL, expiring lazily on read.
pub struct InMemoryL2Cache {
    entries: DashMap<String, Entry>,
}

impl InMemoryL2Cache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl Default for InMemoryL2Cache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl L2Cache for InMemoryL2Cache {
    async fn get(&self, fingerprint: &str) -> Result<Option<ClassificationResult>, StageError> {
        if let Some(entry) = self.entries.get(fingerprint) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.entries.remove(fingerprint);
        Ok(None)
    }

    async fn put(
        &self,
        fingerprint: &str,
        result: ClassificationResult,
        ttl: Duration,
    ) -> Result<(), StageError> {
        self.entries.insert(
            fingerprint.to_string(),
            Entry {
                value: result,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, ClassificationSource, Severity};
    use chrono::Utc;

    fn sample() -> ClassificationResult {
        ClassificationResult {
            category: Category::Availability,
            severity: Severity::Critical,
            confidence: 0.95,
            source: ClassificationSource::Llm,
            model_identifier: None,
            produced_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let cache = InMemoryL2Cache::new();
        cache
            .put("fp1", sample(), Duration::from_millis(10))
            .await
            .unwrap();
        assert!(cache.get("fp1").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("fp1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_key_is_a_miss() {
        let cache = InMemoryL2Cache::new();
        assert!(cache.get("absent").await.unwrap().is_none());
    }
}
