//! Silence manager: matches alerts against active suppression rules and runs the
//! background GC/snapshot-rebuild workers that keep the in-memory view bounded and
//! fresh.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use regex::Regex;

use crate::config::SilenceConfig;
use crate::error::StageError;
use crate::model::{Alert, MatchOp, Matcher, Silence, SilenceStatus};

/// External store of record for silences. The manager's in-memory snapshot is a
/// read-through cache over this; CRUD is delegated entirely to the store.
#[async_trait]
pub trait SilenceStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Silence>, StageError>;
    async fn delete(&self, id: &str) -> Result<(), StageError>;
}

fn matcher_is_satisfied(matcher: &Matcher, alert: &Alert) -> bool {
    let value = alert.label(&matcher.label_name);
    match matcher.op {
        MatchOp::Eq => value == matcher.value,
        MatchOp::Ne => value != matcher.value,
        MatchOp::Re => Regex::new(&anchored(&matcher.value))
            .map(|re| re.is_match(value))
            .unwrap_or(false),
        MatchOp::NotRe => Regex::new(&anchored(&matcher.value))
            .map(|re| !re.is_match(value))
            .unwrap_or(true),
    }
}

fn anchored(pattern: &str) -> String {
    if pattern.starts_with('^') && pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!("^(?:{pattern})$")
    }
}

fn silence_matches(silence: &Silence, alert: &Alert, now: chrono::DateTime<Utc>) -> bool {
    // Status applies regardless of the alert's own firing/resolved state.
    silence.status_at(now) == SilenceStatus::Active
        && silence
            .matchers
            .iter()
            .all(|matcher| matcher_is_satisfied(matcher, alert))
}

/// Decides whether an alert is currently silenced, over an in-memory snapshot kept
/// fresh by a background sync worker.
pub struct SilenceManager {
    config: SilenceConfig,
    store: Arc<dyn SilenceStore>,
    snapshot: Arc<RwLock<Vec<Silence>>>,
}

impl SilenceManager {
    pub fn new(config: SilenceConfig, store: Arc<dyn SilenceStore>) -> Self {
        Self {
            config,
            store,
            snapshot: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// O(|active-silences|) matcher evaluations over the current snapshot.
    pub fn is_silenced(&self, alert: &Alert) -> (bool, Option<String>) {
        let now = Utc::now();
        let snapshot = self.snapshot.read();
        for silence in snapshot.iter() {
            if silence_matches(silence, alert, now) {
                return (true, Some(silence.id.clone()));
            }
        }
        (false, None)
    }

    /// Rebuilds the in-memory snapshot from the store. Called by the sync worker and
    /// may also be invoked directly (e.g. right after startup).
    pub async fn sync_snapshot(&self) -> Result<(), StageError> {
        let silences = self.store.list().await?;
        *self.snapshot.write() = silences;
        Ok(())
    }

    /// One GC pass: deletes silences that expired longer than `retention` ago.
    /// Transitioning active -> expired itself requires no store mutation, since
    /// status is always derived from the clock; this only prunes terminally old rows.
    pub async fn gc_once(&self) -> Result<usize, StageError> {
        let now = Utc::now();
        let silences = self.store.list().await?;
        let mut deleted = 0;
        for silence in silences {
            if silence.status_at(now) == SilenceStatus::Expired {
                let expired_for = (now - silence.ends_at).to_std().unwrap_or_default();
                if expired_for > self.config.retention {
                    self.store.delete(&silence.id).await?;
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    /// Spawns the GC and snapshot-sync background workers; returns their handles so
    /// the caller can await them on shutdown.
    pub fn spawn_background_workers(self: &Arc<Self>) -> (tokio::task::JoinHandle<()>, tokio::task::JoinHandle<()>) {
        let gc_manager = self.clone();
        let gc_interval = self.config.gc_interval;
        let gc_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(gc_interval);
            loop {
                ticker.tick().await;
                if let Err(err) = gc_manager.gc_once().await {
                    tracing::warn!(error = %err, "silence gc pass failed");
                }
            }
        });

        let sync_manager = self.clone();
        let sync_interval = self.config.sync_interval;
        let sync_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sync_interval);
            loop {
                ticker.tick().await;
                if let Err(err) = sync_manager.sync_snapshot().await {
                    tracing::warn!(error = %err, "silence snapshot sync failed");
                }
            }
        });

        (gc_handle, sync_handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex as StdMutex;

    struct FakeStore {
        silences: StdMutex<Vec<Silence>>,
    }

    #[async_trait]
    impl SilenceStore for FakeStore {
        async fn list(&self) -> Result<Vec<Silence>, StageError> {
            Ok(self.silences.lock().unwrap().clone())
        }
        async fn delete(&self, id: &str) -> Result<(), StageError> {
            self.silences.lock().unwrap().retain(|s| s.id != id);
            Ok(())
        }
    }

    fn alert(labels: &[(&str, &str)]) -> Alert {
        Alert {
            status: crate::model::AlertStatus::Firing,
            labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            annotations: BTreeMap::new(),
            starts_at: Utc::now(),
            ends_at: None,
            source: "test".into(),
        }
    }

    fn active_silence(id: &str, matchers: Vec<Matcher>) -> Silence {
        Silence {
            id: id.into(),
            matchers,
            starts_at: Utc::now() - chrono::Duration::hours(1),
            ends_at: Utc::now() + chrono::Duration::hours(1),
            creator: "alice".into(),
            comment: String::new(),
        }
    }

    #[tokio::test]
    async fn regex_matcher_silences_matching_namespace() {
        let store = Arc::new(FakeStore {
            silences: StdMutex::new(vec![active_silence(
                "s1",
                vec![Matcher {
                    label_name: "namespace".into(),
                    op: MatchOp::Re,
                    value: "^prod-staging$".into(),
                }],
            )]),
        });
        let manager = SilenceManager::new(SilenceConfig::default(), store);
        manager.sync_snapshot().await.unwrap();

        let (silenced, id) = manager.is_silenced(&alert(&[("namespace", "prod-staging"), ("alertname", "X")]));
        assert!(silenced);
        assert_eq!(id, Some("s1".into()));

        let (not_silenced, _) = manager.is_silenced(&alert(&[("namespace", "prod"), ("alertname", "X")]));
        assert!(!not_silenced);
    }

    #[tokio::test]
    async fn silence_applies_regardless_of_alert_status() {
        let store = Arc::new(FakeStore {
            silences: StdMutex::new(vec![active_silence(
                "s1",
                vec![Matcher {
                    label_name: "alertname".into(),
                    op: MatchOp::Eq,
                    value: "X".into(),
                }],
            )]),
        });
        let manager = SilenceManager::new(SilenceConfig::default(), store);
        manager.sync_snapshot().await.unwrap();

        let mut resolved = alert(&[("alertname", "X")]);
        resolved.status = crate::model::AlertStatus::Resolved;
        let (silenced, _) = manager.is_silenced(&resolved);
        assert!(silenced);
    }

    #[tokio::test]
    async fn expired_silences_are_not_active() {
        let mut expired = active_silence("s1", vec![]);
        expired.ends_at = Utc::now() - chrono::Duration::hours(1);
        let store = Arc::new(FakeStore {
            silences: StdMutex::new(vec![expired]),
        });
        let manager = SilenceManager::new(SilenceConfig::default(), store);
        manager.sync_snapshot().await.unwrap();
        let (silenced, _) = manager.is_silenced(&alert(&[("alertname", "X")]));
        assert!(!silenced);
    }

    #[tokio::test]
    async fn gc_deletes_only_silences_past_retention() {
        let mut config = SilenceConfig::default();
        config.retention = std::time::Duration::from_secs(3600);

        let mut old_expired = active_silence("old", vec![]);
        old_expired.ends_at = Utc::now() - chrono::Duration::hours(2);

        let mut recently_expired = active_silence("recent", vec![]);
        recently_expired.ends_at = Utc::now() - chrono::Duration::minutes(5);

        let store = Arc::new(FakeStore {
            silences: StdMutex::new(vec![old_expired, recently_expired]),
        });
        let manager = SilenceManager::new(config, store.clone());
        let deleted = manager.gc_once().await.unwrap();
        assert_eq!(deleted, 1);
        let remaining = store.silences.lock().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "recent");
    }
}
