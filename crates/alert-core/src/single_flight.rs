//! Single-flight call deduplication, keyed by alert fingerprint.
//!
//! Concurrent classification requests for the same fingerprint share one in-flight
//! LLM call; every waiter receives a clone of the same result instead of issuing its
//! own request.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::error::StageError;

enum Slot<T> {
    InFlight(broadcast::Sender<Result<T, StageError>>),
}

/// Deduplicates concurrent callers with the same key so only one of them actually
/// executes the underlying work.
pub struct SingleFlight<T: Clone + Send + Sync + 'static> {
    inflight: DashMap<String, Slot<T>>,
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }

    /// Runs `f` for `key` unless a call for the same key is already in flight, in
    /// which case this waits for that call's result instead.
    pub async fn run<F, Fut>(&self, key: &str, f: F) -> Result<T, StageError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, StageError>>,
    {
        loop {
            if let Some(mut rx) = self.subscribe_if_inflight(key) {
                match rx.recv().await {
                    Ok(result) => return result,
                    Err(_) => continue, // leader panicked or dropped; retry as leader
                }
            }

            let (tx, _rx) = broadcast::channel(1);
            // Take the leader slot. If someone raced us between the check above and
            // here, `entry` resolves the race atomically.
            let became_leader = match self.inflight.entry(key.to_string()) {
                dashmap::mapref::entry::Entry::Vacant(v) => {
                    v.insert(Slot::InFlight(tx.clone()));
                    true
                }
                dashmap::mapref::entry::Entry::Occupied(_) => false,
            };

            if !became_leader {
                continue;
            }

            let result = f().await;
            self.inflight.remove(key);
            let _ = tx.send(result.clone());
            return result;
        }
    }

    fn subscribe_if_inflight(&self, key: &str) -> Option<broadcast::Receiver<Result<T, StageError>>> {
        self.inflight.get(key).map(|slot| match slot.value() {
            Slot::InFlight(tx) => tx.subscribe(),
        })
    }
}

impl<T: Clone + Send + Sync + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience alias for the common case of sharing a single-flight coordinator
/// across tasks.
pub type SharedSingleFlight<T> = Arc<SingleFlight<T>>;
