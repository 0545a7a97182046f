//! In-process L1 cache: a bounded LRU keyed by alert fingerprint.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::model::ClassificationResult;

/// Thread-safe LRU front for classification results. Checked before L2 and before
/// issuing an LLM call.
pub struct L1Cache {
    inner: Mutex<LruCache<String, ClassificationResult>>,
}

impl L1Cache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, fingerprint: &str) -> Option<ClassificationResult> {
        self.inner.lock().get(fingerprint).cloned()
    }

    pub fn put(&self, fingerprint: String, result: ClassificationResult) {
        self.inner.lock().put(fingerprint, result);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
