use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::SignedUrlEntry;

/// One slice of the URL cache: the entry store and the per-key lock table for
/// every object key hashing into it.
///
/// Both maps are guarded only for the duration of a lookup or insert. Signing
/// happens under the per-key lock handed out by [`UrlCacheShard::key_lock`],
/// never under a shard guard.
pub(super) struct UrlCacheShard {
    entries: RwLock<HashMap<String, Arc<SignedUrlEntry>>>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UrlCacheShard {
    pub(super) fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Current entry for `object_key`, fresh or not.
    pub(super) async fn entry(&self, object_key: &str) -> Option<Arc<SignedUrlEntry>> {
        let entries = self.entries.read().await;
        entries.get(object_key).cloned()
    }

    /// URL of the entry for `object_key` if it may still be served.
    pub(super) async fn fresh_url(&self, object_key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        entries
            .get(object_key)
            .filter(|entry| entry.is_fresh())
            .map(|entry| entry.url().to_string())
    }

    /// Replace the entry for `object_key` wholesale.
    pub(super) async fn store(&self, object_key: &str, entry: SignedUrlEntry) {
        let entry = Arc::new(entry);
        let mut entries = self.entries.write().await;

        match entries.get_mut(object_key) {
            Some(slot) => *slot = entry,
            None => {
                entries.insert(object_key.to_string(), entry);
            }
        }
    }

    /// The refresh lock for `object_key`, created on first use.
    ///
    /// Concurrent first callers for the same key all receive the same lock.
    pub(super) async fn key_lock(&self, object_key: &str) -> Arc<Mutex<()>> {
        let mut key_locks = self.key_locks.lock().await;

        if let Some(lock) = key_locks.get(object_key) {
            return lock.clone();
        }

        let lock = Arc::new(Mutex::new(()));
        key_locks.insert(object_key.to_string(), lock.clone());
        lock
    }

    pub(super) async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub(super) async fn lock_count(&self) -> usize {
        self.key_locks.lock().await.len()
    }
}
