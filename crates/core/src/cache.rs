//! Time-bounded cache of constructed directory nodes.
//!
//! Entries are keyed by data source, path, viewer identity and language, so a
//! node built for one user is never served to another. Last write wins.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::tree::DirectoryNode;

/// Past this many entries a write first drops expired ones.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub ds_name: String,
    pub full_path: String,
    /// Username or `anonymous`.
    pub identity: String,
    pub language: String,
}

impl CacheKey {
    pub fn new(ds_name: &str, full_path: &str, identity: &str, language: &str) -> Self {
        Self {
            ds_name: ds_name.to_string(),
            full_path: full_path.to_string(),
            identity: identity.to_string(),
            language: language.to_string(),
        }
    }
}

pub struct DirectoryCache<V = DirectoryNode> {
    entries: RwLock<HashMap<CacheKey, (Instant, Arc<V>)>>,
    ttl: Duration,
}

impl<V> DirectoryCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// A live entry, if any. Expired entries are left for [`Self::purge_expired`].
    pub fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|(stored, _)| stored.elapsed() < self.ttl)
            .map(|(_, value)| Arc::clone(value))
    }

    pub fn put(&self, key: CacheKey, value: Arc<V>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= PRUNE_THRESHOLD {
            entries.retain(|_, (stored, _)| stored.elapsed() < self.ttl);
        }
        entries.insert(key, (Instant::now(), value));
    }

    /// Drop every language variant of `(ds, path, identity)`.
    pub fn invalidate(&self, ds_name: &str, full_path: &str, identity: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|key, _| {
            !(key.ds_name == ds_name && key.full_path == full_path && key.identity == identity)
        });
        tracing::debug!(
            ds = %ds_name,
            path = %full_path,
            identity,
            dropped = before - entries.len(),
            "Invalidated directory cache entries",
        );
    }

    /// Remove expired entries; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, (stored, _)| stored.elapsed() < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
