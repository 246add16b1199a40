//! Repository-context cache with LRU eviction and TTL support.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::repo::RepoContext;
use crate::ttl::TtlTracker;

/// Default capacity when none is configured.
pub const DEFAULT_MAX_ENTRIES: usize = 64;

struct CacheInner {
    lru: LruCache<String, Arc<RepoContext>>,
    ttl: TtlTracker,
}

/// Process-wide cache of repository contexts keyed by `owner/repo`.
///
/// Shared between concurrent invocations; each entry is written once and
/// then only read. Capacity bounds memory, and an optional TTL bounds
/// staleness. Without a TTL entries live until evicted.
pub struct RepoContextCache {
    inner: RwLock<CacheInner>,
    max_entries: usize,
}

impl RepoContextCache {
    pub fn new(max_entries: usize, ttl: Option<Duration>) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: RwLock::new(CacheInner {
                lru: LruCache::new(cap),
                ttl: TtlTracker::new(ttl),
            }),
            max_entries: cap.get(),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.lru.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.lru.is_empty()
    }

    /// Look up a context, dropping it first if it has expired.
    pub async fn get(&self, key: &str) -> Option<Arc<RepoContext>> {
        let mut inner = self.inner.write().await;

        if inner.ttl.is_expired(key) {
            if inner.lru.pop(key).is_some() {
                debug!(repo = %key, "Repository context expired, removing from cache");
            }
            inner.ttl.remove(key);
            return None;
        }

        let hit = inner.lru.get(key).cloned();
        trace!(repo = %key, hit = hit.is_some(), "Repository context lookup");
        hit
    }

    /// Insert a context, evicting the least recently used entry at capacity.
    pub async fn insert(&self, key: &str, context: Arc<RepoContext>) {
        let mut inner = self.inner.write().await;

        if inner.lru.len() >= self.max_entries && !inner.lru.contains(key) {
            if let Some((evicted, _)) = inner.lru.pop_lru() {
                debug!(repo = %evicted, "Evicting LRU repository context to make room");
                inner.ttl.remove(&evicted);
            }
        }

        inner.lru.put(key.to_string(), context);
        inner.ttl.record(key);

        trace!(repo = %key, cache_size = inner.lru.len(), "Repository context cached");
    }

    /// Drop a single entry.
    pub async fn invalidate(&self, key: &str) {
        let mut inner = self.inner.write().await;
        inner.ttl.remove(key);
        if inner.lru.pop(key).is_some() {
            debug!(repo = %key, "Repository context invalidated");
        }
    }

    /// Remove every expired entry and return how many were dropped.
    pub async fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let expired = inner.ttl.drain_expired();
        for key in &expired {
            inner.lru.pop(key);
        }
        expired.len()
    }
}

impl Default for RepoContextCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, None)
    }
}

impl std::fmt::Debug for RepoContextCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoContextCache")
            .field("max_entries", &self.max_entries)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_types::{RepoMetadata, RepoRef};

    fn context(key: &str) -> Arc<RepoContext> {
        let repo: RepoRef = key.parse().unwrap();
        Arc::new(RepoContext {
            metadata: RepoMetadata {
                full_name: repo.key(),
                ..Default::default()
            },
            repo,
            tree: Vec::new(),
            readme: None,
        })
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = RepoContextCache::default();
        cache.insert("acme/one", context("acme/one")).await;

        let hit = cache.get("acme/one").await.unwrap();
        assert_eq!(hit.metadata.full_name, "acme/one");
        assert!(cache.get("acme/two").await.is_none());
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = RepoContextCache::new(2, None);
        cache.insert("a/1", context("a/1")).await;
        cache.insert("a/2", context("a/2")).await;

        // Touch a/1 so a/2 becomes least recently used.
        assert!(cache.get("a/1").await.is_some());
        cache.insert("a/3", context("a/3")).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("a/2").await.is_none());
        assert!(cache.get("a/1").await.is_some());
        assert!(cache.get("a/3").await.is_some());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = RepoContextCache::new(4, Some(Duration::from_millis(10)));
        cache.insert("a/1", context("a/1")).await;
        assert!(cache.get("a/1").await.is_some());

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(cache.get("a/1").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_cleanup_and_invalidate() {
        let cache = RepoContextCache::new(4, Some(Duration::from_millis(10)));
        cache.insert("a/1", context("a/1")).await;
        cache.insert("a/2", context("a/2")).await;
        cache.invalidate("a/2").await;
        assert_eq!(cache.len().await, 1);

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(cache.cleanup_expired().await, 1);
        assert!(cache.is_empty().await);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        assert_eq!(RepoContextCache::new(0, None).max_entries(), 1);
    }
}
