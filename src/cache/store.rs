//! Cache store adapters.
//!
//! Every operation degrades instead of failing: transport problems are
//! logged at warn and surface as a miss or `false`.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use glob::Pattern;
use lru::LruCache;
use metrics::counter;
use tracing::warn;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

const METRIC_CACHE_HIT: &str = "portal_cache_hit_total";
const METRIC_CACHE_MISS: &str = "portal_cache_miss_total";

/// Key-value cache with per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend label used in logs and metrics.
    fn backend(&self) -> &'static str;

    /// Whether the backing connection was established at startup.
    fn is_available(&self) -> bool;

    async fn get(&self, key: &str) -> Option<Bytes>;

    /// Store `value` under `key`; `ttl = None` applies the store's default.
    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> bool;

    async fn delete(&self, key: &str) -> bool;

    /// Remove every key matching a glob pattern (`*`, `?`, `[...]`).
    async fn delete_pattern(&self, pattern: &str) -> bool;
}

pub(crate) fn record_lookup(backend: &'static str, hit: bool) {
    if hit {
        counter!(METRIC_CACHE_HIT, "backend" => backend).increment(1);
    } else {
        counter!(METRIC_CACHE_MISS, "backend" => backend).increment(1);
    }
}

pub(crate) fn effective_ttl(ttl: Option<Duration>, default_ttl: Duration) -> Option<Duration> {
    // A zero override falls back to the default, like an absent one.
    let ttl = ttl.filter(|ttl| !ttl.is_zero()).unwrap_or(default_ttl);
    (!ttl.is_zero()).then_some(ttl)
}

/// Stand-in used when caching is switched off. Never available, always misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCacheStore;

#[async_trait]
impl CacheStore for DisabledCacheStore {
    fn backend(&self) -> &'static str {
        "disabled"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn get(&self, _key: &str) -> Option<Bytes> {
        None
    }

    async fn set(&self, _key: &str, _value: Bytes, _ttl: Option<Duration>) -> bool {
        false
    }

    async fn delete(&self, _key: &str) -> bool {
        false
    }

    async fn delete_pattern(&self, _pattern: &str) -> bool {
        false
    }
}

struct MemoryEntry {
    value: Bytes,
    expires_at: Instant,
}

/// In-process LRU cache with lazy TTL expiry.
pub struct MemoryCacheStore {
    entries: Mutex<LruCache<String, MemoryEntry>>,
    default_ttl: Duration,
}

impl MemoryCacheStore {
    pub fn new(capacity: NonZeroUsize, default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            default_ttl,
        }
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Option<Bytes> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let expired = match entries.peek(key) {
            Some(entry) => entry.expires_at <= Instant::now(),
            None => {
                record_lookup(self.backend(), false);
                return None;
            }
        };

        if expired {
            entries.pop(key);
            record_lookup(self.backend(), false);
            return None;
        }

        let value = entries.get(key).map(|entry| entry.value.clone());
        record_lookup(self.backend(), value.is_some());
        value
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> bool {
        let Some(ttl) = effective_ttl(ttl, self.default_ttl) else {
            warn!(
                target = "portal::cache",
                backend = self.backend(),
                key,
                "Refusing to cache entry with zero ttl"
            );
            return false;
        };

        let entry = MemoryEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        mutex_lock(&self.entries, SOURCE, "set").put(key.to_string(), entry);
        true
    }

    async fn delete(&self, key: &str) -> bool {
        mutex_lock(&self.entries, SOURCE, "delete").pop(key);
        true
    }

    async fn delete_pattern(&self, pattern: &str) -> bool {
        let matcher = match Pattern::new(pattern) {
            Ok(matcher) => matcher,
            Err(err) => {
                warn!(
                    target = "portal::cache",
                    backend = self.backend(),
                    pattern,
                    error = %err,
                    "Invalid cache key pattern"
                );
                return false;
            }
        };

        let mut entries = mutex_lock(&self.entries, SOURCE, "delete_pattern");
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| matcher.matches(key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in doomed {
            entries.pop(&key);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryCacheStore {
        MemoryCacheStore::new(
            NonZeroUsize::new(8).expect("non-zero"),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let store = store();
        assert!(store.set("character:id:1", Bytes::from_static(b"rick"), None).await);
        assert_eq!(
            store.get("character:id:1").await,
            Some(Bytes::from_static(b"rick"))
        );
    }

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let store = store();
        assert!(
            store
                .set(
                    "character:id:1",
                    Bytes::from_static(b"rick"),
                    Some(Duration::from_millis(10)),
                )
                .await
        );
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(store.get("character:id:1").await.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn zero_ttl_override_uses_default() {
        let store = store();
        assert!(store.set("k", Bytes::from_static(b"v"), Some(Duration::ZERO)).await);
        assert_eq!(store.get("k").await, Some(Bytes::from_static(b"v")));
    }

    #[test]
    fn zero_default_ttl_disables_writes() {
        assert_eq!(effective_ttl(None, Duration::ZERO), None);
        assert_eq!(
            effective_ttl(Some(Duration::ZERO), Duration::from_secs(5)),
            Some(Duration::from_secs(5))
        );
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let store = MemoryCacheStore::new(
            NonZeroUsize::new(2).expect("non-zero"),
            Duration::from_secs(60),
        );
        store.set("a", Bytes::from_static(b"1"), None).await;
        store.set("b", Bytes::from_static(b"2"), None).await;
        let _ = store.get("a").await;
        store.set("c", Bytes::from_static(b"3"), None).await;

        assert!(store.get("a").await.is_some());
        assert!(store.get("b").await.is_none());
        assert!(store.get("c").await.is_some());
    }

    #[tokio::test]
    async fn delete_pattern_removes_only_matches() {
        let store = store();
        store.set("character:id:1", Bytes::from_static(b"1"), None).await;
        store.set("characters:limit:20:offset:0", Bytes::from_static(b"[]"), None).await;
        store.set("origin:id:1", Bytes::from_static(b"o"), None).await;

        assert!(store.delete_pattern("character*").await);

        assert!(store.get("character:id:1").await.is_none());
        assert!(store.get("characters:limit:20:offset:0").await.is_none());
        assert!(store.get("origin:id:1").await.is_some());
    }

    #[tokio::test]
    async fn invalid_pattern_reports_failure() {
        let store = store();
        assert!(!store.delete_pattern("character[").await);
    }

    #[tokio::test]
    async fn disabled_store_never_hits() {
        let store = DisabledCacheStore;
        assert!(!store.is_available());
        assert!(!store.set("k", Bytes::from_static(b"v"), None).await);
        assert!(store.get("k").await.is_none());
    }
}
