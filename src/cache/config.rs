//! Cache configuration and store construction.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::{CacheBackend, CacheSettings};

use super::redis_store::RedisCacheStore;
use super::store::{CacheStore, DisabledCacheStore, MemoryCacheStore};

const DEFAULT_TTL_SECS: u64 = 3600;
const DEFAULT_MEMORY_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub backend: CacheBackend,
    pub redis_url: String,
    /// Applied to writes that do not carry their own ttl.
    pub default_ttl: Duration,
    /// Entry limit for the memory backend.
    pub memory_capacity: NonZeroUsize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Memory,
            redis_url: String::new(),
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            memory_capacity: NonZeroUsize::new(DEFAULT_MEMORY_CAPACITY).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            backend: settings.backend,
            redis_url: settings.redis_url.clone(),
            default_ttl: Duration::from_secs(settings.default_ttl.get()),
            memory_capacity: settings.memory_capacity,
        }
    }
}

impl CacheConfig {
    /// Build the process-wide store. Redis connects here, once.
    pub async fn build_store(&self) -> Arc<dyn CacheStore> {
        if !self.enabled {
            info!(target = "portal::cache", "Cache disabled by configuration");
            return Arc::new(DisabledCacheStore);
        }

        match self.backend {
            CacheBackend::Redis => {
                Arc::new(RedisCacheStore::connect(&self.redis_url, self.default_ttl).await)
            }
            CacheBackend::Memory => {
                info!(
                    target = "portal::cache",
                    backend = "memory",
                    capacity = self.memory_capacity.get(),
                    "Using in-process cache"
                );
                Arc::new(MemoryCacheStore::new(
                    self.memory_capacity,
                    self.default_ttl,
                ))
            }
        }
    }
}
