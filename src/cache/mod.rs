//! Cache-aside support.
//!
//! - [`keys`]: deterministic key derivation for each read operation
//! - [`CacheStore`]: get/set/delete/delete_pattern over a TTL key-value
//!   store, implemented for Redis and for an in-process LRU
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! backend = "redis"        # or "memory"
//! redis_url = "redis://127.0.0.1:6379"
//! default_ttl_seconds = 3600
//! memory_capacity = 1024
//! ```

mod config;
pub mod keys;
mod lock;
mod redis_store;
mod store;

pub use config::CacheConfig;
pub use keys::CacheKey;
pub use redis_store::RedisCacheStore;
pub use store::{CacheStore, DisabledCacheStore, MemoryCacheStore};
