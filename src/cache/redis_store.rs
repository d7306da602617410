//! Redis-backed cache store.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::{Client, aio::ConnectionManager};
use tracing::{info, warn};

use super::store::{CacheStore, effective_ttl, record_lookup};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Cache store over a multiplexed Redis connection.
///
/// The connection is attempted once at construction. When it cannot be
/// established the store stays unavailable for the life of the process and
/// every operation is a no-op.
#[derive(Clone)]
pub struct RedisCacheStore {
    connection: Option<ConnectionManager>,
    default_ttl: Duration,
}

impl RedisCacheStore {
    pub async fn connect(url: &str, default_ttl: Duration) -> Self {
        let connection = match open_connection(url).await {
            Ok(connection) => {
                info!(target = "portal::cache", backend = "redis", "Connected to Redis");
                Some(connection)
            }
            Err(reason) => {
                warn!(
                    target = "portal::cache",
                    backend = "redis",
                    reason = %reason,
                    "Redis unavailable, continuing without cache"
                );
                None
            }
        };

        Self {
            connection,
            default_ttl,
        }
    }

    /// A store that was never connected.
    pub fn unavailable(default_ttl: Duration) -> Self {
        Self {
            connection: None,
            default_ttl,
        }
    }

    fn connection(&self) -> Option<ConnectionManager> {
        self.connection.clone()
    }

    fn log_failure(&self, op: &'static str, key: &str, err: &redis::RedisError) {
        warn!(
            target = "portal::cache",
            backend = "redis",
            op,
            key,
            error = %err,
            "Cache operation failed"
        );
    }
}

async fn open_connection(url: &str) -> Result<ConnectionManager, String> {
    let client = Client::open(url).map_err(|err| format!("invalid redis url: {err}"))?;

    let mut connection = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
        .await
        .map_err(|_| format!("connection timed out after {}s", CONNECT_TIMEOUT.as_secs()))?
        .map_err(|err| format!("connection failed: {err}"))?;

    redis::cmd("PING")
        .query_async::<String>(&mut connection)
        .await
        .map_err(|err| format!("ping failed: {err}"))?;

    Ok(connection)
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    fn is_available(&self) -> bool {
        self.connection.is_some()
    }

    async fn get(&self, key: &str) -> Option<Bytes> {
        let mut conn = self.connection()?;

        match redis::cmd("GET")
            .arg(key)
            .query_async::<Option<Vec<u8>>>(&mut conn)
            .await
        {
            Ok(value) => {
                record_lookup(self.backend(), value.is_some());
                value.map(Bytes::from)
            }
            Err(err) => {
                self.log_failure("get", key, &err);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> bool {
        let Some(mut conn) = self.connection() else {
            return false;
        };
        let Some(ttl) = effective_ttl(ttl, self.default_ttl) else {
            warn!(
                target = "portal::cache",
                backend = "redis",
                key,
                "Refusing to cache entry with zero ttl"
            );
            return false;
        };

        let seconds = ttl.as_secs().max(1);
        match redis::cmd("SETEX")
            .arg(key)
            .arg(seconds)
            .arg(&value[..])
            .query_async::<()>(&mut conn)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                self.log_failure("set", key, &err);
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        let Some(mut conn) = self.connection() else {
            return false;
        };

        match redis::cmd("DEL")
            .arg(key)
            .query_async::<i64>(&mut conn)
            .await
        {
            Ok(_) => true,
            Err(err) => {
                self.log_failure("delete", key, &err);
                false
            }
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> bool {
        let Some(mut conn) = self.connection() else {
            return false;
        };

        let keys = match redis::cmd("KEYS")
            .arg(pattern)
            .query_async::<Vec<String>>(&mut conn)
            .await
        {
            Ok(keys) => keys,
            Err(err) => {
                self.log_failure("delete_pattern.keys", pattern, &err);
                return false;
            }
        };

        if keys.is_empty() {
            return true;
        }

        match redis::cmd("DEL")
            .arg(&keys)
            .query_async::<i64>(&mut conn)
            .await
        {
            Ok(_) => true,
            Err(err) => {
                self.log_failure("delete_pattern.del", pattern, &err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_store_degrades_to_misses() {
        let store = RedisCacheStore::unavailable(Duration::from_secs(60));

        assert!(!store.is_available());
        assert!(store.get("character:id:1").await.is_none());
        assert!(!store.set("character:id:1", Bytes::from_static(b"{}"), None).await);
        assert!(!store.delete("character:id:1").await);
        assert!(!store.delete_pattern("character*").await);
    }

    #[tokio::test]
    async fn malformed_url_yields_unavailable_store() {
        let store = RedisCacheStore::connect("not a url", Duration::from_secs(60)).await;
        assert!(!store.is_available());
    }
}
