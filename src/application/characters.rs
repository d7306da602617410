//! Cache-aside read path for character queries.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use metrics::{counter, histogram};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::repos::{
    CharacterFilter, CharactersRepo, DEFAULT_PAGE_LIMIT, PageWindow, RepoError,
};
use crate::cache::{CacheStore, keys};
use crate::domain::entities::CharacterRecord;
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Results that are written back to the cache only when they carry data.
trait Cacheable {
    fn worth_caching(&self) -> bool;
}

impl<T> Cacheable for Vec<T> {
    fn worth_caching(&self) -> bool {
        !self.is_empty()
    }
}

impl<T> Cacheable for Option<T> {
    fn worth_caching(&self) -> bool {
        self.is_some()
    }
}

#[derive(Clone, Copy)]
enum CacheOutcome {
    Hit,
    Miss,
    Bypass,
}

impl CacheOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Bypass => "bypass",
        }
    }
}

#[derive(Clone)]
pub struct CharacterQueryService {
    repo: Arc<dyn CharactersRepo>,
    cache: Arc<dyn CacheStore>,
}

impl CharacterQueryService {
    pub fn new(repo: Arc<dyn CharactersRepo>, cache: Arc<dyn CacheStore>) -> Self {
        Self { repo, cache }
    }

    /// List characters matching `filter`. `limit` defaults to 20, `offset` to 0.
    pub async fn characters(
        &self,
        filter: CharacterFilter,
        limit: Option<i32>,
        offset: Option<i32>,
    ) -> Result<Vec<CharacterRecord>, QueryError> {
        let window = resolve_window(limit, offset)?;
        let key = keys::characters_key(&filter, window);
        let repo = self.repo.clone();

        self.cache_aside("characters", key, || async move {
            repo.find_characters(&filter, window).await
        })
        .await
    }

    pub async fn character(&self, id: i32) -> Result<Option<CharacterRecord>, QueryError> {
        let repo = self.repo.clone();
        self.cache_aside("character", keys::character_key(id), || async move {
            repo.find_character_by_id(id).await
        })
        .await
    }

    pub async fn character_by_api_id(
        &self,
        api_id: i32,
    ) -> Result<Option<CharacterRecord>, QueryError> {
        let repo = self.repo.clone();
        self.cache_aside(
            "characterByApiId",
            keys::character_by_api_id_key(api_id),
            || async move { repo.find_character_by_api_id(api_id).await },
        )
        .await
    }

    async fn cache_aside<T, F, Fut>(
        &self,
        operation: &'static str,
        key: String,
        load: F,
    ) -> Result<T, QueryError>
    where
        T: Serialize + DeserializeOwned + Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RepoError>>,
    {
        let started = Instant::now();
        let cache_live = self.cache.is_available();

        if cache_live && let Some(value) = self.read_cached::<T>(&key).await {
            self.record_timing(operation, CacheOutcome::Hit, started);
            return Ok(value);
        }

        let value = match load().await {
            Ok(value) => value,
            Err(err) => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                warn!(
                    target = "portal::resolver",
                    operation,
                    key = %key,
                    error = %err,
                    elapsed_ms,
                    "[{operation}] failed after {elapsed_ms:.2}ms"
                );
                return Err(err.into());
            }
        };

        if cache_live && value.worth_caching() {
            self.write_cached(&key, &value).await;
        }

        let outcome = if cache_live {
            CacheOutcome::Miss
        } else {
            CacheOutcome::Bypass
        };
        self.record_timing(operation, outcome, started);
        Ok(value)
    }

    async fn read_cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.cache.get(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    target = "portal::resolver",
                    key,
                    error = %err,
                    "Discarding undecodable cache entry"
                );
                None
            }
        }
    }

    async fn write_cached<T: Serialize>(&self, key: &str, value: &T) {
        let payload = match serde_json::to_vec(value) {
            Ok(payload) => Bytes::from(payload),
            Err(err) => {
                warn!(
                    target = "portal::resolver",
                    key,
                    error = %err,
                    "Failed to encode result for cache"
                );
                return;
            }
        };

        if !self.cache.set(key, payload, None).await {
            counter!("portal_cache_write_failed_total", "backend" => self.cache.backend())
                .increment(1);
            debug!(
                target = "portal::resolver",
                key,
                backend = self.cache.backend(),
                "Cache write did not persist"
            );
        }
    }

    fn record_timing(&self, operation: &'static str, outcome: CacheOutcome, started: Instant) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        histogram!("portal_resolver_ms", "operation" => operation).record(elapsed_ms);
        debug!(
            target = "portal::resolver",
            operation,
            cache = outcome.as_str(),
            elapsed_ms,
            "[{operation}] executed in {elapsed_ms:.2}ms"
        );
    }
}

fn resolve_window(limit: Option<i32>, offset: Option<i32>) -> Result<PageWindow, DomainError> {
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let offset = offset.unwrap_or(0);
    if limit < 0 {
        return Err(DomainError::negative("limit", limit));
    }
    if offset < 0 {
        return Err(DomainError::negative("offset", offset));
    }
    Ok(PageWindow { limit, offset })
}
