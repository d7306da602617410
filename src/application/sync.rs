//! Upstream character synchronization.
//!
//! A run pages through the source until it reports no further page, then
//! upserts every record by its upstream id. Origins are upserted first so the
//! character row can point at the local origin id. Runs are not wrapped in a
//! transaction: a failure part-way leaves earlier upserts in place.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::application::repos::{CharactersWriteRepo, RepoError};
use crate::cache::{CacheStore, keys::CHARACTER_KEYS_PATTERN};
use crate::domain::characters::CharacterUpsert;

const SOURCE: &str = "application::sync";

/// One page of upstream records.
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    pub records: Vec<CharacterUpsert>,
    pub has_next: bool,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("upstream responded with HTTP {status}")]
    Status { status: u16 },
    #[error("upstream reported errors: {0}")]
    GraphQl(String),
    #[error("upstream response carried no data")]
    MissingData,
    #[error("upstream record rejected: {0}")]
    InvalidRecord(String),
}

/// Paginated feed of characters from the external API.
#[async_trait]
pub trait CharacterSource: Send + Sync {
    /// Fetch a 1-based page.
    async fn fetch_page(&self, page: u32) -> Result<SourcePage, SourceError>;
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to fetch page {page}: {source}")]
    Fetch {
        page: u32,
        #[source]
        source: SourceError,
    },
    #[error("failed to upsert origin for character {api_id}: {source}")]
    Origin {
        api_id: i32,
        #[source]
        source: RepoError,
    },
    #[error("failed to upsert character {api_id}: {source}")]
    Character {
        api_id: i32,
        #[source]
        source: RepoError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub records: usize,
    pub pages: u32,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncSummary),
    /// Another run held the gate; nothing was fetched.
    Skipped,
}

#[derive(Clone)]
pub struct CharacterSyncService {
    source: Arc<dyn CharacterSource>,
    writer: Arc<dyn CharactersWriteRepo>,
    invalidate: Option<Arc<dyn CacheStore>>,
    running: Arc<AtomicBool>,
    last_run: Arc<RwLock<Option<SyncSummary>>>,
}

impl CharacterSyncService {
    pub fn new(source: Arc<dyn CharacterSource>, writer: Arc<dyn CharactersWriteRepo>) -> Self {
        Self {
            source,
            writer,
            invalidate: None,
            running: Arc::new(AtomicBool::new(false)),
            last_run: Arc::new(RwLock::new(None)),
        }
    }

    /// Delete cached character entries after each successful run.
    pub fn with_cache_invalidation(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.invalidate = Some(cache);
        self
    }

    pub fn state(&self) -> SyncState {
        if self.running.load(Ordering::Acquire) {
            SyncState::Running
        } else {
            SyncState::Idle
        }
    }

    pub async fn last_run(&self) -> Option<SyncSummary> {
        self.last_run.read().await.clone()
    }

    /// Perform one sync pass, or skip if a pass is already in flight.
    pub async fn run(&self) -> Result<SyncOutcome, SyncError> {
        let Some(_gate) = RunGate::acquire(&self.running) else {
            info!(
                target = "portal::sync",
                source = SOURCE,
                "Sync already running, skipping this tick"
            );
            return Ok(SyncOutcome::Skipped);
        };

        let started = Instant::now();
        let started_at = OffsetDateTime::now_utc();

        match self.fetch_and_apply().await {
            Ok((records, pages)) => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                histogram!("portal_sync_ms", "outcome" => "ok").record(elapsed_ms);
                counter!("portal_sync_records_total").increment(records as u64);

                info!(
                    target = "portal::sync",
                    records,
                    pages,
                    elapsed_ms,
                    "Synced {records} characters"
                );

                self.invalidate_cache().await;

                let summary = SyncSummary {
                    records,
                    pages,
                    started_at,
                    finished_at: OffsetDateTime::now_utc(),
                };
                *self.last_run.write().await = Some(summary.clone());
                Ok(SyncOutcome::Completed(summary))
            }
            Err(err) => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                histogram!("portal_sync_ms", "outcome" => "error").record(elapsed_ms);
                error!(
                    target = "portal::sync",
                    error = %err,
                    elapsed_ms,
                    "Error syncing characters"
                );
                Err(err)
            }
        }
    }

    async fn fetch_and_apply(&self) -> Result<(usize, u32), SyncError> {
        let (records, pages) = self.fetch_all().await?;
        self.apply(&records).await?;
        Ok((records.len(), pages))
    }

    async fn fetch_all(&self) -> Result<(Vec<CharacterUpsert>, u32), SyncError> {
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let batch = self
                .source
                .fetch_page(page)
                .await
                .map_err(|source| SyncError::Fetch { page, source })?;
            debug!(
                target = "portal::sync",
                page,
                records = batch.records.len(),
                has_next = batch.has_next,
                "Fetched upstream page"
            );
            records.extend(batch.records);

            if !batch.has_next {
                return Ok((records, page));
            }
            page += 1;
        }
    }

    async fn apply(&self, records: &[CharacterUpsert]) -> Result<(), SyncError> {
        for record in records {
            let origin_id = match record.origin.as_ref() {
                Some(origin) => Some(self.writer.upsert_origin(origin).await.map_err(
                    |source| SyncError::Origin {
                        api_id: record.api_id,
                        source,
                    },
                )?),
                None => None,
            };

            self.writer
                .upsert_character(record, origin_id)
                .await
                .map_err(|source| SyncError::Character {
                    api_id: record.api_id,
                    source,
                })?;
        }
        Ok(())
    }

    async fn invalidate_cache(&self) {
        let Some(cache) = self.invalidate.as_ref() else {
            return;
        };
        if !cache.delete_pattern(CHARACTER_KEYS_PATTERN).await {
            warn!(
                target = "portal::sync",
                backend = cache.backend(),
                pattern = CHARACTER_KEYS_PATTERN,
                "Post-sync cache invalidation did not complete"
            );
        }
    }
}

/// Holds the single-run flag for the lifetime of a pass.
struct RunGate<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGate<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGate<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_admits_one_holder_at_a_time() {
        let flag = AtomicBool::new(false);

        let first = RunGate::acquire(&flag).expect("first acquire");
        assert!(RunGate::acquire(&flag).is_none());

        drop(first);
        assert!(RunGate::acquire(&flag).is_some());
    }
}
