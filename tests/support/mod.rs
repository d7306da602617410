#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use portal::application::repos::{
    CharacterFilter, CharactersRepo, CharactersWriteRepo, PageWindow, RepoError,
};
use portal::domain::characters::{CharacterUpsert, OriginUpsert};
use portal::domain::entities::{CharacterRecord, OriginRecord};
use time::OffsetDateTime;
use tokio::sync::Mutex;

pub fn origin(id: i32, api_id: Option<i32>, name: &str) -> OriginRecord {
    let now = OffsetDateTime::now_utc();
    OriginRecord {
        id,
        api_id,
        name: name.to_string(),
        created_at: now,
        updated_at: now,
    }
}

pub fn character(
    id: i32,
    name: &str,
    status: &str,
    origin: Option<OriginRecord>,
) -> CharacterRecord {
    let now = OffsetDateTime::now_utc();
    CharacterRecord {
        id,
        api_id: id + 100,
        status: status.to_string(),
        species: "Human".to_string(),
        gender: "Male".to_string(),
        name: name.to_string(),
        origin_id: origin.as_ref().map(|o| o.id),
        origin,
        created_at: now,
        updated_at: now,
    }
}

/// In-memory read model that counts how often it was queried.
#[derive(Default)]
pub struct FakeCharactersRepo {
    pub records: Mutex<Vec<CharacterRecord>>,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl FakeCharactersRepo {
    pub fn with_records(records: Vec<CharacterRecord>) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(records),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next_calls(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RepoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RepoError::Persistence("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CharactersRepo for FakeCharactersRepo {
    async fn find_characters(
        &self,
        filter: &CharacterFilter,
        window: PageWindow,
    ) -> Result<Vec<CharacterRecord>, RepoError> {
        self.check()?;
        let mut rows: Vec<CharacterRecord> = self
            .records
            .lock()
            .await
            .iter()
            .filter(|c| {
                filter
                    .name
                    .as_ref()
                    .is_none_or(|n| c.name.to_lowercase().contains(&n.to_lowercase()))
                    && filter.status.as_ref().is_none_or(|s| &c.status == s)
                    && filter.origin_id.is_none_or(|id| c.origin_id == Some(id))
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(rows
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .collect())
    }

    async fn find_character_by_id(&self, id: i32) -> Result<Option<CharacterRecord>, RepoError> {
        self.check()?;
        Ok(self.records.lock().await.iter().find(|c| c.id == id).cloned())
    }

    async fn find_character_by_api_id(
        &self,
        api_id: i32,
    ) -> Result<Option<CharacterRecord>, RepoError> {
        self.check()?;
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .find(|c| c.api_id == api_id)
            .cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOrigin {
    pub id: i32,
    pub api_id: Option<i32>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCharacter {
    pub id: i32,
    pub api_id: i32,
    pub name: String,
    pub origin_id: Option<i32>,
}

/// Write model keyed by natural key, mirroring the database upsert semantics.
#[derive(Default)]
pub struct FakeWriteRepo {
    pub origins: Mutex<Vec<StoredOrigin>>,
    pub characters: Mutex<Vec<StoredCharacter>>,
    character_upserts: AtomicUsize,
    fail_on_character_upsert: Option<usize>,
}

impl FakeWriteRepo {
    /// The `nth` character upsert (1-based) times out; earlier ones are kept.
    pub fn failing_on_character_upsert(nth: usize) -> Self {
        Self {
            fail_on_character_upsert: Some(nth),
            ..Self::default()
        }
    }
}

#[async_trait]
impl CharactersWriteRepo for FakeWriteRepo {
    async fn upsert_origin(&self, origin: &OriginUpsert) -> Result<i32, RepoError> {
        let mut origins = self.origins.lock().await;
        if let Some(existing) = origins.iter_mut().find(|o| o.api_id == origin.api_id) {
            existing.name = origin.name.clone();
            return Ok(existing.id);
        }
        let id = origins.len() as i32 + 1;
        origins.push(StoredOrigin {
            id,
            api_id: origin.api_id,
            name: origin.name.clone(),
        });
        Ok(id)
    }

    async fn upsert_character(
        &self,
        character: &CharacterUpsert,
        origin_id: Option<i32>,
    ) -> Result<i32, RepoError> {
        let attempt = self.character_upserts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_character_upsert == Some(attempt) {
            return Err(RepoError::Timeout);
        }
        let mut characters = self.characters.lock().await;
        if let Some(existing) = characters
            .iter_mut()
            .find(|c| c.api_id == character.api_id)
        {
            existing.name = character.name.clone();
            existing.origin_id = origin_id;
            return Ok(existing.id);
        }
        let id = characters.len() as i32 + 1;
        characters.push(StoredCharacter {
            id,
            api_id: character.api_id,
            name: character.name.clone(),
            origin_id,
        });
        Ok(id)
    }
}
