//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::characters::{CharacterUpsert, OriginUpsert};
use crate::domain::entities::CharacterRecord;

pub const DEFAULT_PAGE_LIMIT: i32 = 20;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Optional predicates for character listings; absent fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterFilter {
    /// Case-insensitive substring of the character name.
    pub name: Option<String>,
    pub status: Option<String>,
    pub species: Option<String>,
    pub gender: Option<String>,
    pub origin_id: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: i32,
    pub offset: i32,
}

impl Default for PageWindow {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

#[async_trait]
pub trait CharactersRepo: Send + Sync {
    /// Rows ordered by name (byte-wise), ties broken by insertion order,
    /// each carrying its origin when one is linked.
    async fn find_characters(
        &self,
        filter: &CharacterFilter,
        window: PageWindow,
    ) -> Result<Vec<CharacterRecord>, RepoError>;

    async fn find_character_by_id(&self, id: i32) -> Result<Option<CharacterRecord>, RepoError>;

    async fn find_character_by_api_id(
        &self,
        api_id: i32,
    ) -> Result<Option<CharacterRecord>, RepoError>;
}

#[async_trait]
pub trait CharactersWriteRepo: Send + Sync {
    /// Insert or rename the origin keyed by `api_id`, returning its local id.
    async fn upsert_origin(&self, origin: &OriginUpsert) -> Result<i32, RepoError>;

    /// Insert or update the character keyed by `api_id`, returning its local id.
    async fn upsert_character(
        &self,
        character: &CharacterUpsert,
        origin_id: Option<i32>,
    ) -> Result<i32, RepoError>;
}
