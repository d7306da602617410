use std::sync::Arc;

use async_graphql::{
    Context, EmptyMutation, EmptySubscription, ErrorExtensions, Object, Schema, SimpleObject,
};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::error;

use crate::application::characters::{CharacterQueryService, QueryError};
use crate::application::repos::{CharacterFilter, RepoError};
use crate::domain::entities::{CharacterRecord, OriginRecord};

pub type PortalSchema = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

pub fn build_schema(characters: Arc<CharacterQueryService>) -> PortalSchema {
    Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
        .data(characters)
        .finish()
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "Origin")]
pub struct OriginObject {
    pub id: i32,
    #[graphql(name = "api_id")]
    pub api_id: Option<i32>,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<OriginRecord> for OriginObject {
    fn from(record: OriginRecord) -> Self {
        Self {
            id: record.id,
            api_id: record.api_id,
            name: record.name,
            created_at: rfc3339(record.created_at),
            updated_at: rfc3339(record.updated_at),
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "Character")]
pub struct CharacterObject {
    pub id: i32,
    #[graphql(name = "api_id")]
    pub api_id: i32,
    pub status: String,
    pub species: String,
    pub gender: String,
    pub name: String,
    #[graphql(name = "origin_id")]
    pub origin_id: Option<i32>,
    pub origin: Option<OriginObject>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CharacterRecord> for CharacterObject {
    fn from(record: CharacterRecord) -> Self {
        Self {
            id: record.id,
            api_id: record.api_id,
            status: record.status,
            species: record.species,
            gender: record.gender,
            name: record.name,
            origin_id: record.origin_id,
            origin: record.origin.map(OriginObject::from),
            created_at: rfc3339(record.created_at),
            updated_at: rfc3339(record.updated_at),
        }
    }
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Characters ordered by name, optionally filtered. `name` matches a
    /// case-insensitive substring; the other filters match exactly.
    #[allow(clippy::too_many_arguments)]
    async fn characters(
        &self,
        ctx: &Context<'_>,
        name: Option<String>,
        status: Option<String>,
        species: Option<String>,
        gender: Option<String>,
        #[graphql(name = "origin_id")] origin_id: Option<i32>,
        limit: Option<i32>,
        offset: Option<i32>,
    ) -> async_graphql::Result<Vec<CharacterObject>> {
        let service = ctx.data::<Arc<CharacterQueryService>>()?;
        let filter = CharacterFilter {
            name,
            status,
            species,
            gender,
            origin_id,
        };

        let records = service
            .characters(filter, limit, offset)
            .await
            .map_err(|err| field_error("characters", err))?;
        Ok(records.into_iter().map(CharacterObject::from).collect())
    }

    async fn character(
        &self,
        ctx: &Context<'_>,
        id: i32,
    ) -> async_graphql::Result<Option<CharacterObject>> {
        let service = ctx.data::<Arc<CharacterQueryService>>()?;
        let record = service
            .character(id)
            .await
            .map_err(|err| field_error("character", err))?;
        Ok(record.map(CharacterObject::from))
    }

    #[graphql(name = "characterByApiId")]
    async fn character_by_api_id(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "api_id")] api_id: i32,
    ) -> async_graphql::Result<Option<CharacterObject>> {
        let service = ctx.data::<Arc<CharacterQueryService>>()?;
        let record = service
            .character_by_api_id(api_id)
            .await
            .map_err(|err| field_error("characterByApiId", err))?;
        Ok(record.map(CharacterObject::from))
    }
}

fn field_error(operation: &'static str, err: QueryError) -> async_graphql::Error {
    let code = error_code(&err);
    if code == "INTERNAL_SERVER_ERROR" {
        error!(
            target = "portal::graphql",
            operation,
            error = %err,
            "resolver failed"
        );
    }
    async_graphql::Error::new(err.to_string()).extend_with(|_, ext| ext.set("code", code))
}

fn error_code(err: &QueryError) -> &'static str {
    match err {
        QueryError::Invalid(_) | QueryError::Repo(RepoError::InvalidInput { .. }) => {
            "BAD_USER_INPUT"
        }
        QueryError::Repo(RepoError::Timeout) => "SERVICE_UNAVAILABLE",
        QueryError::Repo(_) => "INTERNAL_SERVER_ERROR",
    }
}

fn rfc3339(value: OffsetDateTime) -> String {
    value
        .format(&Rfc3339)
        .unwrap_or_else(|_| value.to_string())
}
