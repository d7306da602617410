use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::repos::{
        CharacterFilter, CharactersRepo, CharactersWriteRepo, PageWindow, RepoError,
    },
    domain::characters::{CharacterUpsert, OriginUpsert},
    domain::entities::{CharacterRecord, OriginRecord},
};

use super::{
    PostgresRepositories,
    util::{escape_like, map_sqlx_error},
};

const CHARACTER_SELECT: &str = "SELECT \
    c.id, c.api_id, c.status, c.species, c.gender, c.name, c.origin_id, \
    c.created_at, c.updated_at, \
    o.id AS origin_row_id, o.api_id AS origin_api_id, o.name AS origin_name, \
    o.created_at AS origin_created_at, o.updated_at AS origin_updated_at \
    FROM characters c \
    LEFT OUTER JOIN origins o ON o.id = c.origin_id";

#[derive(sqlx::FromRow)]
struct CharacterRow {
    id: i32,
    api_id: i32,
    status: String,
    species: String,
    gender: String,
    name: String,
    origin_id: Option<i32>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    origin_row_id: Option<i32>,
    origin_api_id: Option<i32>,
    origin_name: Option<String>,
    origin_created_at: Option<OffsetDateTime>,
    origin_updated_at: Option<OffsetDateTime>,
}

impl From<CharacterRow> for CharacterRecord {
    fn from(row: CharacterRow) -> Self {
        let origin = match (
            row.origin_row_id,
            row.origin_name,
            row.origin_created_at,
            row.origin_updated_at,
        ) {
            (Some(id), Some(name), Some(created_at), Some(updated_at)) => Some(OriginRecord {
                id,
                api_id: row.origin_api_id,
                name,
                created_at,
                updated_at,
            }),
            _ => None,
        };

        Self {
            id: row.id,
            api_id: row.api_id,
            status: row.status,
            species: row.species,
            gender: row.gender,
            name: row.name,
            origin_id: row.origin_id,
            origin,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PostgresRepositories {
    /// Empty strings and a zero `origin_id` leave the listing unconstrained.
    fn apply_character_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q CharacterFilter) {
        if let Some(name) = non_empty(filter.name.as_deref()) {
            qb.push(" AND c.name ILIKE ");
            qb.push_bind(format!("%{}%", escape_like(name)));
        }
        if let Some(status) = non_empty(filter.status.as_deref()) {
            qb.push(" AND c.status = ");
            qb.push_bind(status);
        }
        if let Some(species) = non_empty(filter.species.as_deref()) {
            qb.push(" AND c.species = ");
            qb.push_bind(species);
        }
        if let Some(gender) = non_empty(filter.gender.as_deref()) {
            qb.push(" AND c.gender = ");
            qb.push_bind(gender);
        }
        if let Some(origin_id) = filter.origin_id.filter(|id| *id != 0) {
            qb.push(" AND c.origin_id = ");
            qb.push_bind(origin_id);
        }
    }

    async fn find_single_character(
        &self,
        column: &'static str,
        value: i32,
    ) -> Result<Option<CharacterRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(CHARACTER_SELECT);
        qb.push(" WHERE c.");
        qb.push(column);
        qb.push(" = ");
        qb.push_bind(value);

        let row = qb
            .build_query_as::<CharacterRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(CharacterRecord::from))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[async_trait]
impl CharactersRepo for PostgresRepositories {
    async fn find_characters(
        &self,
        filter: &CharacterFilter,
        window: PageWindow,
    ) -> Result<Vec<CharacterRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(CHARACTER_SELECT);
        qb.push(" WHERE 1 = 1");
        Self::apply_character_filter(&mut qb, filter);
        qb.push(" ORDER BY c.name COLLATE \"C\" ASC, c.id ASC LIMIT ");
        qb.push_bind(i64::from(window.limit));
        qb.push(" OFFSET ");
        qb.push_bind(i64::from(window.offset));

        let rows = qb
            .build_query_as::<CharacterRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CharacterRecord::from).collect())
    }

    async fn find_character_by_id(&self, id: i32) -> Result<Option<CharacterRecord>, RepoError> {
        self.find_single_character("id", id).await
    }

    async fn find_character_by_api_id(
        &self,
        api_id: i32,
    ) -> Result<Option<CharacterRecord>, RepoError> {
        self.find_single_character("api_id", api_id).await
    }
}

#[async_trait]
impl CharactersWriteRepo for PostgresRepositories {
    async fn upsert_origin(&self, origin: &OriginUpsert) -> Result<i32, RepoError> {
        let id = match origin.api_id {
            Some(api_id) => sqlx::query_scalar::<_, i32>(
                r#"
                INSERT INTO origins (api_id, name)
                VALUES ($1, $2)
                ON CONFLICT (api_id) DO UPDATE
                    SET name = EXCLUDED.name,
                        updated_at = now()
                RETURNING id
                "#,
            )
            .bind(api_id)
            .bind(&origin.name)
            .fetch_one(self.pool())
            .await,
            None => sqlx::query_scalar::<_, i32>(
                r#"
                INSERT INTO origins (api_id, name)
                VALUES (NULL, $1)
                ON CONFLICT ((api_id IS NULL)) WHERE api_id IS NULL DO UPDATE
                    SET name = EXCLUDED.name,
                        updated_at = now()
                RETURNING id
                "#,
            )
            .bind(&origin.name)
            .fetch_one(self.pool())
            .await,
        };

        id.map_err(map_sqlx_error)
    }

    async fn upsert_character(
        &self,
        character: &CharacterUpsert,
        origin_id: Option<i32>,
    ) -> Result<i32, RepoError> {
        sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO characters (api_id, name, status, species, gender, origin_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (api_id) DO UPDATE
                SET name = EXCLUDED.name,
                    status = EXCLUDED.status,
                    species = EXCLUDED.species,
                    gender = EXCLUDED.gender,
                    origin_id = EXCLUDED.origin_id,
                    updated_at = now()
            RETURNING id
            "#,
        )
        .bind(character.api_id)
        .bind(&character.name)
        .bind(&character.status)
        .bind(&character.species)
        .bind(&character.gender)
        .bind(origin_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
