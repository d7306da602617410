//! Reference data for a fresh database.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CharactersWriteRepo, RepoError};
use crate::domain::characters::{CharacterUpsert, OriginUpsert};
use crate::domain::error::DomainError;

const UNKNOWN: &str = "unknown";

const ORIGINS: &[(Option<i32>, &str)] = &[
    (Some(1), "Earth (C-137)"),
    (Some(2), "Abadango"),
    (Some(20), "Earth (Replacement Dimension)"),
    (None, UNKNOWN),
];

/// `(api_id, name, status, species, gender, origin api_id)`; `None` links the unknown origin.
const CHARACTERS: &[(i32, &str, &str, &str, &str, Option<i32>)] = &[
    (1, "Rick Sanchez", "Alive", "Human", "Male", Some(1)),
    (2, "Morty Smith", "Alive", "Human", "Male", None),
    (3, "Summer Smith", "Alive", "Human", "Female", Some(20)),
    (4, "Beth Smith", "Alive", "Human", "Female", Some(20)),
    (5, "Jerry Smith", "Alive", "Human", "Male", Some(20)),
    (6, "Abadango Cluster Princess", "Alive", "Alien", "Female", Some(2)),
    (7, "Abradolf Lincler", UNKNOWN, "Human", "Male", Some(20)),
    (8, "Adjudicator Rick", "Dead", "Human", "Male", None),
    (9, "Agency Director", "Dead", "Human", "Male", Some(20)),
    (10, "Alan Rails", "Dead", "Human", "Male", None),
    (11, "Albert Einstein", "Dead", "Human", "Male", Some(1)),
    (12, "Alexander", "Dead", "Human", "Male", Some(1)),
    (13, "Alien Googah", UNKNOWN, "Alien", UNKNOWN, None),
    (14, "Alien Morty", UNKNOWN, "Alien", "Male", None),
    (15, "Alien Rick", UNKNOWN, "Alien", "Male", None),
];

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub origins: usize,
    pub characters: usize,
}

pub struct SeedService {
    writer: Arc<dyn CharactersWriteRepo>,
}

impl SeedService {
    pub fn new(writer: Arc<dyn CharactersWriteRepo>) -> Self {
        Self { writer }
    }

    /// Upsert the reference set. Running it twice leaves the same rows behind.
    pub async fn seed(&self) -> Result<SeedSummary, SeedError> {
        for (api_id, name) in ORIGINS {
            self.writer
                .upsert_origin(&OriginUpsert::new(*api_id, *name)?)
                .await?;
        }

        for record in reference_characters()? {
            let origin_id = match record.origin.as_ref() {
                Some(origin) => Some(self.writer.upsert_origin(origin).await?),
                None => None,
            };
            self.writer.upsert_character(&record, origin_id).await?;
        }

        let summary = SeedSummary {
            origins: ORIGINS.len(),
            characters: CHARACTERS.len(),
        };
        info!(
            target = "portal::seed",
            origins = summary.origins,
            characters = summary.characters,
            "Seeded reference data"
        );
        Ok(summary)
    }
}

fn reference_characters() -> Result<Vec<CharacterUpsert>, DomainError> {
    CHARACTERS
        .iter()
        .map(|(api_id, name, status, species, gender, origin)| {
            let origin_name = ORIGINS
                .iter()
                .find(|(id, _)| id == origin)
                .map(|(_, name)| *name)
                .unwrap_or(UNKNOWN);
            CharacterUpsert::new(
                *api_id,
                *name,
                *status,
                *species,
                *gender,
                Some(OriginUpsert::new(*origin, origin_name)?),
            )
        })
        .collect()
}
