//! Validated write shapes for characters and origins arriving from outside the store.

use crate::domain::error::DomainError;

pub const NAME_MAX_LEN: usize = 128;
pub const STATUS_MAX_LEN: usize = 64;
pub const SPECIES_MAX_LEN: usize = 128;
pub const GENDER_MAX_LEN: usize = 64;

/// An origin keyed by its upstream id; `api_id = None` targets the sentinel row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginUpsert {
    pub api_id: Option<i32>,
    pub name: String,
}

impl OriginUpsert {
    pub fn new(api_id: Option<i32>, name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        ensure_bounded("origin.name", &name, NAME_MAX_LEN)?;
        Ok(Self { api_id, name })
    }
}

/// A character keyed by its upstream id, with the origin still expressed upstream-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterUpsert {
    pub api_id: i32,
    pub name: String,
    pub status: String,
    pub species: String,
    pub gender: String,
    pub origin: Option<OriginUpsert>,
}

impl CharacterUpsert {
    pub fn new(
        api_id: i32,
        name: impl Into<String>,
        status: impl Into<String>,
        species: impl Into<String>,
        gender: impl Into<String>,
        origin: Option<OriginUpsert>,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        let status = status.into();
        let species = species.into();
        let gender = gender.into();

        ensure_bounded("character.name", &name, NAME_MAX_LEN)?;
        ensure_bounded("character.status", &status, STATUS_MAX_LEN)?;
        ensure_bounded("character.species", &species, SPECIES_MAX_LEN)?;
        ensure_bounded("character.gender", &gender, GENDER_MAX_LEN)?;

        Ok(Self {
            api_id,
            name,
            status,
            species,
            gender,
            origin,
        })
    }
}

fn ensure_bounded(field: &'static str, value: &str, max: usize) -> Result<(), DomainError> {
    let len = value.chars().count();
    if len > max {
        return Err(DomainError::validation(
            field,
            format!("{len} characters long, at most {max} allowed"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_values_within_column_limits() {
        let origin = OriginUpsert::new(Some(1), "Earth (C-137)").expect("valid origin");
        let character =
            CharacterUpsert::new(1, "Rick Sanchez", "Alive", "Human", "Male", Some(origin))
                .expect("valid character");

        assert_eq!(character.api_id, 1);
        assert_eq!(
            character.origin.as_ref().and_then(|o| o.api_id),
            Some(1)
        );
    }

    #[test]
    fn empty_strings_are_allowed() {
        let character =
            CharacterUpsert::new(7, "", "", "", "", None).expect("empty fields are valid");
        assert!(character.name.is_empty());
    }

    #[test]
    fn rejects_overlong_status() {
        let status = "a".repeat(STATUS_MAX_LEN + 1);
        let err = CharacterUpsert::new(1, "Rick", status, "Human", "Male", None)
            .expect_err("status too long");
        assert!(matches!(err, DomainError::Validation { .. }));
        assert_eq!(err.field(), "character.status");
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let name = "é".repeat(NAME_MAX_LEN);
        OriginUpsert::new(None, name).expect("multibyte name at the limit is valid");
    }
}
