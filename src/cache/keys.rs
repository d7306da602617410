//! Cache key derivation.
//!
//! Keys take the form `<prefix>[:<field>:<value>]*`. Fields appear in the
//! order the caller supplies them and absent values are skipped, so the same
//! logical query always lands on the same key.

use std::fmt::{self, Display};

use crate::application::repos::{CharacterFilter, PageWindow};

pub const CHARACTERS_PREFIX: &str = "characters";
pub const CHARACTER_PREFIX: &str = "character";
pub const CHARACTER_BY_API_ID_PREFIX: &str = "character:api";

/// Matches every key written for character lookups.
pub const CHARACTER_KEYS_PATTERN: &str = "character*";

/// Builder for a single cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    prefix: String,
    segments: Vec<String>,
}

impl CacheKey {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            segments: Vec::new(),
        }
    }

    /// Append `name:value` when a value is present. `0` and `""` are values.
    ///
    /// Values are written verbatim, so a value containing `:` can collide with
    /// a key built from more fields.
    pub fn param<V: Display>(mut self, name: &str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.segments.push(format!("{name}:{value}"));
        }
        self
    }

    pub fn finish(self) -> String {
        self.to_string()
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)?;
        for segment in &self.segments {
            write!(f, ":{segment}")?;
        }
        Ok(())
    }
}

pub fn characters_key(filter: &CharacterFilter, window: PageWindow) -> String {
    CacheKey::new(CHARACTERS_PREFIX)
        .param("name", filter.name.as_deref())
        .param("status", filter.status.as_deref())
        .param("species", filter.species.as_deref())
        .param("gender", filter.gender.as_deref())
        .param("origin_id", filter.origin_id)
        .param("limit", Some(window.limit))
        .param("offset", Some(window.offset))
        .finish()
}

pub fn character_key(id: i32) -> String {
    CacheKey::new(CHARACTER_PREFIX).param("id", Some(id)).finish()
}

pub fn character_by_api_id_key(api_id: i32) -> String {
    CacheKey::new(CHARACTER_BY_API_ID_PREFIX)
        .param("api_id", Some(api_id))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_params_collapse_to_prefix() {
        let key = CacheKey::new("characters")
            .param::<&str>("name", None)
            .param::<i32>("origin_id", None)
            .finish();
        assert_eq!(key, "characters");
    }

    #[test]
    fn zero_and_empty_string_are_rendered() {
        let key = CacheKey::new("characters")
            .param("name", Some(""))
            .param("limit", Some(0))
            .finish();
        assert_eq!(key, "characters:name::limit:0");
    }

    #[test]
    fn separators_inside_values_are_not_escaped() {
        let window = PageWindow {
            limit: 20,
            offset: 0,
        };
        let split = characters_key(
            &CharacterFilter {
                name: Some("Smith".into()),
                status: Some("Alive".into()),
                ..Default::default()
            },
            window,
        );
        let packed = characters_key(
            &CharacterFilter {
                name: Some("Smith:status:Alive".into()),
                ..Default::default()
            },
            window,
        );
        assert_eq!(split, packed);
    }

    #[test]
    fn caller_order_is_preserved() {
        let forward = CacheKey::new("p")
            .param("a", Some(1))
            .param("b", Some(2))
            .finish();
        let reversed = CacheKey::new("p")
            .param("b", Some(2))
            .param("a", Some(1))
            .finish();
        assert_eq!(forward, "p:a:1:b:2");
        assert_eq!(reversed, "p:b:2:a:1");
    }

    #[test]
    fn derivation_is_deterministic() {
        let filter = CharacterFilter {
            status: Some("Alive".to_string()),
            ..Default::default()
        };
        let first = characters_key(&filter, PageWindow::default());
        let second = characters_key(&filter.clone(), PageWindow::default());
        assert_eq!(first, second);
    }

    #[test]
    fn default_listing_key_includes_window() {
        let key = characters_key(&CharacterFilter::default(), PageWindow::default());
        assert_eq!(key, "characters:limit:20:offset:0");
    }

    #[test]
    fn listing_key_follows_fixed_field_order() {
        let filter = CharacterFilter {
            name: Some("Smith".to_string()),
            status: Some("Alive".to_string()),
            species: Some("Human".to_string()),
            gender: Some("Female".to_string()),
            origin_id: Some(1),
        };
        let key = characters_key(&filter, PageWindow { limit: 3, offset: 2 });
        insta::assert_snapshot!(
            key,
            @"characters:name:Smith:status:Alive:species:Human:gender:Female:origin_id:1:limit:3:offset:2"
        );
    }

    #[test]
    fn single_lookup_keys() {
        insta::assert_snapshot!(character_key(1), @"character:id:1");
        insta::assert_snapshot!(character_by_api_id_key(1), @"character:api:api_id:1");
    }
}
