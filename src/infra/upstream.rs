//! GraphQL client for the public character API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::application::sync::{CharacterSource, SourceError, SourcePage};
use crate::domain::characters::{CharacterUpsert, OriginUpsert};

use super::error::InfraError;

const CHARACTERS_QUERY: &str = r#"
query GetCharacters($page: Int) {
  characters(page: $page) {
    info {
      next
    }
    results {
      id
      name
      status
      species
      gender
      origin {
        id
        name
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct CharactersData {
    characters: CharactersPage,
}

#[derive(Debug, Deserialize)]
struct CharactersPage {
    info: PageInfo,
    #[serde(default)]
    results: Vec<RemoteCharacter>,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    next: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RemoteCharacter {
    id: RemoteId,
    name: String,
    status: String,
    species: String,
    gender: String,
    origin: Option<RemoteOrigin>,
}

#[derive(Debug, Deserialize)]
struct RemoteOrigin {
    id: Option<RemoteId>,
    name: String,
}

/// GraphQL `ID` values arrive as strings; some mirrors send numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RemoteId {
    Number(i64),
    Text(String),
}

impl RemoteId {
    fn to_i32(&self) -> Result<i32, SourceError> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(text) => text
                .trim()
                .parse::<i64>()
                .map_err(|_| SourceError::InvalidRecord(format!("non-numeric id `{text}`")))?,
        };
        i32::try_from(value)
            .map_err(|_| SourceError::InvalidRecord(format!("id {value} out of range")))
    }
}

impl RemoteCharacter {
    fn into_upsert(self) -> Result<CharacterUpsert, SourceError> {
        let api_id = self.id.to_i32()?;
        let origin = match self.origin {
            Some(origin) => {
                let origin_api_id = origin.id.as_ref().map(RemoteId::to_i32).transpose()?;
                Some(
                    OriginUpsert::new(origin_api_id, origin.name)
                        .map_err(|err| SourceError::InvalidRecord(err.to_string()))?,
                )
            }
            None => None,
        };

        CharacterUpsert::new(
            api_id,
            self.name,
            self.status,
            self.species,
            self.gender,
            origin,
        )
        .map_err(|err| SourceError::InvalidRecord(format!("character {api_id}: {err}")))
    }
}

pub struct GraphQlCharacterSource {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl GraphQlCharacterSource {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }
}

#[async_trait]
impl CharacterSource for GraphQlCharacterSource {
    async fn fetch_page(&self, page: u32) -> Result<SourcePage, SourceError> {
        let body = serde_json::json!({
            "query": CHARACTERS_QUERY,
            "variables": { "page": page },
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| SourceError::Transport(err.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SourceError::Status {
                status: status.as_u16(),
            });
        }

        let payload = response
            .bytes()
            .await
            .map_err(|err| SourceError::Transport(err.to_string()))?;
        debug!(
            target = "portal::upstream",
            page,
            bytes = payload.len(),
            "Received upstream page"
        );
        decode_page(&payload)
    }
}

fn decode_page(payload: &[u8]) -> Result<SourcePage, SourceError> {
    let response: GraphQlResponse<CharactersData> = serde_json::from_slice(payload)
        .map_err(|err| SourceError::Transport(format!("malformed response: {err}")))?;

    if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
        let message = errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(SourceError::GraphQl(message));
    }

    let page = response.data.ok_or(SourceError::MissingData)?.characters;
    let records = page
        .results
        .into_iter()
        .map(RemoteCharacter::into_upsert)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SourcePage {
        records,
        has_next: page.info.next.is_some_and(|next| next != 0),
    })
}
