mod support;

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use portal::application::repos::RepoError;
use portal::application::sync::{
    CharacterSource, CharacterSyncService, SourceError, SourcePage, SyncError, SyncOutcome,
    SyncState,
};
use portal::cache::{CacheStore, MemoryCacheStore};
use portal::domain::characters::{CharacterUpsert, OriginUpsert};
use tokio::sync::{Mutex, Notify};

use support::FakeWriteRepo;

fn remote(api_id: i32, name: &str, origin: Option<(Option<i32>, &str)>) -> CharacterUpsert {
    let origin = origin.map(|(id, name)| OriginUpsert::new(id, name).expect("valid origin"));
    CharacterUpsert::new(api_id, name, "Alive", "Human", "Male", origin).expect("valid character")
}

/// Serves canned pages and records which pages were requested.
struct ScriptedSource {
    pages: HashMap<u32, Result<SourcePage, String>>,
    requested: Mutex<Vec<u32>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedSource {
    fn new(pages: Vec<(u32, Result<SourcePage, String>)>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
            requested: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl CharacterSource for ScriptedSource {
    async fn fetch_page(&self, page: u32) -> Result<SourcePage, SourceError> {
        self.requested.lock().await.push(page);
        if let Some(gate) = self.gate.as_ref() {
            gate.notified().await;
        }
        match self.pages.get(&page) {
            Some(Ok(page)) => Ok(page.clone()),
            Some(Err(message)) => Err(SourceError::Transport(message.clone())),
            None => Err(SourceError::MissingData),
        }
    }
}

fn two_pages() -> Vec<(u32, Result<SourcePage, String>)> {
    vec![
        (
            1,
            Ok(SourcePage {
                records: vec![
                    remote(1, "Rick Sanchez", Some((Some(1), "Earth (C-137)"))),
                    remote(2, "Morty Smith", Some((None, "unknown"))),
                ],
                has_next: true,
            }),
        ),
        (
            2,
            Ok(SourcePage {
                records: vec![remote(3, "Summer Smith", Some((Some(20), "Earth (Replacement Dimension)")))],
                has_next: false,
            }),
        ),
    ]
}

#[tokio::test]
async fn pages_until_upstream_reports_no_next() {
    let source = Arc::new(ScriptedSource::new(two_pages()));
    let writer = Arc::new(FakeWriteRepo::default());
    let service = CharacterSyncService::new(source.clone(), writer.clone());

    let outcome = service.run().await.expect("sync succeeds");

    let SyncOutcome::Completed(summary) = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(summary.records, 3);
    assert_eq!(summary.pages, 2);
    assert_eq!(*source.requested.lock().await, vec![1, 2]);
    assert_eq!(writer.characters.lock().await.len(), 3);
    assert_eq!(service.last_run().await, Some(summary));
    assert_eq!(service.state(), SyncState::Idle);
}

#[tokio::test]
async fn repeated_runs_are_idempotent() {
    let source = Arc::new(ScriptedSource::new(two_pages()));
    let writer = Arc::new(FakeWriteRepo::default());
    let service = CharacterSyncService::new(source, writer.clone());

    service.run().await.expect("first run");
    let origins_after_first = writer.origins.lock().await.clone();
    let characters_after_first = writer.characters.lock().await.clone();

    service.run().await.expect("second run");
    assert_eq!(*writer.origins.lock().await, origins_after_first);
    assert_eq!(*writer.characters.lock().await, characters_after_first);
}

#[tokio::test]
async fn characters_link_to_their_upserted_origin() {
    let source = Arc::new(ScriptedSource::new(vec![(
        1,
        Ok(SourcePage {
            records: vec![remote(42, "Squanchy", Some((Some(5), "X")))],
            has_next: false,
        }),
    )]));
    let writer = Arc::new(FakeWriteRepo::default());
    let service = CharacterSyncService::new(source, writer.clone());

    service.run().await.expect("sync succeeds");

    let origins = writer.origins.lock().await;
    let origin = origins
        .iter()
        .find(|o| o.api_id == Some(5))
        .expect("origin created");
    assert_eq!(origin.name, "X");

    let characters = writer.characters.lock().await;
    assert_eq!(characters[0].api_id, 42);
    assert_eq!(characters[0].origin_id, Some(origin.id));
}

#[tokio::test]
async fn character_without_origin_gets_null_link() {
    let source = Arc::new(ScriptedSource::new(vec![(
        1,
        Ok(SourcePage {
            records: vec![remote(7, "Mr. Meeseeks", None)],
            has_next: false,
        }),
    )]));
    let writer = Arc::new(FakeWriteRepo::default());
    let service = CharacterSyncService::new(source, writer.clone());

    service.run().await.expect("sync succeeds");

    assert!(writer.origins.lock().await.is_empty());
    assert_eq!(writer.characters.lock().await[0].origin_id, None);
}

#[tokio::test]
async fn upstream_failure_aborts_run_before_any_write() {
    let source = Arc::new(ScriptedSource::new(vec![
        (
            1,
            Ok(SourcePage {
                records: vec![remote(1, "Rick Sanchez", None)],
                has_next: true,
            }),
        ),
        (2, Err("connection reset".to_string())),
    ]));
    let writer = Arc::new(FakeWriteRepo::default());
    let service = CharacterSyncService::new(source, writer.clone());

    let err = service.run().await.expect_err("run fails");

    assert!(matches!(err, SyncError::Fetch { page: 2, .. }));
    assert!(writer.characters.lock().await.is_empty());
    assert_eq!(service.last_run().await, None);
    assert_eq!(service.state(), SyncState::Idle);
}

#[tokio::test]
async fn write_failure_keeps_earlier_upserts() {
    let source = Arc::new(ScriptedSource::new(two_pages()));
    let writer = Arc::new(FakeWriteRepo::failing_on_character_upsert(3));
    let service = CharacterSyncService::new(source, writer.clone());

    let err = service.run().await.expect_err("run fails");

    assert!(matches!(
        err,
        SyncError::Character {
            api_id: 3,
            source: RepoError::Timeout
        }
    ));
    let stored: Vec<i32> = writer
        .characters
        .lock()
        .await
        .iter()
        .map(|c| c.api_id)
        .collect();
    assert_eq!(stored, vec![1, 2]);
    assert_eq!(service.last_run().await, None);
    assert_eq!(service.state(), SyncState::Idle);
}

#[tokio::test]
async fn overlapping_tick_is_skipped() {
    let gate = Arc::new(Notify::new());
    let source = Arc::new(
        ScriptedSource::new(vec![(
            1,
            Ok(SourcePage {
                records: vec![remote(1, "Rick Sanchez", None)],
                has_next: false,
            }),
        )])
        .gated(gate.clone()),
    );
    let writer = Arc::new(FakeWriteRepo::default());
    let service = CharacterSyncService::new(source.clone(), writer);

    let first = {
        let service = service.clone();
        tokio::spawn(async move { service.run().await })
    };

    while source.requested.lock().await.is_empty() {
        tokio::task::yield_now().await;
    }
    assert_eq!(service.state(), SyncState::Running);

    let second = service.run().await.expect("overlapping run");
    assert_eq!(second, SyncOutcome::Skipped);

    gate.notify_one();
    let first = first.await.expect("join").expect("first run");
    assert!(matches!(first, SyncOutcome::Completed(_)));
    assert_eq!(*source.requested.lock().await, vec![1]);
}

#[tokio::test]
async fn invalidation_clears_character_keys_after_success() {
    let cache = Arc::new(MemoryCacheStore::new(
        NonZeroUsize::new(16).expect("non-zero"),
        Duration::from_secs(60),
    ));
    for key in ["characters:limit:20:offset:0", "character:id:1", "origins:all"] {
        assert!(cache.set(key, Bytes::from_static(b"[]"), None).await);
    }

    let source = Arc::new(ScriptedSource::new(two_pages()));
    let writer = Arc::new(FakeWriteRepo::default());
    let service =
        CharacterSyncService::new(source, writer).with_cache_invalidation(cache.clone());

    service.run().await.expect("sync succeeds");

    assert!(cache.get("characters:limit:20:offset:0").await.is_none());
    assert!(cache.get("character:id:1").await.is_none());
    assert!(cache.get("origins:all").await.is_some());
}
