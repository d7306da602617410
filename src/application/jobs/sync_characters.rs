//! Cron job that refreshes characters from the upstream API.

use std::sync::Arc;

use apalis::prelude::*;

use crate::application::sync::{CharacterSyncService, SyncOutcome};

/// Marker struct for the cron-triggered sync job.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct SyncCharactersJob;

impl From<chrono::DateTime<chrono::Utc>> for SyncCharactersJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

#[derive(Clone)]
pub struct SyncCharactersContext {
    pub sync: Arc<CharacterSyncService>,
}

/// Run one sync pass. Failures are logged by the service and never fail the worker,
/// so the next tick runs as scheduled.
pub async fn process_sync_characters_job(
    _job: SyncCharactersJob,
    ctx: Data<SyncCharactersContext>,
) -> Result<(), apalis::prelude::Error> {
    match ctx.sync.run().await {
        Ok(SyncOutcome::Completed(summary)) => {
            tracing::debug!(
                target = "portal::sync",
                records = summary.records,
                pages = summary.pages,
                "Scheduled sync finished"
            );
        }
        Ok(SyncOutcome::Skipped) => {}
        Err(err) => {
            tracing::debug!(
                target = "portal::sync",
                error = %err,
                "Scheduled sync failed, waiting for next tick"
            );
        }
    }
    Ok(())
}
