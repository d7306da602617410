mod sync_characters;

pub use sync_characters::{SyncCharactersContext, SyncCharactersJob, process_sync_characters_job};
