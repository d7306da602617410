use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Lock an in-process cache mutex, recovering the inner state if a previous
/// holder panicked.
pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    source: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        warn!(
            target = "portal::cache",
            op,
            source,
            result = "poisoned_recovered",
            "Recovered from poisoned cache lock"
        );
        poisoned.into_inner()
    })
}
