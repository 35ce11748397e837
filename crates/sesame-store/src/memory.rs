use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sesame_core::SessionId;
use snafu::OptionExt as _;
use time::Duration;
use tokio::time::{Instant, interval};
use tracing::{debug, info, trace};

use crate::{
    InvalidTtlSnafu, LOG_TARGET, SessionStore, StoreLookup, StoreResult, ensure_valid_ttl,
};

#[derive(Debug)]
struct Entry {
    data: Vec<u8>,
    expires_at: Instant,
}

/// Process-local store.
///
/// An expired entry is dropped when it is next read, or by
/// [`MemoryStore::evict_expired`], which [`spawn_memory_cleanup_task`] runs
/// periodically.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<SessionId, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries that have not expired yet.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .expect("Locking failed")
            .values()
            .filter(|e| now < e.expires_at)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries held, expired or not.
    pub fn entry_count(&self) -> usize {
        self.entries.lock().expect("Locking failed").len()
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("Locking failed");
        let before = entries.len();
        entries.retain(|_, e| now < e.expires_at);
        before - entries.len()
    }
}

/// Spawn a task that calls [`MemoryStore::evict_expired`] every `period`.
///
/// The returned handle aborts the task when asked to; dropping it leaves the
/// task running.
pub fn spawn_memory_cleanup_task(
    store: Arc<MemoryStore>,
    period: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);

        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match store.evict_expired() {
                0 => {
                    debug!(target: LOG_TARGET, "Session cleanup: nothing expired");
                }
                evicted => {
                    info!(target: LOG_TARGET, evicted, "Session cleanup completed");
                }
            }
        }
    })
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn put(&self, id: &SessionId, data: Vec<u8>, ttl: Duration) -> StoreResult<()> {
        let expires_at = Instant::now()
            .checked_add(ensure_valid_ttl(ttl)?)
            .context(InvalidTtlSnafu { ttl })?;

        trace!(target: LOG_TARGET, session_id = ?id, %ttl, "put");
        self.entries
            .lock()
            .expect("Locking failed")
            .insert(id.clone(), Entry { data, expires_at });
        Ok(())
    }

    async fn get(&self, id: &SessionId) -> StoreResult<StoreLookup> {
        let mut entries = self.entries.lock().expect("Locking failed");

        let Some(entry) = entries.get(id) else {
            return Ok(StoreLookup::NotFound);
        };

        if entry.expires_at <= Instant::now() {
            entries.remove(id);
            return Ok(StoreLookup::NotFound);
        }

        Ok(StoreLookup::Found(entry.data.clone()))
    }

    async fn delete(&self, id: &SessionId) -> StoreResult<()> {
        trace!(target: LOG_TARGET, session_id = ?id, "delete");
        self.entries.lock().expect("Locking failed").remove(id);
        Ok(())
    }
}
