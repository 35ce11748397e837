//! Store adapter: the narrow key/value interface sessions are persisted
//! through.
//!
//! Backends must be safe to share between concurrently running requests.
//! They provide no locking across a `get` and a later `put`, so two requests
//! writing the same id race and the last `put` wins.

mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sesame_core::SessionId;
use sesame_util_error::BoxedError;
use snafu::{Snafu, ensure};
use time::Duration;

pub use self::memory::{MemoryStore, spawn_memory_cleanup_task};

pub const LOG_TARGET: &str = "sesame::store";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(display("TTL must be positive and bounded, got {ttl}"))]
    InvalidTtl { ttl: Duration },
    #[snafu(display("Session store unavailable"))]
    Unavailable { source: BoxedError },
}
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn unavailable(source: impl Into<BoxedError>) -> Self {
        Self::Unavailable {
            source: source.into(),
        }
    }
}

/// Outcome of a successful lookup.
///
/// A missing entry is a normal result, kept apart from
/// [`StoreError::Unavailable`] which means the store could not answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLookup {
    Found(Vec<u8>),
    NotFound,
}

#[async_trait]
pub trait SessionStore: fmt::Debug + Send + Sync + 'static {
    /// Insert or overwrite the entry for `id`, expiring after `ttl`.
    async fn put(&self, id: &SessionId, data: Vec<u8>, ttl: Duration) -> StoreResult<()>;

    async fn get(&self, id: &SessionId) -> StoreResult<StoreLookup>;

    /// Remove the entry for `id`. Removing a missing entry succeeds.
    async fn delete(&self, id: &SessionId) -> StoreResult<()>;
}

pub type SharedStore = Arc<dyn SessionStore>;

/// Reject TTLs that would mean "never expire" or "already expired".
pub fn ensure_valid_ttl(ttl: Duration) -> StoreResult<std::time::Duration> {
    ensure!(ttl.is_positive(), InvalidTtlSnafu { ttl });
    Ok(ttl.unsigned_abs())
}
