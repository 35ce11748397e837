//! Redb-based store for sesame sessions.
//!
//! Keeps session data in a single-file embedded database so sessions survive
//! server restarts. Each record carries its own expiry; expired records read
//! as missing and are removed by [`RedbStore::evict_expired`], which
//! [`spawn_cleanup_task`] runs periodically.
//!
//! # Example
//!
//! ```ignore
//! use sesame_store_redb::{RedbStore, spawn_cleanup_task};
//! use std::sync::Arc;
//!
//! let store = Arc::new(RedbStore::open("sessions.redb").await?);
//! let cleanup = spawn_cleanup_task(store.clone(), DEFAULT_CLEANUP_INTERVAL);
//! ```

mod cleanup;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bincode::{Decode, Encode};
use redb_bincode::{ReadableTable as _, TableDefinition};
use sesame_core::SessionId;
use sesame_store::{SessionStore, StoreError, StoreLookup, StoreResult, ensure_valid_ttl};
use snafu::{ResultExt as _, Snafu};
use time::{Duration, OffsetDateTime};
use tokio::task::JoinError;
use tracing::{debug, trace};

pub use self::cleanup::{DEFAULT_CLEANUP_INTERVAL, spawn_cleanup_task};

const LOG_TARGET: &str = "sesame::store::redb";

/// Session record as stored in redb.
#[derive(Debug, Clone, Encode, Decode)]
struct StoredSession {
    /// Encoded session attributes
    data: Vec<u8>,
    /// Expiry as Unix timestamp (milliseconds since epoch)
    expiry_unix_ms: i64,
}

impl StoredSession {
    fn is_expired_at(&self, now_unix_ms: i64) -> bool {
        self.expiry_unix_ms <= now_unix_ms
    }
}

fn now_unix_ms() -> i64 {
    i64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000)
        .unwrap_or(i64::MAX)
}

/// `ttl` in whole milliseconds, rounded up so a short TTL never becomes zero.
fn ttl_millis(ttl: std::time::Duration) -> i64 {
    let millis = ttl.as_millis() + u128::from(ttl.subsec_nanos() % 1_000_000 != 0);
    i64::try_from(millis).unwrap_or(i64::MAX)
}

/// Key: session id string
const SESSIONS_TABLE: TableDefinition<String, StoredSession> =
    TableDefinition::new("sesame_store_redb::sessions");

#[derive(Debug, Snafu)]
pub enum RedbStoreError {
    #[snafu(transparent)]
    Database { source: redb::DatabaseError },
    #[snafu(transparent)]
    Transaction { source: redb::TransactionError },
    #[snafu(transparent)]
    Table { source: redb::TableError },
    #[snafu(transparent)]
    Storage { source: redb::StorageError },
    #[snafu(transparent)]
    Commit { source: redb::CommitError },
    Join { source: JoinError },
}
pub type RedbStoreResult<T> = std::result::Result<T, RedbStoreError>;

impl From<RedbStoreError> for StoreError {
    fn from(err: RedbStoreError) -> Self {
        StoreError::unavailable(err)
    }
}

#[derive(Debug, Clone)]
pub struct RedbStore {
    db: Arc<redb_bincode::Database>,
}

impl RedbStore {
    /// Open (or create) the database file at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> RedbStoreResult<Self> {
        let path = path.into();
        debug!(target: LOG_TARGET, path = %path.display(), "Opening session database");
        let db = tokio::task::spawn_blocking(move || redb_bincode::Database::create(path))
            .await
            .context(JoinSnafu)??;

        Self::new(Arc::new(db)).await
    }

    /// Create a store on an existing database, creating the sessions table
    /// if needed.
    pub async fn new(db: Arc<redb_bincode::Database>) -> RedbStoreResult<Self> {
        let store = Self { db };
        store
            .blocking(|db| {
                let write_txn = db.begin_write()?;
                // Opening the table in a write transaction ensures it exists
                let _ = write_txn.open_table(&SESSIONS_TABLE)?;
                write_txn.commit()?;
                Ok(())
            })
            .await?;
        Ok(store)
    }

    async fn blocking<T>(
        &self,
        f: impl FnOnce(&redb_bincode::Database) -> RedbStoreResult<T> + Send + 'static,
    ) -> RedbStoreResult<T>
    where
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .context(JoinSnafu)?
    }

    async fn insert(&self, key: String, stored: StoredSession) -> RedbStoreResult<()> {
        self.blocking(move |db| {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(&SESSIONS_TABLE)?;
                table.insert(&key, &stored)?;
            }
            write_txn.commit()?;
            Ok(())
        })
        .await
    }

    /// Remove every expired record. Returns how many were removed.
    pub async fn evict_expired(&self) -> RedbStoreResult<usize> {
        let now = now_unix_ms();
        self.blocking(move |db| {
            let write_txn = db.begin_write()?;
            let evicted = {
                let mut table = write_txn.open_table(&SESSIONS_TABLE)?;

                let mut expired = vec![];
                for record in table.range(..)? {
                    let (k, v) = record?;
                    if v.value().is_expired_at(now) {
                        expired.push(k.value());
                    }
                }

                for key in &expired {
                    table.remove(key)?;
                }
                expired.len()
            };
            write_txn.commit()?;
            Ok(evicted)
        })
        .await
    }

    /// Number of records, expired or not.
    pub async fn record_count(&self) -> RedbStoreResult<usize> {
        self.blocking(|db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(&SESSIONS_TABLE)?;
            let mut count = 0;
            for record in table.range(..)? {
                record?;
                count += 1;
            }
            Ok(count)
        })
        .await
    }
}

#[async_trait]
impl SessionStore for RedbStore {
    async fn put(&self, id: &SessionId, data: Vec<u8>, ttl: Duration) -> StoreResult<()> {
        let ttl = ensure_valid_ttl(ttl)?;
        let stored = StoredSession {
            data,
            expiry_unix_ms: now_unix_ms().saturating_add(ttl_millis(ttl)),
        };
        trace!(target: LOG_TARGET, session_id = ?id, expiry_unix_ms = stored.expiry_unix_ms, "put");

        Ok(self.insert(id.as_str().to_owned(), stored).await?)
    }

    async fn get(&self, id: &SessionId) -> StoreResult<StoreLookup> {
        let key = id.as_str().to_owned();
        let now = now_unix_ms();

        Ok(self
            .blocking(move |db| {
                let read_txn = db.begin_read()?;
                let table = read_txn.open_table(&SESSIONS_TABLE)?;

                let Some(stored) = table.get(&key)?.map(|g| g.value()) else {
                    return Ok(StoreLookup::NotFound);
                };

                if stored.is_expired_at(now) {
                    return Ok(StoreLookup::NotFound);
                }

                Ok(StoreLookup::Found(stored.data))
            })
            .await?)
    }

    async fn delete(&self, id: &SessionId) -> StoreResult<()> {
        let key = id.as_str().to_owned();
        trace!(target: LOG_TARGET, session_id = ?id, "delete");

        Ok(self
            .blocking(move |db| {
                let write_txn = db.begin_write()?;
                {
                    let mut table = write_txn.open_table(&SESSIONS_TABLE)?;
                    table.remove(&key)?;
                }
                write_txn.commit()?;
                Ok(())
            })
            .await?)
    }
}
