//! Background sweep of expired session records.

use std::sync::Arc;
use std::time::Duration;

use sesame_util_error::FmtCompact as _;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::{LOG_TARGET, RedbStore};

pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Spawn a task that calls [`RedbStore::evict_expired`] every `period`.
///
/// The returned handle aborts the task when asked to; dropping it leaves the
/// task running.
pub fn spawn_cleanup_task(store: Arc<RedbStore>, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);

        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match store.evict_expired().await {
                Ok(0) => {
                    debug!(target: LOG_TARGET, "Session cleanup: nothing expired");
                }
                Ok(evicted) => {
                    info!(target: LOG_TARGET, evicted, "Session cleanup completed");
                }
                Err(err) => {
                    warn!(target: LOG_TARGET, err = %err.fmt_compact(), "Session cleanup failed");
                }
            }

            match store.record_count().await {
                Ok(count) => {
                    debug!(target: LOG_TARGET, records = count, "Session store status");
                }
                Err(err) => {
                    debug!(target: LOG_TARGET, err = %err.fmt_compact(), "Failed to count session records");
                }
            }
        }
    })
}
