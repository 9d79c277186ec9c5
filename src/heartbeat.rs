//! Worker liveness (spec §4.2): a periodic upsert of this worker's row,
//! read by the Reaper to decide which locks are orphaned.
//!
//! Grounded on the teacher's background-task loop shape
//! (`downloader/background_tasks.rs`'s `tokio::select!` over an interval
//! tick and a `CancellationToken`) and on `original_source/rssbox`'s use of
//! a context manager (`with self.heartbeat:`) to bracket a run — here
//! expressed as upsert-on-start plus delete-on-drop via an explicit `stop`.

use crate::store::Store;
use crate::types::WorkerId;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Periodically records that `worker_id` is alive.
pub struct Heartbeat {
    store: Store,
    worker_id: WorkerId,
    interval: Duration,
}

impl Heartbeat {
    pub fn new(store: Store, worker_id: WorkerId, interval: Duration) -> Self {
        Self {
            store,
            worker_id,
            interval,
        }
    }

    /// Record one heartbeat immediately. Called at startup so a freshly
    /// spawned worker is visible to the Reaper before the first tick.
    pub async fn beat_once(&self) -> crate::Result<()> {
        self.store.upsert_heartbeat(self.worker_id.as_str()).await
    }

    /// Run the heartbeat loop until `cancel` fires, then delete this
    /// worker's row so the Reaper reclaims its locks promptly rather than
    /// waiting out the stale-lease threshold.
    pub async fn run(self, cancel: CancellationToken) {
        info!(worker_id = %self.worker_id, "heartbeat started");
        if let Err(e) = self.beat_once().await {
            warn!(error = %e, "initial heartbeat failed");
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // first tick fires immediately; skip it, we already beat above

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.store.upsert_heartbeat(self.worker_id.as_str()).await {
                        warn!(error = %e, "heartbeat upsert failed");
                    } else {
                        debug!(worker_id = %self.worker_id, "heartbeat recorded");
                    }
                }
                _ = cancel.cancelled() => {
                    info!(worker_id = %self.worker_id, "heartbeat stopping");
                    break;
                }
            }
        }

        if let Err(e) = self.store.delete_worker(self.worker_id.as_str()).await {
            warn!(error = %e, "failed to remove heartbeat row on shutdown");
        }
    }
}
