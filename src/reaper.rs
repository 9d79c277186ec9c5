//! Stale-lease reclamation (spec §4.3).
//!
//! Grounded on `original_source/rssbox/handlers/worker_handler.py`'s
//! `clean_stale_sonicbit_and_workers` (run every 40s via APScheduler): delete
//! workers whose heartbeat has gone stale, then reclaim any Account/Download
//! row still pointing at one of those dead workers. A fifth step, not
//! present in the original because Mongo TTL indexes handle it natively,
//! sweeps terminal Download rows whose `expire_at` has passed — SQLite has
//! no equivalent, so this crate does it here instead.

use crate::store::Store;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Periodically reclaims orphaned locks and expired terminal rows.
pub struct Reaper {
    store: Store,
    interval: Duration,
    stale_threshold: Duration,
}

impl Reaper {
    pub fn new(store: Store, interval: Duration, stale_threshold: Duration) -> Self {
        Self {
            store,
            interval,
            stale_threshold,
        }
    }

    /// Run one reclamation pass: delete stale workers, reclaim accounts,
    /// reclaim downloads, sweep expired terminal rows. Returns a summary for
    /// logging/testing.
    pub async fn sweep_once(&self) -> crate::Result<ReaperSummary> {
        let cutoff = crate::store::now_ts() - self.stale_threshold.as_secs() as i64;
        let stale_workers = self.store.delete_stale_workers(cutoff).await?;
        let accounts_reclaimed = self.store.reclaim_orphaned_accounts(cutoff).await?;
        let downloads_reclaimed = self.store.reclaim_orphaned_downloads(cutoff).await?;
        let downloads_expired = self.store.sweep_expired_downloads().await?;

        if !stale_workers.is_empty() || accounts_reclaimed > 0 || downloads_reclaimed > 0 || downloads_expired > 0
        {
            info!(
                stale_workers = stale_workers.len(),
                accounts_reclaimed,
                downloads_reclaimed,
                downloads_expired,
                "reaper pass reclaimed state"
            );
        } else {
            debug!("reaper pass found nothing to reclaim");
        }

        Ok(ReaperSummary {
            stale_workers,
            accounts_reclaimed,
            downloads_reclaimed,
            downloads_expired,
        })
    }

    /// Run the reaper loop until `cancel` fires. The teacher's background
    /// tasks all share this `interval.tick()` / `cancel.cancelled()` shape.
    pub async fn run(self, cancel: CancellationToken) {
        info!("reaper started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        warn!(error = %e, "reaper pass failed");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("reaper stopping");
                    break;
                }
            }
        }
    }
}

/// Result of one `Reaper::sweep_once` pass.
#[derive(Debug, Default, Clone)]
pub struct ReaperSummary {
    pub stale_workers: Vec<String>,
    pub accounts_reclaimed: u64,
    pub downloads_reclaimed: u64,
    pub downloads_expired: u64,
}
