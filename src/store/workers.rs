//! Row type and operations for the `workers` table (heartbeat liveness).

use super::{now_ts, Store};
use crate::error::DatabaseError;
use crate::Error;

/// Raw row as stored in SQLite.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorkerRow {
    pub id: String,
    pub last_heartbeat: i64,
}

impl Store {
    /// Insert or refresh a worker's liveness row (§4.2 heartbeat tick).
    pub async fn upsert_heartbeat(&self, worker_id: &str) -> crate::Result<()> {
        sqlx::query(
            "INSERT INTO workers (id, last_heartbeat) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET last_heartbeat = excluded.last_heartbeat",
        )
        .bind(worker_id)
        .bind(now_ts())
        .execute(self.pool())
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    /// Delete a worker's liveness row (§4.2 clean stop).
    pub async fn delete_worker(&self, worker_id: &str) -> crate::Result<()> {
        sqlx::query("DELETE FROM workers WHERE id = ?")
            .bind(worker_id)
            .execute(self.pool())
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    /// Reaper step 1 (§4.3): delete every worker whose heartbeat is older
    /// than `stale_threshold` (a unix timestamp), returning the deleted ids
    /// so the caller can reconcile accounts/downloads locked by them.
    pub async fn delete_stale_workers(&self, stale_threshold: i64) -> crate::Result<Vec<String>> {
        let ids: Vec<(String,)> =
            sqlx::query_as("SELECT id FROM workers WHERE last_heartbeat < ?")
                .bind(stale_threshold)
                .fetch_all(self.pool())
                .await
                .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;

        if !ids.is_empty() {
            sqlx::query("DELETE FROM workers WHERE last_heartbeat < ?")
                .bind(stale_threshold)
                .execute(self.pool())
                .await
                .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        }

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}
