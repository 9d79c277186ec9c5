//! Row type and CRUD/claim operations for the `downloads` table.

use super::{now_ts, Store};
use crate::error::DatabaseError;
use crate::types::DownloadId;
use crate::Error;

/// Raw row as stored in SQLite; [`crate::download::Download`] wraps this
/// with the state-machine methods from spec §4.4.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DownloadRow {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub status: i32,
    pub hash: Option<String>,
    pub locked_by: Option<String>,
    pub retries: i64,
    pub expire_at: Option<i64>,
}

impl Store {
    /// Insert a new Download, absorbing a duplicate `url` into the existing
    /// row's id (P7, §4.4 `create`).
    pub async fn insert_download(&self, name: &str, url: &str) -> crate::Result<DownloadId> {
        let result = sqlx::query("INSERT INTO downloads (url, name, status) VALUES (?, ?, 0)")
            .bind(url)
            .bind(name)
            .execute(self.pool())
            .await;

        match result {
            Ok(r) => Ok(DownloadId::new(r.last_insert_rowid())),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                let row: (i64,) = sqlx::query_as("SELECT id FROM downloads WHERE url = ?")
                    .bind(url)
                    .fetch_one(self.pool())
                    .await
                    .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
                Ok(DownloadId::new(row.0))
            }
            Err(e) => Err(Error::Database(DatabaseError::QueryFailed(e.to_string()))),
        }
    }

    /// Fetch a Download by id.
    pub async fn get_download(&self, id: DownloadId) -> crate::Result<Option<DownloadRow>> {
        sqlx::query_as("SELECT * FROM downloads WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))
    }

    /// All Download rows, for the read-only control surface (§6).
    pub async fn list_downloads(&self) -> crate::Result<Vec<DownloadRow>> {
        sqlx::query_as("SELECT * FROM downloads ORDER BY id ASC")
            .fetch_all(self.pool())
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))
    }

    /// `claim_pending_download` (§4.6): atomically lock one PENDING,
    /// unlocked Download for `worker_id`.
    pub async fn claim_pending_download(
        &self,
        worker_id: &str,
    ) -> crate::Result<Option<DownloadRow>> {
        sqlx::query_as(
            "UPDATE downloads SET locked_by = ?
             WHERE id = (
                 SELECT id FROM downloads
                 WHERE status = 0 AND (locked_by IS NULL OR locked_by = '')
                 ORDER BY id ASC
                 LIMIT 1
             )
             RETURNING *",
        )
        .bind(worker_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))
    }

    /// Clear `locked_by` without changing status (§4.6: "if a worker obtains
    /// a Download but fails to obtain an Account, it MUST unlock it").
    pub async fn unlock_download(&self, id: DownloadId) -> crate::Result<()> {
        sqlx::query("UPDATE downloads SET locked_by = NULL WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    /// `mark_as_processing` (§4.4).
    pub async fn mark_download_processing(&self, id: DownloadId, hash: &str) -> crate::Result<()> {
        sqlx::query(
            "UPDATE downloads SET status = 1, hash = ?, locked_by = NULL WHERE id = ?",
        )
        .bind(hash)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    /// `mark_as_pending` (§4.4).
    pub async fn mark_download_pending(&self, id: DownloadId) -> crate::Result<()> {
        sqlx::query(
            "UPDATE downloads SET status = 0, hash = NULL, locked_by = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    /// Increment `retries` by one, returning the new value (used by
    /// `mark_as_failed` to decide ERROR vs. back-to-PENDING).
    pub async fn increment_download_retries(&self, id: DownloadId) -> crate::Result<i64> {
        sqlx::query("UPDATE downloads SET retries = retries + 1 WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;

        let row: (i64,) = sqlx::query_as("SELECT retries FROM downloads WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(row.0)
    }

    /// `_stop_with_status` (§4.4): move to a terminal status, clear
    /// hash/locked_by, and set `expire_at` if a TTL is given (I5).
    pub async fn stop_download_with_status(
        &self,
        id: DownloadId,
        status: i32,
        expire_in: Option<std::time::Duration>,
    ) -> crate::Result<()> {
        let expire_at = expire_in.map(|d| now_ts() + d.as_secs() as i64);
        sqlx::query(
            "UPDATE downloads SET status = ?, hash = NULL, locked_by = NULL, expire_at = ? WHERE id = ?",
        )
        .bind(status)
        .bind(expire_at)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    /// Delete a Download row outright (successful upload completion, §4.5
    /// `mark_as_completed`).
    pub async fn delete_download(&self, id: DownloadId) -> crate::Result<()> {
        sqlx::query("DELETE FROM downloads WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    /// Sweep terminal Downloads whose TTL has elapsed (§4.3 step 5).
    pub async fn sweep_expired_downloads(&self) -> crate::Result<u64> {
        let result = sqlx::query("DELETE FROM downloads WHERE expire_at IS NOT NULL AND expire_at < ?")
            .bind(now_ts())
            .execute(self.pool())
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(result.rows_affected())
    }

    /// Reaper step 3/4: downloads stuck PENDING/PROCESSING whose lock
    /// references a dead or stale worker, or PROCESSING with no owning
    /// account, are reset to PENDING.
    pub async fn reclaim_orphaned_downloads(&self, stale_threshold: i64) -> crate::Result<u64> {
        let result = sqlx::query(
            "UPDATE downloads SET status = 0, locked_by = NULL
             WHERE status IN (0, 1)
               AND locked_by IS NOT NULL AND locked_by != ''
               AND locked_by NOT IN (
                   SELECT id FROM workers WHERE last_heartbeat >= ?
               )",
        )
        .bind(stale_threshold)
        .execute(self.pool())
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;

        let gap = sqlx::query(
            "UPDATE downloads SET status = 0, locked_by = NULL
             WHERE status = 1
               AND id NOT IN (SELECT download_id FROM accounts WHERE download_id IS NOT NULL)",
        )
        .execute(self.pool())
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;

        Ok(result.rows_affected() + gap.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn insert_absorbs_duplicate_url() {
        let store = Store::open_in_memory().await.unwrap();
        let a = store.insert_download("name-a", "magnet:?xt=urn:btih:ABC").await.unwrap();
        let b = store.insert_download("name-b", "magnet:?xt=urn:btih:ABC").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn claim_pending_download_locks_and_is_idempotent() {
        let store = Store::open_in_memory().await.unwrap();
        store.insert_download("x", "magnet:?xt=urn:btih:1").await.unwrap();

        let claimed = store.claim_pending_download("worker-a").await.unwrap();
        assert!(claimed.is_some());
        assert_eq!(claimed.unwrap().locked_by.as_deref(), Some("worker-a"));

        let none = store.claim_pending_download("worker-b").await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn retries_increment_monotonically() {
        let store = Store::open_in_memory().await.unwrap();
        let id = store.insert_download("x", "magnet:?xt=urn:btih:2").await.unwrap();
        assert_eq!(store.increment_download_retries(id).await.unwrap(), 1);
        assert_eq!(store.increment_download_retries(id).await.unwrap(), 2);
    }
}
