//! Row type and CRUD/claim operations for the `accounts` table.

use super::{now_ts, Store};
use crate::error::DatabaseError;
use crate::types::DownloadId;
use crate::Error;

/// Raw row as stored in SQLite; [`crate::account::Account`] wraps this with
/// the state-machine methods from spec §4.5.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub id: String,
    pub password: String,
    pub token: Option<String>,
    pub priority: i64,
    pub status: i32,
    pub download_id: Option<i64>,
    pub locked_by: Option<String>,
    pub added_at: Option<i64>,
    pub last_checked_at: Option<i64>,
    pub last_used_at: Option<i64>,
}

impl Store {
    /// Provision an account out-of-band (admin operation; accounts are
    /// long-lived per §3 "Lifecycle").
    pub async fn upsert_account(
        &self,
        id: &str,
        password: &str,
        priority: i64,
    ) -> crate::Result<()> {
        sqlx::query(
            "INSERT INTO accounts (id, password, priority, status) VALUES (?, ?, ?, 0)
             ON CONFLICT(id) DO UPDATE SET password = excluded.password, priority = excluded.priority",
        )
        .bind(id)
        .bind(password)
        .bind(priority)
        .execute(self.pool())
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    /// Persist a refreshed auth token (`TokenHandler::write`, §6).
    pub async fn set_account_token(&self, id: &str, token: &str) -> crate::Result<()> {
        sqlx::query("UPDATE accounts SET token = ? WHERE id = ?")
            .bind(token)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    /// Fetch an account row by id.
    pub async fn get_account(&self, id: &str) -> crate::Result<Option<AccountRow>> {
        sqlx::query_as("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))
    }

    /// All Account rows, for the read-only control surface (§6).
    pub async fn list_accounts(&self) -> crate::Result<Vec<AccountRow>> {
        sqlx::query_as("SELECT * FROM accounts ORDER BY id ASC")
            .fetch_all(self.pool())
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))
    }

    /// `claim_free_account` (§4.6): atomically claim the highest-priority,
    /// least-recently-used IDLE account.
    pub async fn claim_free_account(&self, worker_id: &str) -> crate::Result<Option<AccountRow>> {
        sqlx::query_as(
            "UPDATE accounts SET status = 1, locked_by = ?, last_used_at = ?
             WHERE id = (
                 SELECT id FROM accounts
                 WHERE status = 0
                 ORDER BY priority DESC, last_used_at ASC
                 LIMIT 1
             )
             RETURNING *",
        )
        .bind(worker_id)
        .bind(now_ts())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))
    }

    /// `claim_downloading_account_to_check` (§4.6): atomically lock the
    /// longest-unchecked DOWNLOADING account for polling.
    pub async fn claim_downloading_account_to_check(
        &self,
        worker_id: &str,
    ) -> crate::Result<Option<AccountRow>> {
        sqlx::query_as(
            "UPDATE accounts SET status = 3, locked_by = ?, last_checked_at = ?
             WHERE id = (
                 SELECT id FROM accounts
                 WHERE status = 2 AND (locked_by IS NULL OR locked_by = '')
                 ORDER BY last_checked_at ASC
                 LIMIT 1
             )
             RETURNING *",
        )
        .bind(worker_id)
        .bind(now_ts())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))
    }

    /// `mark_as_downloading` (§4.5), Account half of the transactional pair.
    /// Download half (`mark_as_processing`) must be written first by the
    /// caller inside the same transaction — see [`crate::account::Account::mark_as_downloading`].
    pub async fn mark_account_downloading(
        &self,
        id: &str,
        download_id: DownloadId,
    ) -> crate::Result<()> {
        sqlx::query(
            "UPDATE accounts SET status = 2, added_at = ?, download_id = ?, locked_by = NULL WHERE id = ?",
        )
        .bind(now_ts())
        .bind(download_id)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    /// `mark_as_idle` (§4.5).
    pub async fn mark_account_idle(&self, id: &str) -> crate::Result<()> {
        sqlx::query(
            "UPDATE accounts SET status = 0, added_at = NULL, download_id = NULL, locked_by = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    /// `mark_as_uploading` (§4.5).
    pub async fn mark_account_uploading(&self, id: &str, worker_id: &str) -> crate::Result<()> {
        sqlx::query("UPDATE accounts SET status = 4, locked_by = ? WHERE id = ?")
            .bind(worker_id)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    /// `unlock(status)` (§4.5): release the lock and set an explicit status
    /// (used to return a LOCKED account to DOWNLOADING).
    pub async fn unlock_account(&self, id: &str, status: i32) -> crate::Result<()> {
        sqlx::query("UPDATE accounts SET status = ?, locked_by = NULL WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    /// `checked()` (§4.5).
    pub async fn touch_account_checked(&self, id: &str) -> crate::Result<()> {
        sqlx::query("UPDATE accounts SET last_checked_at = ? WHERE id = ?")
            .bind(now_ts())
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    /// Set `added_at` to now if it is currently null, returning the
    /// resulting value. Backing primitive for [`crate::account::Account::ensure_started`]
    /// (see §9 Open Question c — the lazily-initialising getter is not
    /// preserved; this explicit call replaces it at the one site that needs it).
    pub async fn ensure_account_added_at(&self, id: &str) -> crate::Result<i64> {
        sqlx::query("UPDATE accounts SET added_at = COALESCE(added_at, ?) WHERE id = ?")
            .bind(now_ts())
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;

        let row: (i64,) = sqlx::query_as("SELECT added_at FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(row.0)
    }

    /// Reaper step 2 (§4.3): accounts held by a dead or stale worker are
    /// unwound — LOCKED/UPLOADING collapse to DOWNLOADING, PROCESSING
    /// collapses to IDLE.
    pub async fn reclaim_orphaned_accounts(&self, stale_threshold: i64) -> crate::Result<u64> {
        let locked_or_uploading = sqlx::query(
            "UPDATE accounts SET status = 2, locked_by = NULL
             WHERE status IN (3, 4)
               AND (locked_by IS NULL OR locked_by = '' OR locked_by NOT IN (
                   SELECT id FROM workers WHERE last_heartbeat >= ?
               ))",
        )
        .bind(stale_threshold)
        .execute(self.pool())
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;

        let processing = sqlx::query(
            "UPDATE accounts SET status = 0, locked_by = NULL
             WHERE status = 1
               AND (locked_by IS NULL OR locked_by = '' OR locked_by NOT IN (
                   SELECT id FROM workers WHERE last_heartbeat >= ?
               ))",
        )
        .bind(stale_threshold)
        .execute(self.pool())
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;

        Ok(locked_or_uploading.rows_affected() + processing.rows_affected())
    }
}
