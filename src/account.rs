//! Account entity and its state machine (spec §4.5).
//!
//! Grounded on `original_source/rssbox/modules/sonicbit.py`. Two-row
//! transitions that pair an Account write with a Download write
//! (`mark_as_downloading`, `mark_as_failed`, `mark_as_completed`, `reset`)
//! run inside one `sqlx::Transaction`, Download first then Account, per §9
//! "Sessions/transactions" — so a crash between them leaves the reaper's
//! step 4 as the only inconsistency window.

use crate::download::Download;
use crate::error::DatabaseError;
use crate::store::{AccountRow, Store};
use crate::types::{AccountStatus, DownloadId};
use crate::Error;
use regex::Regex;
use std::time::Duration;

/// A seedbox credential pool entry; the unit of concurrency for remote
/// downloads.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub token: Option<String>,
    pub priority: i64,
    pub status: AccountStatus,
    pub download_id: Option<DownloadId>,
    pub locked_by: Option<String>,
    pub added_at: Option<i64>,
    pub last_checked_at: Option<i64>,
    pub last_used_at: Option<i64>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            token: row.token,
            priority: row.priority,
            status: AccountStatus::from_i32(row.status),
            download_id: row.download_id.map(DownloadId::new),
            locked_by: row.locked_by,
            added_at: row.added_at,
            last_checked_at: row.last_checked_at,
            last_used_at: row.last_used_at,
        }
    }
}

impl Account {
    /// Look up an account by id.
    pub async fn get(store: &Store, id: &str) -> crate::Result<Option<Account>> {
        Ok(store.get_account(id).await?.map(Into::into))
    }

    /// `mark_as_downloading(download, hash)` (§4.5): the Download and
    /// Account halves of the pair, in one transaction.
    pub async fn mark_as_downloading(
        store: &Store,
        account_id: &str,
        download_id: DownloadId,
        hash: &str,
    ) -> crate::Result<()> {
        let mut tx = store
            .pool()
            .begin()
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;

        sqlx::query("UPDATE downloads SET status = 1, hash = ?, locked_by = NULL WHERE id = ?")
            .bind(hash)
            .bind(download_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;

        sqlx::query(
            "UPDATE accounts SET status = 2, added_at = strftime('%s','now'), download_id = ?, locked_by = NULL WHERE id = ?",
        )
        .bind(download_id)
        .bind(account_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    /// `mark_as_idle()` (§4.5).
    pub async fn mark_as_idle(store: &Store, id: &str) -> crate::Result<()> {
        store.mark_account_idle(id).await
    }

    /// `mark_as_uploading(worker_id)` (§4.5).
    pub async fn mark_as_uploading(store: &Store, id: &str, worker_id: &str) -> crate::Result<()> {
        store.mark_account_uploading(id, worker_id).await
    }

    /// `unlock(status)` (§4.5).
    pub async fn unlock(store: &Store, id: &str, status: AccountStatus) -> crate::Result<()> {
        store.unlock_account(id, status.to_i32()).await
    }

    /// `mark_as_failed(soft)` (§4.5): Account → idle, Download →
    /// `mark_as_failed`, in one transaction.
    pub async fn mark_as_failed(
        store: &Store,
        account_id: &str,
        download_id: DownloadId,
        soft: bool,
        download_retries: u32,
        error_expiry: Duration,
    ) -> crate::Result<()> {
        let mut tx = store
            .pool()
            .begin()
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;

        let retries: i64 = if soft {
            sqlx::query_as("SELECT retries FROM downloads WHERE id = ?")
                .bind(download_id)
                .fetch_one(&mut *tx)
                .await
                .map(|(r,): (i64,)| r)
                .unwrap_or(0)
        } else {
            sqlx::query("UPDATE downloads SET retries = retries + 1 WHERE id = ?")
                .bind(download_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
            sqlx::query_as("SELECT retries FROM downloads WHERE id = ?")
                .bind(download_id)
                .fetch_one(&mut *tx)
                .await
                .map(|(r,): (i64,)| r)
                .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?
        };

        if retries >= download_retries as i64 {
            let expire_at = crate::store::now_ts() + error_expiry.as_secs() as i64;
            sqlx::query(
                "UPDATE downloads SET status = 2, hash = NULL, locked_by = NULL, expire_at = ? WHERE id = ?",
            )
            .bind(expire_at)
            .bind(download_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        } else {
            sqlx::query(
                "UPDATE downloads SET status = 0, hash = NULL, locked_by = NULL WHERE id = ?",
            )
            .bind(download_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        }

        sqlx::query(
            "UPDATE accounts SET status = 0, added_at = NULL, download_id = NULL, locked_by = NULL WHERE id = ?",
        )
        .bind(account_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    /// `mark_as_completed()` (§4.5): Account → idle, Download → deleted.
    pub async fn mark_as_completed(
        store: &Store,
        account_id: &str,
        download_id: DownloadId,
    ) -> crate::Result<()> {
        let mut tx = store
            .pool()
            .begin()
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;

        sqlx::query("DELETE FROM downloads WHERE id = ?")
            .bind(download_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;

        sqlx::query(
            "UPDATE accounts SET status = 0, added_at = NULL, download_id = NULL, locked_by = NULL WHERE id = ?",
        )
        .bind(account_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    /// `reset()` (§4.5): Account → idle, Download → pending.
    pub async fn reset(store: &Store, account_id: &str, download_id: DownloadId) -> crate::Result<()> {
        let mut tx = store
            .pool()
            .begin()
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;

        sqlx::query(
            "UPDATE downloads SET status = 0, hash = NULL, locked_by = NULL WHERE id = ?",
        )
        .bind(download_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;

        sqlx::query(
            "UPDATE accounts SET status = 0, added_at = NULL, download_id = NULL, locked_by = NULL WHERE id = ?",
        )
        .bind(account_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    /// `checked()` (§4.5).
    pub async fn checked(store: &Store, id: &str) -> crate::Result<()> {
        store.touch_account_checked(id).await
    }

    /// `download_timeout(T)` (§4.5): if the in-flight deadline has elapsed,
    /// mark the Download TIMEOUT and return `true`.
    pub async fn download_timeout(
        store: &Store,
        added_at: i64,
        download_id: DownloadId,
        timeout: Duration,
        timeout_expiry: Duration,
    ) -> crate::Result<bool> {
        if added_at + timeout.as_secs() as i64 >= crate::store::now_ts() {
            return Ok(false);
        }
        Download::mark_as_timeout(store, download_id, timeout_expiry).await?;
        Ok(true)
    }

    /// `time_taken` (§4.5), made a pure getter per §9 Open Question (c): the
    /// original lazily initialises `added_at` as a side effect of reading
    /// it; this crate never does that implicitly.
    pub fn time_taken(added_at: i64) -> Duration {
        let now = crate::store::now_ts();
        Duration::from_secs(now.saturating_sub(added_at).max(0) as u64)
    }

    /// Persisting counterpart to [`Self::time_taken`]: the one call site
    /// (claim-time submit) that needs `added_at` anchored explicitly calls
    /// this first.
    pub async fn ensure_started(store: &Store, id: &str) -> crate::Result<i64> {
        store.ensure_account_added_at(id).await
    }

    /// `get_torrent_hash(uri)` (§4.5, §6): magnet btih extraction only —
    /// `.torrent` URLs are handled by [`crate::torrent_hash::from_torrent_bytes`]
    /// since they require a network fetch the entity layer shouldn't own.
    pub fn get_torrent_hash_from_magnet(uri: &str) -> crate::Result<String> {
        crate::torrent_hash::from_magnet(uri)
    }
}

/// Lazily-compiled matcher for the magnet `btih` parameter, shared with
/// [`crate::torrent_hash`].
pub(crate) fn btih_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"xt=urn:btih:([a-zA-Z0-9]+)").expect("valid regex"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn mark_as_downloading_pairs_both_rows() {
        let store = Store::open_in_memory().await.unwrap();
        store.upsert_account("acc1", "pw", 0).await.unwrap();
        let download_id = Download::create(&store, "x", "magnet:?xt=urn:btih:ABCDEF")
            .await
            .unwrap();

        Account::mark_as_downloading(&store, "acc1", download_id, "ABCDEF")
            .await
            .unwrap();

        let account = Account::get(&store, "acc1").await.unwrap().unwrap();
        assert_eq!(account.status, AccountStatus::Downloading);
        assert_eq!(account.download_id, Some(download_id));

        let download = Download::get(&store, download_id).await.unwrap().unwrap();
        assert_eq!(download.status, crate::types::DownloadStatus::Processing);
        assert_eq!(download.hash.as_deref(), Some("ABCDEF"));
    }

    #[tokio::test]
    async fn mark_as_completed_deletes_download_and_idles_account() {
        let store = Store::open_in_memory().await.unwrap();
        store.upsert_account("acc1", "pw", 0).await.unwrap();
        let download_id = Download::create(&store, "x", "magnet:?xt=urn:btih:1").await.unwrap();
        Account::mark_as_downloading(&store, "acc1", download_id, "1").await.unwrap();

        Account::mark_as_completed(&store, "acc1", download_id).await.unwrap();

        assert!(Download::get(&store, download_id).await.unwrap().is_none());
        let account = Account::get(&store, "acc1").await.unwrap().unwrap();
        assert_eq!(account.status, AccountStatus::Idle);
        assert_eq!(account.download_id, None);
    }

    #[tokio::test]
    async fn download_timeout_fires_after_deadline() {
        let store = Store::open_in_memory().await.unwrap();
        let download_id = Download::create(&store, "x", "magnet:?xt=urn:btih:2").await.unwrap();
        let stale_added_at = crate::store::now_ts() - 1000;

        let fired = Account::download_timeout(
            &store,
            stale_added_at,
            download_id,
            Duration::from_secs(60),
            Duration::from_secs(7 * 86400),
        )
        .await
        .unwrap();
        assert!(fired);

        let download = Download::get(&store, download_id).await.unwrap().unwrap();
        assert_eq!(download.status, crate::types::DownloadStatus::Timeout);
    }

    #[tokio::test]
    async fn download_timeout_does_not_fire_before_deadline() {
        let store = Store::open_in_memory().await.unwrap();
        let download_id = Download::create(&store, "x", "magnet:?xt=urn:btih:3").await.unwrap();

        let fired = Account::download_timeout(
            &store,
            crate::store::now_ts(),
            download_id,
            Duration::from_secs(60),
            Duration::from_secs(7 * 86400),
        )
        .await
        .unwrap();
        assert!(!fired);
    }
}
