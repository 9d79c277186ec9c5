//! Download entity and its state machine (spec §4.4).
//!
//! Grounded on `original_source/rssbox/modules/download.py`: a thin wrapper
//! around the store row that knows how to transition itself. Unlike the
//! Python original, transitions here are plain async methods that issue
//! the underlying SQL directly rather than mutating an in-memory copy and
//! calling `save()` — the store's `UPDATE` is already the single source of
//! truth, so there is no separable in-memory/persisted state to reconcile.

use crate::store::{DownloadRow, Store};
use crate::types::{DownloadId, DownloadStatus};
use std::time::Duration;

/// A work-item: one URL to submit to a seedbox and re-upload once complete.
#[derive(Debug, Clone)]
pub struct Download {
    pub id: DownloadId,
    pub url: String,
    pub name: String,
    pub status: DownloadStatus,
    pub hash: Option<String>,
    pub locked_by: Option<String>,
    pub retries: i64,
    pub expire_at: Option<i64>,
}

impl From<DownloadRow> for Download {
    fn from(row: DownloadRow) -> Self {
        Self {
            id: DownloadId::new(row.id),
            url: row.url,
            name: row.name,
            status: DownloadStatus::from_i32(row.status),
            hash: row.hash,
            locked_by: row.locked_by,
            retries: row.retries,
            expire_at: row.expire_at,
        }
    }
}

impl Download {
    /// `create` (§4.4): insert a new Download, or return the id of the
    /// existing row if `url` already exists (P7 idempotent ingest).
    pub async fn create(store: &Store, name: &str, url: &str) -> crate::Result<DownloadId> {
        store.insert_download(name, url).await
    }

    /// Look up a Download by id.
    pub async fn get(store: &Store, id: DownloadId) -> crate::Result<Option<Download>> {
        Ok(store.get_download(id).await?.map(Into::into))
    }

    /// `mark_as_processing(hash)` (§4.4).
    pub async fn mark_as_processing(store: &Store, id: DownloadId, hash: &str) -> crate::Result<()> {
        store.mark_download_processing(id, hash).await
    }

    /// `mark_as_pending()` (§4.4).
    pub async fn mark_as_pending(store: &Store, id: DownloadId) -> crate::Result<()> {
        store.mark_download_pending(id).await
    }

    /// `unlock()` (§4.6): release a claimed-but-unsubmitted Download.
    pub async fn unlock(store: &Store, id: DownloadId) -> crate::Result<()> {
        store.unlock_download(id).await
    }

    /// `mark_as_failed(soft)` (§4.4): burns a retry unless `soft`, then
    /// either returns to PENDING or — once `download_retries` is reached —
    /// transitions to ERROR with a TTL.
    pub async fn mark_as_failed(
        store: &Store,
        id: DownloadId,
        soft: bool,
        download_retries: u32,
        error_expiry: Duration,
    ) -> crate::Result<()> {
        let retries = if soft {
            store.get_download(id).await?.map(|r| r.retries).unwrap_or(0)
        } else {
            store.increment_download_retries(id).await?
        };

        if retries >= download_retries as i64 {
            store
                .stop_download_with_status(id, DownloadStatus::Error.to_i32(), Some(error_expiry))
                .await
        } else {
            store.mark_download_pending(id).await
        }
    }

    /// `mark_as_timeout()` (§4.4).
    pub async fn mark_as_timeout(store: &Store, id: DownloadId, expiry: Duration) -> crate::Result<()> {
        store
            .stop_download_with_status(id, DownloadStatus::Timeout.to_i32(), Some(expiry))
            .await
    }

    /// `mark_as_too_large()` (§4.4).
    pub async fn mark_as_too_large(store: &Store, id: DownloadId, expiry: Duration) -> crate::Result<()> {
        store
            .stop_download_with_status(id, DownloadStatus::TooLarge.to_i32(), Some(expiry))
            .await
    }

    /// `mark_as_invalid_torrent()` (§4.4).
    pub async fn mark_as_invalid_torrent(
        store: &Store,
        id: DownloadId,
        expiry: Duration,
    ) -> crate::Result<()> {
        store
            .stop_download_with_status(id, DownloadStatus::InvalidTorrent.to_i32(), Some(expiry))
            .await
    }

    /// Delete the row outright (§4.5 `mark_as_completed`).
    pub async fn delete(store: &Store, id: DownloadId) -> crate::Result<()> {
        store.delete_download(id).await
    }
}
