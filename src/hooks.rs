//! Policy hook surface (spec §4.9): a capability set with default
//! behaviours, composed rather than inherited — mirroring the teacher's
//! `ParityHandler` trait (`parity/traits.rs`) paired with its no-op default
//! implementation (`parity/noop.rs`). The default bodies here reproduce the
//! original `Hook` base class (`original_source/rssbox/hooks/hook.py`).

use crate::account::Account;
use crate::download::Download;
use crate::error::SeedboxError;
use crate::feed::FeedEntry;
use crate::store::Store;
use crate::types::DownloadId;
use async_trait::async_trait;

/// Policy callbacks invoked at the decision points where tolerated/fatal
/// semantics differ by feed provider. Implementations may override any
/// subset; unoverridden methods fall back to `DefaultHook`'s behaviour.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Called when a new feed entry is about to become a Download. Return
    /// `None` to drop it, `Some(entry)` (unchanged or rewritten) to keep
    /// it.
    async fn on_new_entry(&self, entry: FeedEntry) -> Option<FeedEntry> {
        Some(entry)
    }

    /// Called when a submitted download has vanished from the seedbox's
    /// torrent list. `true` = reset the pair and retry; `false` = the hook
    /// has already driven terminal state.
    async fn on_sonicbit_download_not_found(
        &self,
        store: &Store,
        account_id: &str,
        download: &Download,
    ) -> bool {
        tracing::warn!(download = %download.name, "removing large download not found on seedbox");
        let _ = Download::delete(store, download.id).await;
        let _ = Account::mark_as_idle(store, account_id).await;
        false
    }

    /// Called when a download's in-flight deadline elapses. Advisory only —
    /// the Download's state transition has already happened.
    async fn on_download_timeout(&self, store: &Store, download: &Download) {
        tracing::warn!(download = %download.name, "removing timed out download");
        let _ = Download::delete(store, download.id).await;
    }

    /// Called when an upload attempt raises. `true` = soft failure (retry
    /// counter not burned), `false` = hard failure.
    async fn on_before_upload_error(
        &self,
        _account: &Account,
        _download: &Download,
        _error: &crate::Error,
    ) -> bool {
        false
    }

    /// Called after `mark_as_failed` has run for an upload error.
    async fn on_after_upload_error(
        &self,
        store: &Store,
        download_id: DownloadId,
        _error: &crate::Error,
    ) {
        if let Some(download) = Download::get(store, download_id).await.ok().flatten() {
            if download.status == crate::types::DownloadStatus::Error {
                tracing::warn!(download = %download.name, "removing failed download");
                let _ = Download::delete(store, download_id).await;
            }
        }
    }

    /// Called after a successful upload. Advisory.
    async fn on_upload_complete(&self, _account_id: &str, _name: &str, _files_uploaded: usize) {}

    /// Called when submitting a download to the seedbox fails. `true` =
    /// release the account/download for a later retry; `false` = the hook
    /// has already driven terminal state.
    async fn on_add_download_error(
        &self,
        store: &Store,
        account_id: &str,
        download: &Download,
        error: &crate::Error,
        config: &crate::config::Config,
    ) -> bool {
        if let crate::Error::Seedbox(SeedboxError::TooLarge(_)) = error {
            tracing::warn!(download = %download.name, "too large, marking terminal");
            let _ = Download::mark_as_too_large(
                store,
                download.id,
                config.download_too_large_record_expiry,
            )
            .await;
            let _ = Account::mark_as_idle(store, account_id).await;
            return false;
        }
        if let crate::Error::Hash(_) = error {
            tracing::warn!(download = %download.name, "invalid torrent hash, marking terminal");
            let _ = Download::mark_as_invalid_torrent(
                store,
                download.id,
                config.download_invalid_torrent_record_expiry,
            )
            .await;
            let _ = Account::mark_as_idle(store, account_id).await;
            return false;
        }
        tracing::error!(download = %download.name, error = %error, "failed to add download, releasing for retry");
        true
    }
}

/// The stock hook implementation: classifies too-large/hash errors into
/// terminal states and releases-and-retries everything else, matching
/// `original_source/rssbox/hooks/hook.py`'s `Hook` base class.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHook;

impl Hook for DefaultHook {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn default_hook_not_found_deletes_and_idles() {
        let store = Store::open_in_memory().await.unwrap();
        store.upsert_account("acc1", "pw", 0).await.unwrap();
        let id = Download::create(&store, "x", "magnet:?xt=urn:btih:1").await.unwrap();
        Account::mark_as_downloading(&store, "acc1", id, "1").await.unwrap();
        let download = Download::get(&store, id).await.unwrap().unwrap();

        let hook = DefaultHook;
        let cont = hook
            .on_sonicbit_download_not_found(&store, "acc1", &download)
            .await;
        assert!(!cont);
        assert!(Download::get(&store, id).await.unwrap().is_none());
        let account = Account::get(&store, "acc1").await.unwrap().unwrap();
        assert_eq!(account.status, crate::types::AccountStatus::Idle);
    }

    #[tokio::test]
    async fn default_hook_too_large_marks_terminal() {
        let store = Store::open_in_memory().await.unwrap();
        store.upsert_account("acc1", "pw", 0).await.unwrap();
        let id = Download::create(&store, "x", "magnet:?xt=urn:btih:2").await.unwrap();
        let download = Download::get(&store, id).await.unwrap().unwrap();
        let config = crate::config::Config::default();

        let hook = DefaultHook;
        let retry = hook
            .on_add_download_error(
                &store,
                "acc1",
                &download,
                &crate::Error::Seedbox(SeedboxError::TooLarge("nope".into())),
                &config,
            )
            .await;
        assert!(!retry);
        let download = Download::get(&store, id).await.unwrap().unwrap();
        assert_eq!(download.status, crate::types::DownloadStatus::TooLarge);
    }

    #[tokio::test]
    async fn default_hook_other_errors_release_for_retry() {
        let store = Store::open_in_memory().await.unwrap();
        store.upsert_account("acc1", "pw", 0).await.unwrap();
        let id = Download::create(&store, "x", "magnet:?xt=urn:btih:3").await.unwrap();
        let download = Download::get(&store, id).await.unwrap().unwrap();
        let config = crate::config::Config::default();

        let hook = DefaultHook;
        let retry = hook
            .on_add_download_error(
                &store,
                "acc1",
                &download,
                &crate::Error::Seedbox(SeedboxError::Transient("disconnect".into())),
                &config,
            )
            .await;
        assert!(retry);
    }
}
