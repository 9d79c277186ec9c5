//! Seedbox wire protocol (spec §6, Non-goal): this crate owns the state
//! machine and orchestration loop, not any particular seedbox's HTTP API.
//! `SeedboxClient` is the seam a deployment plugs a concrete provider into —
//! `original_source/rssbox/modules/sonicbit.py`'s `SonicBit` class extends a
//! third-party `sonicbit` SDK for exactly these calls (`add_torrent`,
//! `list_torrents`, `purge`, `fetchFile`), which is the boundary this trait
//! draws in Rust.

use async_trait::async_trait;
use std::collections::HashMap;

/// One file inside a torrent, as reported by the seedbox.
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentFile {
    pub name: String,
    pub extension: String,
    pub size: u64,
    pub download_url: String,
}

/// One torrent as reported by a seedbox account's listing endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Torrent {
    pub hash: String,
    /// 0-100.
    pub progress: u8,
    pub files: Vec<TorrentFile>,
}

/// Result of `fetch_file`: the direct download URL for a single file,
/// mirroring `original_source/rssbox/modules/sonicbit.py`'s
/// `get_download_link`.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedFile {
    pub url: String,
}

/// The seedbox account's torrent/file-download surface. One implementation
/// per provider; this crate ships none, since no provider's wire protocol
/// is in scope — only a test-only in-memory fake.
#[async_trait]
pub trait SeedboxClient: Send + Sync {
    /// Submit a magnet/torrent URI to the account, returning the seedbox's
    /// echoed URI(s). The caller compares the echo against what it sent to
    /// confirm the submission landed (§4.7 step 3).
    async fn add_torrent(
        &self,
        account_id: &str,
        uri: &str,
    ) -> Result<Vec<String>, crate::error::SeedboxError>;

    /// List every torrent currently known to the account, keyed by content
    /// hash, for progress polling.
    async fn list_torrents(
        &self,
        account_id: &str,
    ) -> Result<HashMap<String, Torrent>, crate::error::SeedboxError>;

    /// Remove a torrent from the account, optionally deleting its files.
    async fn delete_torrent(
        &self,
        account_id: &str,
        hash: &str,
        with_file: bool,
    ) -> Result<(), crate::error::SeedboxError>;

    /// Remove every torrent on the account. Called immediately before every
    /// submit so a previous run's leftovers can't shadow the new one.
    async fn purge(&self, account_id: &str) -> Result<(), crate::error::SeedboxError>;

    /// Resolve a direct download URL for one file, for providers whose
    /// listing doesn't already embed it.
    async fn fetch_file(
        &self,
        account_id: &str,
        file_id: &str,
    ) -> Result<FetchedFile, crate::error::SeedboxError>;
}

/// Persists/refreshes whatever auth token a `SeedboxClient` implementation
/// needs, independent of the account's Download/state columns — mirrors
/// `original_source/rssbox/modules/token_handler.py`'s `TokenHandler`.
#[async_trait]
pub trait TokenHandler: Send + Sync {
    async fn read(&self, account_id: &str) -> crate::Result<Option<String>>;
    async fn write(&self, account_id: &str, token: &str) -> crate::Result<()>;
}

/// `TokenHandler` backed directly by the `accounts.token` column.
pub struct StoreTokenHandler {
    store: crate::store::Store,
}

impl StoreTokenHandler {
    pub fn new(store: crate::store::Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TokenHandler for StoreTokenHandler {
    async fn read(&self, account_id: &str) -> crate::Result<Option<String>> {
        Ok(self
            .store
            .get_account(account_id)
            .await?
            .and_then(|row| row.token))
    }

    async fn write(&self, account_id: &str, token: &str) -> crate::Result<()> {
        self.store.set_account_token(account_id, token).await
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn torrent_file_carries_its_own_download_url() {
        let file = TorrentFile {
            name: "a.mkv".to_string(),
            extension: "mkv".to_string(),
            size: 100,
            download_url: "http://x".to_string(),
        };
        assert_eq!(file.download_url, "http://x");
    }
}
