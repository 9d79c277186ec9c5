//! Test-only collaborator fakes for the scenario/property suites.
//!
//! A fresh `SeedboxClient` fake is needed here (rather than reusing the
//! in-crate one) because `rssbox::seedbox::test_support` is
//! `#[cfg(test)] pub(crate)` and invisible outside the crate itself.

use async_trait::async_trait;
use rssbox::download::Download;
use rssbox::error::SeedboxError;
use rssbox::file_handler::FileHandler;
use rssbox::seedbox::{FetchedFile, SeedboxClient, Torrent};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory `SeedboxClient`: canned `add_torrent` results per account and a
/// mutable per-account torrent listing tests can seed and then mutate to
/// simulate progress.
#[derive(Default)]
pub struct FakeSeedboxClient {
    add_torrent_results: Mutex<HashMap<String, Result<Vec<String>, SeedboxError>>>,
    torrents: Mutex<HashMap<String, HashMap<String, Torrent>>>,
}

impl FakeSeedboxClient {
    pub fn set_add_result(&self, account_id: &str, result: Result<Vec<String>, SeedboxError>) {
        self.add_torrent_results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(account_id.to_string(), result);
    }

    pub fn set_torrent(&self, account_id: &str, torrent: Torrent) {
        self.torrents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(account_id.to_string())
            .or_default()
            .insert(torrent.hash.clone(), torrent);
    }

    pub fn set_progress(&self, account_id: &str, hash: &str, progress: u8) {
        if let Some(account_torrents) = self
            .torrents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(account_id)
        {
            if let Some(torrent) = account_torrents.get_mut(hash) {
                torrent.progress = progress;
            }
        }
    }
}

#[async_trait]
impl SeedboxClient for FakeSeedboxClient {
    async fn add_torrent(&self, account_id: &str, _uri: &str) -> Result<Vec<String>, SeedboxError> {
        self.add_torrent_results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(account_id)
            .cloned()
            .unwrap_or_else(|| Err(SeedboxError::Other("no canned result".into())))
    }

    async fn list_torrents(&self, account_id: &str) -> Result<HashMap<String, Torrent>, SeedboxError> {
        Ok(self
            .torrents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(account_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_torrent(&self, _account_id: &str, _hash: &str, _with_file: bool) -> Result<(), SeedboxError> {
        Ok(())
    }

    async fn purge(&self, account_id: &str) -> Result<(), SeedboxError> {
        self.torrents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(account_id);
        Ok(())
    }

    async fn fetch_file(&self, _account_id: &str, _file_id: &str) -> Result<FetchedFile, SeedboxError> {
        Ok(FetchedFile {
            url: "http://example.invalid/file".to_string(),
        })
    }
}

/// Reports a fixed number of files uploaded, without touching the
/// filesystem — the happy-path collaborator for S1/S2/S3.
pub struct CountingFileHandler {
    files_uploaded: usize,
}

impl CountingFileHandler {
    pub fn new(files_uploaded: usize) -> Self {
        Self { files_uploaded }
    }
}

#[async_trait]
impl FileHandler for CountingFileHandler {
    async fn upload(&self, _download: &Download, _torrent: &Torrent) -> rssbox::Result<usize> {
        Ok(self.files_uploaded)
    }
}

/// Always fails, for exercising the retry-exhaustion path (S4).
pub struct AlwaysFailFileHandler;

#[async_trait]
impl FileHandler for AlwaysFailFileHandler {
    async fn upload(&self, _download: &Download, _torrent: &Torrent) -> rssbox::Result<usize> {
        Err(rssbox::Error::FileHandler("simulated upload failure".to_string()))
    }
}
