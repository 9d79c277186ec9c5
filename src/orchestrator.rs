//! The two claim/submit/poll loops that drive work forward (spec §4.7,
//! §4.8), plus the submit routine they share.
//!
//! Grounded on `original_source/rssbox/sonicbit_client.py`'s
//! `start_downloads`/`check_downloads`; the deadline-bounded-loop shape and
//! the `tokio::select!` cancellation pattern come from the teacher's
//! `scheduler_task.rs`.

use crate::account::Account;
use crate::config::Config;
use crate::download::Download;
use crate::error::SeedboxError;
use crate::hooks::Hook;
use crate::retry::{with_retry, RetryConfig};
use crate::seedbox::SeedboxClient;
use crate::store::Store;
use crate::types::{AccountStatus, DownloadId};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Groups the collaborators every orchestrator loop needs, so
/// `start_downloads`/`check_downloads` take one argument instead of five.
pub struct Orchestrator<'a> {
    pub store: &'a Store,
    pub seedbox: &'a dyn SeedboxClient,
    pub file_handler: &'a dyn crate::file_handler::FileHandler,
    pub hook: &'a dyn Hook,
    pub config: &'a Config,
    pub worker_id: &'a str,
    /// Used only to fetch `.torrent` payloads for `http(s)://` download
    /// URLs so their content hash can be derived (§6); magnet URIs never
    /// touch it.
    pub http_client: &'a reqwest::Client,
}

impl<'a> Orchestrator<'a> {
    /// `start_downloads` (§4.7): claim a pending Download and a free
    /// Account, submit to the seedbox, and pair them, until either queue is
    /// exhausted or `download_start_timeout` elapses.
    pub async fn start_downloads(&self) -> crate::Result<u32> {
        let deadline = Instant::now() + self.config.download_start_timeout;
        let mut processed = 0;

        loop {
            if Instant::now() >= deadline {
                debug!("start_downloads deadline reached");
                break;
            }

            let Some(download_row) = self.store.claim_pending_download(self.worker_id).await?
            else {
                break;
            };
            let download = Download::from(download_row);

            let Some(account_row) = self.store.claim_free_account(self.worker_id).await? else {
                Download::unlock(self.store, download.id).await?;
                break;
            };
            let account_id = account_row.id.clone();

            match self.submit(&account_id, &download).await {
                Ok(hash) => {
                    Account::mark_as_downloading(self.store, &account_id, download.id, &hash)
                        .await?;
                    info!(download = %download.name, account = %account_id, "submitted for download");
                }
                Err(err) => {
                    let release = self
                        .hook
                        .on_add_download_error(self.store, &account_id, &download, &err, self.config)
                        .await;
                    if release {
                        Download::unlock(self.store, download.id).await?;
                        Account::mark_as_idle(self.store, &account_id).await?;
                    }
                }
            }

            processed += 1;
        }

        Ok(processed)
    }

    /// The seedbox submit routine (§4.7 step 3): purge, add, verify the
    /// echo lands in the torrent list within `download_add_verify_timeout`,
    /// retried locally up to 3 times (§7).
    async fn submit(&self, account_id: &str, download: &Download) -> crate::Result<String> {
        let retry_config = RetryConfig::default();
        with_retry(&retry_config, || async {
            self.seedbox.purge(account_id).await?;
            let echoed = self.seedbox.add_torrent(account_id, &download.url).await?;
            if !echoed.iter().any(|u| u == &download.url) {
                return Err(SeedboxError::EchoMismatch(download.url.clone()).into());
            }

            let hash = self.compute_hash(&download.url).await?;

            self.await_submit_echo(account_id, &hash).await?;
            Ok(hash)
        })
        .await
    }

    /// Derives the content hash for `url` (§6, §4.7 step 3): magnet URIs are
    /// handled in-process; `http(s)://` URIs name a `.torrent` file that must
    /// be fetched before it can be bdecoded.
    async fn compute_hash(&self, url: &str) -> crate::Result<String> {
        if url.starts_with("http://") || url.starts_with("https://") {
            let bytes = self
                .http_client
                .get(url)
                .send()
                .await
                .map_err(crate::Error::Network)?
                .error_for_status()
                .map_err(crate::Error::Network)?
                .bytes()
                .await
                .map_err(crate::Error::Network)?;
            crate::torrent_hash::from_uri(url, Some(&bytes))
        } else {
            crate::torrent_hash::from_uri(url, None)
        }
    }

    /// Poll the account's torrent list until `hash` appears or
    /// `download_add_verify_timeout` elapses.
    async fn await_submit_echo(&self, account_id: &str, hash: &str) -> Result<(), SeedboxError> {
        let deadline = Instant::now() + self.config.download_add_verify_timeout;
        loop {
            let torrents = self.seedbox.list_torrents(account_id).await?;
            if torrents.contains_key(hash) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SeedboxError::Transient(format!(
                    "submit echo for {hash} did not land within the verify window"
                )));
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    /// `check_downloads` (§4.8): poll DOWNLOADING accounts for completion,
    /// upload finished torrents, and reap timed-out ones, until the queue is
    /// exhausted or `download_check_timeout` elapses.
    pub async fn check_downloads(&self) -> crate::Result<u32> {
        let deadline = Instant::now() + self.config.download_check_timeout;
        let mut processed = 0;

        loop {
            if Instant::now() >= deadline {
                debug!("check_downloads deadline reached");
                break;
            }

            let Some(account_row) = self
                .store
                .claim_downloading_account_to_check(self.worker_id)
                .await?
            else {
                break;
            };
            let account = Account::from(account_row);

            self.check_one_account(&account).await?;
            processed += 1;
        }

        Ok(processed)
    }

    async fn check_one_account(&self, account: &crate::account::Account) -> crate::Result<()> {
        let Some(download_id) = account.download_id else {
            Account::mark_as_idle(self.store, &account.id).await?;
            return Ok(());
        };

        let Some(download) = Download::get(self.store, download_id).await? else {
            Account::mark_as_idle(self.store, &account.id).await?;
            return Ok(());
        };

        let Some(hash) = download.hash.clone() else {
            Account::reset(self.store, &account.id, download_id).await?;
            return Ok(());
        };

        let torrents = match self.seedbox.list_torrents(&account.id).await {
            Ok(t) => t,
            Err(err) => {
                warn!(account = %account.id, %err, "failed to list torrents, releasing");
                Account::unlock(self.store, &account.id, AccountStatus::Downloading).await?;
                return Ok(());
            }
        };

        let Some(torrent) = torrents.get(&hash) else {
            let retry = self
                .hook
                .on_sonicbit_download_not_found(self.store, &account.id, &download)
                .await;
            if retry {
                Account::reset(self.store, &account.id, download_id).await?;
            }
            return Ok(());
        };

        if torrent.progress == 100 {
            self.upload_completed(account, &download, torrent).await
        } else {
            self.check_still_running(account, &download, download_id).await
        }
    }

    async fn upload_completed(
        &self,
        account: &crate::account::Account,
        download: &Download,
        torrent: &crate::seedbox::Torrent,
    ) -> crate::Result<()> {
        Account::mark_as_uploading(self.store, &account.id, self.worker_id).await?;

        match self.file_handler.upload(download, torrent).await {
            Ok(0) => {
                Account::unlock(self.store, &account.id, AccountStatus::Downloading).await?;
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(files_uploaded) => {
                Account::mark_as_completed(self.store, &account.id, download.id).await?;
                self.hook
                    .on_upload_complete(&account.id, &download.name, files_uploaded)
                    .await;
            }
            Err(err) => {
                let soft = self
                    .hook
                    .on_before_upload_error(account, download, &err)
                    .await;
                Account::mark_as_failed(
                    self.store,
                    &account.id,
                    download.id,
                    soft,
                    self.config.download_retries,
                    self.config.download_error_record_expiry,
                )
                .await?;
                self.hook.on_after_upload_error(self.store, download.id, &err).await;
            }
        }
        Ok(())
    }

    async fn check_still_running(
        &self,
        account: &crate::account::Account,
        download: &Download,
        download_id: DownloadId,
    ) -> crate::Result<()> {
        let Some(added_at) = account.added_at else {
            Account::unlock(self.store, &account.id, AccountStatus::Downloading).await?;
            return Ok(());
        };

        let timed_out = Account::download_timeout(
            self.store,
            added_at,
            download_id,
            self.config.download_timeout,
            self.config.download_timeout_record_expiry,
        )
        .await?;

        if timed_out {
            self.hook.on_download_timeout(self.store, download).await;
        } else {
            Account::unlock(self.store, &account.id, AccountStatus::Downloading).await?;
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        Ok(())
    }
}
