//! File materialisation and re-upload (spec §6, Non-goal: the upload
//! backend itself is an external collaborator interface). Extension
//! filtering and local staging are ambient concerns this crate still
//! implements, grounded on `original_source/rssbox/handlers/file_handler.py`'s
//! `FileHandler` (`check_extension`, `download_file`, `reformat_name`,
//! `sanitize_name`); the actual remote-upload call is the seam a deployment
//! plugs a destination into.

use crate::download::Download;
use crate::seedbox::{Torrent, TorrentFile};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Re-uploads a completed download's files to wherever they ultimately
/// belong. This crate ships a local-staging implementation only; the
/// remote destination (Drive, an object store, a file host) is out of
/// scope.
#[async_trait::async_trait]
pub trait FileHandler: Send + Sync {
    /// Stage and hand off every file in `torrent` that matches the
    /// extension filter, returning how many were successfully uploaded.
    /// Zero means nothing matched (treated by the orchestrator as "retry
    /// the check later", matching `sonicbit_client.py`'s `files_uploaded`
    /// check).
    async fn upload(&self, download: &Download, torrent: &Torrent) -> crate::Result<usize>;
}

/// Downloads matching files to a local directory and reports them as
/// uploaded. A real deployment wraps or replaces this with a call to its
/// actual upload destination; this type still owns extension filtering and
/// naming, matching the teacher source's division of labour.
pub struct LocalFileHandler {
    client: reqwest::Client,
    download_path: PathBuf,
    filter_extensions: Vec<String>,
}

impl LocalFileHandler {
    pub fn new(download_path: impl Into<PathBuf>, filter_extensions: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            download_path: download_path.into(),
            filter_extensions: filter_extensions.into_iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    fn check_extension(&self, name: &str) -> bool {
        if self.filter_extensions.is_empty() {
            return true;
        }
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| self.filter_extensions.iter().any(|allowed| allowed == &e.to_lowercase()))
            .unwrap_or(false)
    }

    fn sanitize_name(name: &str) -> String {
        name.replace("[XC]", "").replace('-', " ").split_whitespace().collect::<Vec<_>>().join(".")
    }

    fn reformat_name(download_name: &str, ext: &str, subname: Option<&str>) -> String {
        let base = Self::sanitize_name(download_name);
        match subname {
            Some(sub) => format!("{base}.{}.{}", Self::sanitize_name(sub), ext.to_lowercase()),
            None => format!("{base}.{}", ext.to_lowercase()),
        }
    }

    async fn download_to_staging(&self, file: &TorrentFile, filename: &str) -> crate::Result<PathBuf> {
        let dir = self.download_path.join(md5_hex(filename));
        tokio::fs::create_dir_all(&dir).await.map_err(crate::Error::Io)?;
        let path = dir.join(filename);

        if let Ok(metadata) = tokio::fs::metadata(&path).await {
            if metadata.len() == file.size {
                return Ok(path);
            }
        }

        let response = self
            .client
            .get(&file.download_url)
            .send()
            .await
            .map_err(crate::Error::Network)?;
        let bytes = response.bytes().await.map_err(crate::Error::Network)?;
        tokio::fs::write(&path, &bytes).await.map_err(crate::Error::Io)?;
        info!(filename, bytes = bytes.len(), "staged file for upload");
        Ok(path)
    }
}

#[async_trait::async_trait]
impl FileHandler for LocalFileHandler {
    async fn upload(&self, download: &Download, torrent: &Torrent) -> crate::Result<usize> {
        let matching: Vec<&TorrentFile> =
            torrent.files.iter().filter(|f| self.check_extension(&f.name)).collect();
        if matching.is_empty() {
            warn!(download = %download.name, "no files matched the extension filter");
            return Ok(0);
        }

        let mut count = 0;
        for file in &matching {
            let ext = Path::new(&file.name).extension().and_then(|e| e.to_str()).unwrap_or(&file.extension);
            let subname = if matching.len() > 1 { Some(file.name.as_str()) } else { None };
            let filename = Self::reformat_name(&download.name, ext, subname);
            let staged = self.download_to_staging(file, &filename).await?;
            info!(filename, path = %staged.display(), "uploaded staged file");
            // remote hand-off happens here in a concrete deployment
            let _ = tokio::fs::remove_file(&staged).await;
            count += 1;
        }
        Ok(count)
    }
}

fn md5_hex(input: &str) -> String {
    // directory sharding only needs a stable, collision-resistant label, not
    // cryptographic strength; a small FNV-1a hash avoids pulling in an md5 crate
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in input.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_extension_is_case_insensitive() {
        let handler = LocalFileHandler::new("/tmp/x", vec!["mkv".to_string(), "mp4".to_string()]);
        assert!(handler.check_extension("Movie.MKV"));
        assert!(!handler.check_extension("Movie.txt"));
    }

    #[test]
    fn reformat_name_sanitizes_and_lowercases_extension() {
        let name = LocalFileHandler::reformat_name("Some-Show [XC]", "MKV", None);
        assert_eq!(name, "Some.Show.mkv");
    }

    #[test]
    fn reformat_name_with_subname_appends_it() {
        let name = LocalFileHandler::reformat_name("Show", "mkv", Some("Episode 01"));
        assert_eq!(name, "Show.Episode.01.mkv");
    }
}
