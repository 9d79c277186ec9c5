//! Shared test harness for the scenario (S1-S6) and property (P1-P7) suites.

pub mod fakes;

pub use fakes::{AlwaysFailFileHandler, CountingFileHandler, FakeSeedboxClient};

use rssbox::config::Config;
use rssbox::store::Store;
use std::time::Duration;

/// Open a throwaway SQLite database under a tempdir, migrated and ready.
/// `open_in_memory` is `#[cfg(test)]`-gated inside the crate and invisible
/// here, so every integration test pays for a real (if ephemeral) file.
pub async fn test_store() -> (Store, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("rssbox-test.db");
    let store = Store::open(&path).await.expect("open store");
    (store, dir)
}

/// A `Config` with every timing knob shortened so scenario tests don't pay
/// for the production defaults (2m/8m/2h30m deadlines).
pub fn fast_config() -> Config {
    Config {
        download_start_timeout: Duration::from_secs(5),
        download_check_timeout: Duration::from_secs(5),
        download_add_verify_timeout: Duration::from_secs(2),
        ..Config::default()
    }
}
