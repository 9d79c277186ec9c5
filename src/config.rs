//! Configuration for the worker process.
//!
//! Values are read from the environment (optionally pre-loaded from a
//! `.env` file via `dotenvy`), following the teacher crate's
//! "immutable value constructed once at startup" convention rather than a
//! module-level mutable singleton (see §9 of the design notes).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_database_path() -> PathBuf {
    PathBuf::from("rssbox.db")
}

fn default_download_path() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_reaper_interval() -> Duration {
    Duration::from_secs(40)
}

fn default_download_retries() -> u32 {
    5
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(2 * 60 * 60 + 30 * 60)
}

fn default_download_start_timeout() -> Duration {
    Duration::from_secs(2 * 60)
}

fn default_download_check_timeout() -> Duration {
    Duration::from_secs(8 * 60)
}

fn default_download_add_verify_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_record_expiry() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

fn default_filter_extensions() -> Vec<String> {
    Vec::new()
}

fn default_api_bind_address() -> String {
    "127.0.0.1:8642".to_string()
}

/// Worker-process configuration, assembled once at startup from environment
/// variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite database file (`DATABASE_PATH`).
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Directory the local file handler downloads into (`DOWNLOAD_PATH`).
    #[serde(default = "default_download_path")]
    pub download_path: PathBuf,

    /// Pipe-separated RSS feed URLs (`RSS_URLS`).
    #[serde(default)]
    pub rss_urls: Vec<String>,

    /// Extension allow-list for the file handler; empty means allow all
    /// (`FILTER_EXTENSIONS`, comma-separated).
    #[serde(default = "default_filter_extensions")]
    pub filter_extensions: Vec<String>,

    /// Heartbeat interval `H` (§4.2). Default 30s.
    #[serde(default = "default_heartbeat_interval", with = "duration_secs")]
    pub heartbeat_interval: Duration,

    /// Reaper interval `R` (§4.3). Default 40s.
    #[serde(default = "default_reaper_interval", with = "duration_secs")]
    pub reaper_interval: Duration,

    /// Retry limit before a Download is marked `ERROR` (§4.4). Default 5.
    #[serde(default = "default_download_retries")]
    pub download_retries: u32,

    /// Deadline on an in-flight download before it's marked `TIMEOUT`
    /// (§4.5). Default 2h30m.
    #[serde(default = "default_download_timeout", with = "duration_secs")]
    pub download_timeout: Duration,

    /// Wall-clock bound on one `start_downloads` pass (§4.7). Default 2m.
    #[serde(default = "default_download_start_timeout", with = "duration_secs")]
    pub download_start_timeout: Duration,

    /// Wall-clock bound on one `check_downloads` pass (§4.8). Default 8m.
    #[serde(default = "default_download_check_timeout", with = "duration_secs")]
    pub download_check_timeout: Duration,

    /// Bound on polling for a submit echo to land in the torrent list
    /// (§4.7). Default 15s.
    #[serde(
        default = "default_download_add_verify_timeout",
        with = "duration_secs"
    )]
    pub download_add_verify_timeout: Duration,

    /// TTL applied to Downloads that reach `ERROR`. Default 7 days.
    #[serde(default = "default_record_expiry", with = "duration_secs")]
    pub download_error_record_expiry: Duration,

    /// TTL applied to Downloads that reach `TIMEOUT`. Default 7 days.
    #[serde(default = "default_record_expiry", with = "duration_secs")]
    pub download_timeout_record_expiry: Duration,

    /// TTL applied to Downloads that reach `TOO_LARGE`. Default 7 days.
    #[serde(default = "default_record_expiry", with = "duration_secs")]
    pub download_too_large_record_expiry: Duration,

    /// TTL applied to Downloads that reach `INVALID_TORRENT`. Default 7 days.
    #[serde(default = "default_record_expiry", with = "duration_secs")]
    pub download_invalid_torrent_record_expiry: Duration,

    /// Worker id override (`WORKER_ID` / `--id`); random if unset.
    #[serde(default)]
    pub worker_id: Option<String>,

    /// Bind address for the optional read-only control surface.
    /// Loopback-only by default — it carries no authorisation of its own
    /// (Non-goal, §1).
    #[serde(default = "default_api_bind_address")]
    pub api_bind_address: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            download_path: default_download_path(),
            rss_urls: Vec::new(),
            filter_extensions: default_filter_extensions(),
            heartbeat_interval: default_heartbeat_interval(),
            reaper_interval: default_reaper_interval(),
            download_retries: default_download_retries(),
            download_timeout: default_download_timeout(),
            download_start_timeout: default_download_start_timeout(),
            download_check_timeout: default_download_check_timeout(),
            download_add_verify_timeout: default_download_add_verify_timeout(),
            download_error_record_expiry: default_record_expiry(),
            download_timeout_record_expiry: default_record_expiry(),
            download_too_large_record_expiry: default_record_expiry(),
            download_invalid_torrent_record_expiry: default_record_expiry(),
            worker_id: None,
            api_bind_address: default_api_bind_address(),
        }
    }
}

impl Config {
    /// Load configuration from a pre-loaded `.env` (if present) plus the
    /// process environment. Unset variables fall back to the defaults
    /// above.
    pub fn from_env() -> crate::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = Config::default();

        if let Ok(v) = std::env::var("DATABASE_PATH") {
            config.database_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DOWNLOAD_PATH") {
            config.download_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("RSS_URLS") {
            config.rss_urls = v
                .split('|')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(v) = std::env::var("FILTER_EXTENSIONS") {
            config.filter_extensions = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(v) = std::env::var("HEARTBEAT_INTERVAL") {
            config.heartbeat_interval = parse_secs(&v, "HEARTBEAT_INTERVAL")?;
        }
        if let Ok(v) = std::env::var("REAPER_INTERVAL") {
            config.reaper_interval = parse_secs(&v, "REAPER_INTERVAL")?;
        }
        if let Ok(v) = std::env::var("DOWNLOAD_RETRIES") {
            config.download_retries = v.parse().map_err(|_| crate::Error::Config {
                key: "DOWNLOAD_RETRIES".into(),
                message: format!("'{v}' is not a valid integer"),
            })?;
        }
        if let Ok(v) = std::env::var("DOWNLOAD_TIMEOUT") {
            config.download_timeout = parse_secs(&v, "DOWNLOAD_TIMEOUT")?;
        }
        if let Ok(v) = std::env::var("DOWNLOAD_START_TIMEOUT") {
            config.download_start_timeout = parse_secs(&v, "DOWNLOAD_START_TIMEOUT")?;
        }
        if let Ok(v) = std::env::var("DOWNLOAD_CHECK_TIMEOUT") {
            config.download_check_timeout = parse_secs(&v, "DOWNLOAD_CHECK_TIMEOUT")?;
        }
        if let Ok(v) = std::env::var("DOWNLOAD_ADD_VERIFY_TIMEOUT") {
            config.download_add_verify_timeout = parse_secs(&v, "DOWNLOAD_ADD_VERIFY_TIMEOUT")?;
        }
        if let Ok(v) = std::env::var("DOWNLOAD_ERROR_RECORD_EXPIRY") {
            config.download_error_record_expiry = parse_secs(&v, "DOWNLOAD_ERROR_RECORD_EXPIRY")?;
        }
        if let Ok(v) = std::env::var("DOWNLOAD_TIMEOUT_RECORD_EXPIRY") {
            config.download_timeout_record_expiry = parse_secs(&v, "DOWNLOAD_TIMEOUT_RECORD_EXPIRY")?;
        }
        if let Ok(v) = std::env::var("DOWNLOAD_TOO_LARGE_RECORD_EXPIRY") {
            config.download_too_large_record_expiry = parse_secs(&v, "DOWNLOAD_TOO_LARGE_RECORD_EXPIRY")?;
        }
        if let Ok(v) = std::env::var("DOWNLOAD_INVALID_TORRENT_RECORD_EXPIRY") {
            config.download_invalid_torrent_record_expiry =
                parse_secs(&v, "DOWNLOAD_INVALID_TORRENT_RECORD_EXPIRY")?;
        }
        if let Ok(v) = std::env::var("WORKER_ID") {
            config.worker_id = Some(v);
        }
        if let Ok(v) = std::env::var("API_BIND_ADDRESS") {
            config.api_bind_address = v;
        }

        Ok(config)
    }
}

fn parse_secs(raw: &str, key: &str) -> crate::Result<Duration> {
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| crate::Error::Config {
            key: key.to_string(),
            message: format!("'{raw}' is not a valid number of seconds"),
        })
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
