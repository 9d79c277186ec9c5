//! CLI entry point (spec §6 "CLI").
//!
//! Grounded on the teacher's `Config::from_env` + `tracing-subscriber`
//! startup sequence, with the flag surface itself following the
//! `clap::Parser`-derive convention used across the example pack (e.g.
//! `Promises-RN-Audible-Liberator`'s `src/bin/cli.rs`).

use clap::Parser;
use rssbox::config::Config;
use rssbox::feed::HttpFeedSource;
use rssbox::file_handler::LocalFileHandler;
use rssbox::hooks::DefaultHook;
use rssbox::store::Store;
use rssbox::worker::{run_with_shutdown, RunModes, Worker};
use std::sync::Arc;

/// Distributed RSS-to-seedbox-to-upload work coordinator.
#[derive(Parser, Debug)]
#[command(name = "rssbox", about = "Claims RSS-sourced downloads across a pool of seedbox accounts and re-uploads completed files")]
struct Cli {
    /// Only poll RSS feeds and enqueue new downloads.
    #[arg(long, conflicts_with_all = ["download_only", "upload_only"])]
    rss_only: bool,

    /// Only run the claim/submit loop (`start_downloads`).
    #[arg(long, conflicts_with_all = ["rss_only", "upload_only"])]
    download_only: bool,

    /// Only run the poll/upload loop (`check_downloads`).
    #[arg(long, conflicts_with_all = ["rss_only", "download_only"])]
    upload_only: bool,

    /// Run both orchestrator loops but not RSS polling (default).
    #[arg(long)]
    process_only: bool,

    /// Override the random worker id (`WORKER_ID`).
    #[arg(long)]
    id: Option<String>,

    /// Raise the log level to debug.
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn modes(&self) -> RunModes {
        if self.rss_only {
            RunModes::rss_only()
        } else if self.download_only {
            RunModes::download_only()
        } else if self.upload_only {
            RunModes::upload_only()
        } else {
            RunModes::process_only()
        }
    }
}

#[tokio::main]
async fn main() -> rssbox::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        "debug".to_string()
    } else {
        std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.clone())),
        )
        .init();

    let mut config = Config::from_env()?;
    if let Some(id) = cli.id.clone() {
        config.worker_id = Some(id);
    }

    let store = Store::open(&config.database_path).await?;

    let seedbox: Arc<dyn rssbox::seedbox::SeedboxClient> = Arc::new(NoSeedboxConfigured);
    let file_handler = Arc::new(LocalFileHandler::new(
        config.download_path.clone(),
        config.filter_extensions.clone(),
    ));
    let feed_source = Arc::new(HttpFeedSource::default());
    let hook = Arc::new(DefaultHook);

    let api_bind_address = config.api_bind_address.clone();
    let api_store = store.clone();
    let worker_id_for_api: Arc<str> = Arc::from(
        config
            .worker_id
            .clone()
            .unwrap_or_else(|| "unknown".to_string())
            .as_str(),
    );
    tokio::spawn(async move {
        if let Err(e) = rssbox::api::start_api_server(api_store, worker_id_for_api, &api_bind_address).await {
            tracing::warn!(error = %e, "control surface stopped unexpectedly");
        }
    });

    let worker = Arc::new(Worker::new(store, config, seedbox, file_handler, feed_source, hook));
    run_with_shutdown(worker, cli.modes()).await
}

/// Placeholder `SeedboxClient` used when no provider is wired in. Every
/// call fails with `SeedboxError::Other`, since §6 ships no bundled
/// provider — a real deployment supplies its own implementation here.
struct NoSeedboxConfigured;

#[async_trait::async_trait]
impl rssbox::seedbox::SeedboxClient for NoSeedboxConfigured {
    async fn add_torrent(
        &self,
        _account_id: &str,
        _uri: &str,
    ) -> Result<Vec<String>, rssbox::error::SeedboxError> {
        Err(rssbox::error::SeedboxError::Other(
            "no SeedboxClient provider configured".to_string(),
        ))
    }

    async fn list_torrents(
        &self,
        _account_id: &str,
    ) -> Result<std::collections::HashMap<String, rssbox::seedbox::Torrent>, rssbox::error::SeedboxError>
    {
        Err(rssbox::error::SeedboxError::Other(
            "no SeedboxClient provider configured".to_string(),
        ))
    }

    async fn delete_torrent(
        &self,
        _account_id: &str,
        _hash: &str,
        _with_file: bool,
    ) -> Result<(), rssbox::error::SeedboxError> {
        Err(rssbox::error::SeedboxError::Other(
            "no SeedboxClient provider configured".to_string(),
        ))
    }

    async fn purge(&self, _account_id: &str) -> Result<(), rssbox::error::SeedboxError> {
        Err(rssbox::error::SeedboxError::Other(
            "no SeedboxClient provider configured".to_string(),
        ))
    }

    async fn fetch_file(
        &self,
        _account_id: &str,
        _file_id: &str,
    ) -> Result<rssbox::seedbox::FetchedFile, rssbox::error::SeedboxError> {
        Err(rssbox::error::SeedboxError::Other(
            "no SeedboxClient provider configured".to_string(),
        ))
    }
}
