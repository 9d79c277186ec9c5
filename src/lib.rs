//! # rssbox
//!
//! Distributed, horizontally scalable work coordinator for an RSS →
//! seedbox → upload pipeline. Any number of worker processes may run
//! concurrently against a shared SQLite database, which is the sole
//! source of truth for work state; there is no shared in-process mutable
//! state between workers or between a worker's own background tasks.
//!
//! ## Design Philosophy
//!
//! - **The store is authoritative** — every state transition is an atomic
//!   SQL statement, not an in-memory mutation that gets persisted later.
//! - **Pluggable collaborators** — the seedbox wire protocol, the RSS
//!   fetch/parse body, and the upload destination are traits this crate
//!   defines and partially implements; a deployment supplies the rest.
//! - **Policy hooks, not hardcoded failure handling** — the points where
//!   tolerated/fatal semantics differ by feed provider are a trait with
//!   sensible defaults, not a match statement buried in the orchestrator.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rssbox::config::Config;
//! use rssbox::store::Store;
//! use rssbox::file_handler::LocalFileHandler;
//! use rssbox::feed::HttpFeedSource;
//! use rssbox::hooks::DefaultHook;
//! use rssbox::worker::{Worker, RunModes};
//! use std::sync::Arc;
//!
//! # struct MySeedboxClient;
//! # #[async_trait::async_trait]
//! # impl rssbox::seedbox::SeedboxClient for MySeedboxClient {
//! #     async fn add_torrent(&self, _: &str, _: &str) -> Result<Vec<String>, rssbox::error::SeedboxError> { Ok(vec![]) }
//! #     async fn list_torrents(&self, _: &str) -> Result<std::collections::HashMap<String, rssbox::seedbox::Torrent>, rssbox::error::SeedboxError> { Ok(Default::default()) }
//! #     async fn delete_torrent(&self, _: &str, _: &str, _: bool) -> Result<(), rssbox::error::SeedboxError> { Ok(()) }
//! #     async fn purge(&self, _: &str) -> Result<(), rssbox::error::SeedboxError> { Ok(()) }
//! #     async fn fetch_file(&self, _: &str, _: &str) -> Result<rssbox::seedbox::FetchedFile, rssbox::error::SeedboxError> { unimplemented!() }
//! # }
//! #
//! # async fn example() -> rssbox::Result<()> {
//! let config = Config::from_env()?;
//! let store = Store::open(&config.database_path).await?;
//!
//! let worker = Worker::new(
//!     store,
//!     config,
//!     Arc::new(MySeedboxClient),
//!     Arc::new(LocalFileHandler::new("./downloads", vec![])),
//!     Arc::new(HttpFeedSource::default()),
//!     Arc::new(DefaultHook),
//! );
//!
//! worker.run(RunModes::process_only()).await
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Account entity and state machine.
pub mod account;
/// Optional read-only control surface.
pub mod api;
/// Worker-process configuration.
pub mod config;
/// Download entity and state machine.
pub mod download;
/// Crate-wide error type and HTTP-status mapping.
pub mod error;
/// RSS/Atom feed ingestion.
pub mod feed;
/// File materialisation and re-upload.
pub mod file_handler;
/// Worker liveness reporting.
pub mod heartbeat;
/// Pluggable policy callbacks.
pub mod hooks;
/// The claim/submit/poll loops.
pub mod orchestrator;
/// Stale-lease reclamation.
pub mod reaper;
/// Generic retry-with-backoff helper.
pub mod retry;
/// Seedbox wire protocol surface.
pub mod seedbox;
/// Store adapter: typed SQLite access with atomic claim primitives.
pub mod store;
/// Torrent content-hash derivation.
pub mod torrent_hash;
/// Core entity identifiers and status enums.
pub mod types;
/// Process-level wiring and CLI run modes.
pub mod worker;

pub use error::{ApiError, DatabaseError, Error, ErrorDetail, Result, ToHttpStatus};
pub use types::{AccountStatus, DownloadId, DownloadStatus, WorkerId};
