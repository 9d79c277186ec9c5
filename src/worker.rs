//! Process-level wiring (spec §4.10): groups every collaborator a worker
//! needs and supervises the background tasks plus the two orchestrator
//! loops, with cooperative shutdown.
//!
//! Grounded on the teacher's `UsenetDownloader` (`downloader/lifecycle.rs`,
//! `downloader/background_tasks.rs`): one struct owning the shared
//! collaborators, a `run`/`shutdown` pair driven by an `Arc<AtomicBool>`
//! flag, and `JoinHandle`s awaited on the way out rather than detached.

use crate::config::Config;
use crate::feed::FeedSource;
use crate::file_handler::FileHandler;
use crate::heartbeat::Heartbeat;
use crate::hooks::Hook;
use crate::orchestrator::Orchestrator;
use crate::reaper::Reaper;
use crate::seedbox::SeedboxClient;
use crate::store::Store;
use crate::types::WorkerId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Which loops a worker process runs, mirroring the CLI's
/// `--rss-only`/`--download-only`/`--upload-only`/`--process-only` flags.
/// The heartbeat and reaper always run regardless of mode — every worker,
/// whatever work it performs, must be visible to the reaper.
#[derive(Debug, Clone, Copy)]
pub struct RunModes {
    pub rss: bool,
    pub download: bool,
    pub upload: bool,
}

impl RunModes {
    pub fn rss_only() -> Self {
        Self {
            rss: true,
            download: false,
            upload: false,
        }
    }

    pub fn download_only() -> Self {
        Self {
            rss: false,
            download: true,
            upload: false,
        }
    }

    pub fn upload_only() -> Self {
        Self {
            rss: false,
            download: false,
            upload: true,
        }
    }

    /// Default mode: both orchestrator loops, no RSS polling.
    pub fn process_only() -> Self {
        Self {
            rss: false,
            download: true,
            upload: true,
        }
    }
}

/// Groups the collaborators a worker process needs for its lifetime:
/// the store, the hook policy, and the seedbox/file-handler/feed-source
/// implementations a deployment plugs in.
pub struct Worker {
    store: Store,
    worker_id: WorkerId,
    config: Config,
    seedbox: Arc<dyn SeedboxClient>,
    file_handler: Arc<dyn FileHandler>,
    feed_source: Arc<dyn FeedSource>,
    hook: Arc<dyn Hook>,
    /// Fetches `.torrent` payloads for `http(s)://` download URLs (§6); a
    /// single client is reused across every submit so connections pool.
    http_client: reqwest::Client,
    shutting_down: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(
        store: Store,
        config: Config,
        seedbox: Arc<dyn SeedboxClient>,
        file_handler: Arc<dyn FileHandler>,
        feed_source: Arc<dyn FeedSource>,
        hook: Arc<dyn Hook>,
    ) -> Self {
        let worker_id = config
            .worker_id
            .clone()
            .map(WorkerId::from)
            .unwrap_or_else(WorkerId::generate);

        Self {
            store,
            worker_id,
            config,
            seedbox,
            file_handler,
            feed_source,
            hook,
            http_client: reqwest::Client::new(),
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    /// Flip the shutdown flag; every loop below observes it between
    /// iterations and the cancellation token stops the background tasks.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Run every task `modes` calls for, until shutdown. Spawns the
    /// heartbeat, reaper, and (if enabled) RSS-poll tasks as background
    /// `JoinHandle`s, then alternates the orchestrator loops inline on the
    /// calling task; all handles are awaited before returning so no task is
    /// left detached at process exit.
    pub async fn run(&self, modes: RunModes) -> crate::Result<()> {
        info!(worker_id = %self.worker_id, ?modes, "worker starting");

        let cancel = CancellationToken::new();

        let heartbeat = Heartbeat::new(
            self.store.clone(),
            self.worker_id.clone(),
            self.config.heartbeat_interval,
        );
        let heartbeat_handle = tokio::spawn(heartbeat.run(cancel.child_token()));

        let reaper = Reaper::new(
            self.store.clone(),
            self.config.reaper_interval,
            self.config.heartbeat_interval * 2,
        );
        let reaper_handle = tokio::spawn(reaper.run(cancel.child_token()));

        let rss_handle = if modes.rss {
            Some(tokio::spawn(self.run_rss_loop(cancel.child_token())))
        } else {
            None
        };

        if modes.download || modes.upload {
            self.run_orchestrator_loop(modes).await;
        }

        cancel.cancel();
        let _ = heartbeat_handle.await;
        let _ = reaper_handle.await;
        if let Some(handle) = rss_handle {
            let _ = handle.await;
        }

        info!(worker_id = %self.worker_id, "worker stopped");
        Ok(())
    }

    /// Alternates `start_downloads`/`check_downloads` (only the ones
    /// `modes` enables) until shutdown is requested, sleeping briefly
    /// between passes that found nothing to do.
    async fn run_orchestrator_loop(&self, modes: RunModes) {
        let orchestrator = Orchestrator {
            store: &self.store,
            seedbox: self.seedbox.as_ref(),
            file_handler: self.file_handler.as_ref(),
            hook: self.hook.as_ref(),
            config: &self.config,
            worker_id: self.worker_id.as_str(),
            http_client: &self.http_client,
        };

        while !self.shutting_down.load(Ordering::SeqCst) {
            let mut did_work = false;

            if modes.download {
                match orchestrator.start_downloads().await {
                    Ok(n) => did_work |= n > 0,
                    Err(e) => warn!(error = %e, "start_downloads pass failed"),
                }
            }

            if modes.upload {
                match orchestrator.check_downloads().await {
                    Ok(n) => did_work |= n > 0,
                    Err(e) => warn!(error = %e, "check_downloads pass failed"),
                }
            }

            if !did_work {
                tokio::time::sleep(Duration::from_secs(3)).await;
            }
        }
    }

    /// Polls every configured feed URL on a fixed interval until cancelled.
    async fn run_rss_loop(&self, cancel: CancellationToken) {
        if self.config.rss_urls.is_empty() {
            warn!("rss-only mode requested but no RSS_URLS configured");
        }

        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for feed_url in &self.config.rss_urls {
                        match crate::feed::poll_feed(&self.store, self.feed_source.as_ref(), self.hook.as_ref(), feed_url).await {
                            Ok(submitted) if submitted > 0 => {
                                info!(feed_url, submitted, "polled feed");
                            }
                            Ok(_) => {}
                            Err(e) => warn!(feed_url, error = %e, "feed poll failed"),
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!("rss loop stopping");
                    break;
                }
            }
        }
    }
}

/// Waits for a termination signal, mirroring the teacher's `wait_for_signal`
/// (`lib.rs`): SIGTERM/SIGINT on unix, `ctrl_c` elsewhere.
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM"),
                _ = sigint.recv() => info!("received SIGINT"),
            }
        }
        (Err(e), _) => {
            warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                info!("received SIGINT");
            } else {
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                info!("received SIGTERM");
            } else {
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
pub async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
    } else {
        info!("received Ctrl+C");
    }
}

/// Runs `worker` until a termination signal arrives, then requests
/// shutdown. Mirrors the teacher's `run_with_shutdown`.
pub async fn run_with_shutdown(worker: Arc<Worker>, modes: RunModes) -> crate::Result<()> {
    let worker_for_signal = worker.clone();
    let signal_task = tokio::spawn(async move {
        wait_for_signal().await;
        worker_for_signal.shutdown();
    });

    let result = worker.run(modes).await;
    signal_task.abort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_handler::LocalFileHandler;
    use crate::hooks::DefaultHook;
    use crate::seedbox::test_support::FakeSeedboxClient;

    struct NoFeeds;

    #[async_trait::async_trait]
    impl FeedSource for NoFeeds {
        async fn fetch(&self, _feed_url: &str) -> crate::Result<Vec<crate::feed::FeedEntry>> {
            Ok(vec![])
        }
    }

    fn test_worker(store: Store, config: Config) -> Worker {
        Worker::new(
            store,
            config,
            Arc::new(FakeSeedboxClient::default()),
            Arc::new(LocalFileHandler::new("/tmp/rssbox-worker-test", vec![])),
            Arc::new(NoFeeds),
            Arc::new(DefaultHook),
        )
    }

    #[tokio::test]
    async fn run_stops_promptly_when_shutdown_flag_is_already_set() {
        let store = Store::open_in_memory().await.unwrap();
        let config = Config {
            heartbeat_interval: Duration::from_millis(20),
            reaper_interval: Duration::from_millis(20),
            ..Config::default()
        };
        let worker = test_worker(store, config);
        worker.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(2), worker.run(RunModes::process_only())).await;
        assert!(result.is_ok(), "run() should return promptly once shutdown is requested before starting");
    }

    #[test]
    fn run_modes_match_cli_flags() {
        assert!(RunModes::rss_only().rss);
        assert!(RunModes::download_only().download);
        assert!(!RunModes::download_only().upload);
        assert!(RunModes::upload_only().upload);
        let process = RunModes::process_only();
        assert!(process.download && process.upload && !process.rss);
    }
}
