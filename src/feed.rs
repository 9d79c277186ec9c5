//! RSS/Atom feed ingestion (spec §6, Non-goal: the fetcher/deduplicator is
//! an external collaborator interface). Parsing is grounded on the
//! teacher's `rss_manager/mod.rs` (RSS-then-Atom fallback, the same
//! `rss`/`atom_syndication` crates); entry dedup is owned by the store's
//! `rss_seen` table rather than an in-memory set so it survives restarts.

use crate::store::Store;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// One feed item, already normalised across RSS/Atom.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub feed_url: String,
    pub entry_id: String,
    pub title: String,
    pub download_url: String,
    pub published: Option<DateTime<Utc>>,
}

/// Produces feed entries for ingestion into the Download queue. This
/// crate ships only an HTTP RSS/Atom implementation; other sources
/// (a Telegram channel, a local directory watch) are reasonable `FeedSource`
/// implementations a deployment can supply.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse all entries currently published on the feed. Does
    /// not filter against what has been seen before — callers combine this
    /// with [`Store::rss_entry_seen`].
    async fn fetch(&self, feed_url: &str) -> crate::Result<Vec<FeedEntry>>;
}

/// `FeedSource` backed by plain HTTP RSS/Atom polling.
pub struct HttpFeedSource {
    client: reqwest::Client,
}

impl HttpFeedSource {
    pub fn new() -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("rssbox feed reader")
            .build()
            .map_err(crate::Error::Network)?;
        Ok(Self { client })
    }
}

impl Default for HttpFeedSource {
    fn default() -> Self {
        // a client builder only fails on TLS backend init, which the
        // default build can't trigger
        Self::new().unwrap_or_else(|_| Self {
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait::async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, feed_url: &str) -> crate::Result<Vec<FeedEntry>> {
        debug!(feed_url, "fetching feed");
        let response = self
            .client
            .get(feed_url)
            .send()
            .await
            .map_err(crate::Error::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(crate::Error::Other(format!(
                "feed {feed_url} returned HTTP {status}"
            )));
        }

        let content = response.text().await.map_err(crate::Error::Network)?;

        match parse_rss(feed_url, &content) {
            Ok(entries) => Ok(entries),
            Err(rss_err) => match parse_atom(feed_url, &content) {
                Ok(entries) => Ok(entries),
                Err(atom_err) => {
                    warn!(feed_url, %rss_err, %atom_err, "feed matched neither RSS nor Atom");
                    Err(crate::Error::Other(format!(
                        "failed to parse {feed_url} as RSS ({rss_err}) or Atom ({atom_err})"
                    )))
                }
            },
        }
    }
}

fn parse_rss(feed_url: &str, content: &str) -> crate::Result<Vec<FeedEntry>> {
    let channel = content
        .parse::<rss::Channel>()
        .map_err(|e| crate::Error::Other(e.to_string()))?;

    Ok(channel
        .items()
        .iter()
        .filter_map(|item| {
            let download_url = item
                .enclosure()
                .map(|enc| enc.url().to_string())
                .or_else(|| item.link().map(|l| l.to_string()))?;
            let entry_id = item
                .guid()
                .map(|g| g.value().to_string())
                .unwrap_or_else(|| download_url.clone());
            let published = item.pub_date().and_then(|d| {
                DateTime::parse_from_rfc2822(d).ok().map(|dt| dt.with_timezone(&Utc))
            });
            Some(FeedEntry {
                feed_url: feed_url.to_string(),
                entry_id,
                title: item.title().unwrap_or_default().to_string(),
                download_url,
                published,
            })
        })
        .collect())
}

fn parse_atom(feed_url: &str, content: &str) -> crate::Result<Vec<FeedEntry>> {
    let feed = atom_syndication::Feed::read_from(content.as_bytes())
        .map_err(|e| crate::Error::Other(e.to_string()))?;

    Ok(feed
        .entries()
        .iter()
        .filter_map(|entry| {
            let download_url = entry.links().first().map(|l| l.href().to_string())?;
            let published = entry
                .published()
                .or_else(|| Some(entry.updated()))
                .map(|dt| dt.with_timezone(&Utc));
            Some(FeedEntry {
                feed_url: feed_url.to_string(),
                entry_id: entry.id().to_string(),
                title: entry.title().as_str().to_string(),
                download_url,
                published,
            })
        })
        .collect())
}

/// Poll `feed_url` once and submit every not-yet-seen entry as a Download,
/// marking each as seen regardless of whether the hook accepts it (§4.9
/// `on_new_entry` decides keep/drop, not re-delivery).
pub async fn poll_feed(
    store: &Store,
    source: &dyn FeedSource,
    hook: &dyn crate::hooks::Hook,
    feed_url: &str,
) -> crate::Result<usize> {
    let entries = source.fetch(feed_url).await?;
    let mut submitted = 0;

    for entry in entries {
        if store.rss_entry_seen(&entry.feed_url, &entry.entry_id).await? {
            continue;
        }
        store.mark_rss_entry_seen(&entry.feed_url, &entry.entry_id).await?;

        let Some(entry) = hook.on_new_entry(entry).await else {
            continue;
        };

        crate::download::Download::create(store, &entry.title, &entry.download_url).await?;
        submitted += 1;
    }

    Ok(submitted)
}
