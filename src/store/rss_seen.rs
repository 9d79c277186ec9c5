//! Seen-set for the RSS collaborator (§6): `(feed_url, entry_id)` dedup,
//! owned by the store rather than the feed source so it survives restarts.

use super::{now_ts, Store};
use crate::error::DatabaseError;
use crate::Error;

impl Store {
    /// Returns `true` if `(feed_url, entry_id)` has already been recorded.
    pub async fn rss_entry_seen(&self, feed_url: &str, entry_id: &str) -> crate::Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM rss_seen WHERE feed_url = ? AND entry_id = ?")
                .bind(feed_url)
                .bind(entry_id)
                .fetch_optional(self.pool())
                .await
                .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(row.is_some())
    }

    /// Record `(feed_url, entry_id)` as seen.
    pub async fn mark_rss_entry_seen(&self, feed_url: &str, entry_id: &str) -> crate::Result<()> {
        sqlx::query(
            "INSERT INTO rss_seen (feed_url, entry_id, seen_at) VALUES (?, ?, ?)
             ON CONFLICT(feed_url, entry_id) DO NOTHING",
        )
        .bind(feed_url)
        .bind(entry_id)
        .bind(now_ts())
        .execute(self.pool())
        .await
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn entries_are_deduped_per_feed() {
        let store = Store::open_in_memory().await.unwrap();
        assert!(!store.rss_entry_seen("feed-a", "1").await.unwrap());
        store.mark_rss_entry_seen("feed-a", "1").await.unwrap();
        assert!(store.rss_entry_seen("feed-a", "1").await.unwrap());
        assert!(!store.rss_entry_seen("feed-b", "1").await.unwrap());
    }
}
