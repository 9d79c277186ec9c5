//! Store adapter (spec §4.1): thin, typed access over SQLite with an atomic
//! find-and-update primitive. All entity state transitions go through this
//! module; the entity types in [`crate::download`] and [`crate::account`]
//! are thin wrappers that call back into it.

mod accounts;
mod downloads;
mod migrations;
mod rss_seen;
mod workers;

pub use accounts::AccountRow;
pub use downloads::DownloadRow;
pub use workers::WorkerRow;

use sqlx::SqlitePool;

/// Handle to the shared SQLite database. Cheap to clone (wraps a pool);
/// process-scoped, constructed once at startup (§9 "Global state").
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) and migrate the database at `path`.
    pub async fn open(path: &std::path::Path) -> crate::Result<Self> {
        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
        use std::str::FromStr;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(|e| {
                crate::Error::Database(crate::error::DatabaseError::ConnectionFailed(
                    e.to_string(),
                ))
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                crate::Error::Database(crate::error::DatabaseError::ConnectionFailed(
                    e.to_string(),
                ))
            })?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open an in-memory database, used by tests.
    #[cfg(test)]
    pub async fn open_in_memory() -> crate::Result<Self> {
        use sqlx::sqlite::SqlitePoolOptions;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                crate::Error::Database(crate::error::DatabaseError::ConnectionFailed(
                    e.to_string(),
                ))
            })?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the underlying connection pool.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Current unix-epoch-seconds clock, factored out so tests can't drift
/// between the "now" the test harness computed and the "now" a query used.
pub(crate) fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_runs_migrations() {
        let store = Store::open_in_memory().await.expect("open");
        // schema_version table should exist and report the latest version.
        let row: (i64,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
            .fetch_one(store.pool())
            .await
            .expect("query schema_version");
        assert!(row.0 >= 1);
    }
}
