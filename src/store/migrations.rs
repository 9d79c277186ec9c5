//! Versioned schema migrations, following the teacher's
//! `db::migrations::run_migrations` idiom: a `schema_version` table records
//! the highest applied version; each `migrate_vN` runs in an explicit
//! transaction.

use super::Store;
use crate::error::DatabaseError;
use crate::Error;

impl Store {
    pub(crate) async fn run_migrations(&self) -> crate::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(DatabaseError::MigrationFailed(e.to_string())))?;

        let current: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| Error::Database(DatabaseError::MigrationFailed(e.to_string())))?;

        if current < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    async fn migrate_v1(&self) -> crate::Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(DatabaseError::MigrationFailed(e.to_string())))?;

        sqlx::query(
            "CREATE TABLE downloads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                status INTEGER NOT NULL DEFAULT 0,
                hash TEXT,
                locked_by TEXT,
                retries INTEGER NOT NULL DEFAULT 0,
                expire_at INTEGER
            )",
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(DatabaseError::MigrationFailed(e.to_string())))?;

        sqlx::query("CREATE INDEX idx_downloads_status ON downloads(status)")
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(DatabaseError::MigrationFailed(e.to_string())))?;

        sqlx::query(
            "CREATE TABLE accounts (
                id TEXT PRIMARY KEY,
                password TEXT NOT NULL,
                token TEXT,
                priority INTEGER NOT NULL DEFAULT 0,
                status INTEGER NOT NULL DEFAULT 0,
                download_id INTEGER,
                locked_by TEXT,
                added_at INTEGER,
                last_checked_at INTEGER,
                last_used_at INTEGER
            )",
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(DatabaseError::MigrationFailed(e.to_string())))?;

        sqlx::query("CREATE INDEX idx_accounts_status ON accounts(status)")
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(DatabaseError::MigrationFailed(e.to_string())))?;

        sqlx::query(
            "CREATE TABLE workers (
                id TEXT PRIMARY KEY,
                last_heartbeat INTEGER NOT NULL
            )",
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(DatabaseError::MigrationFailed(e.to_string())))?;

        sqlx::query(
            "CREATE TABLE rss_seen (
                feed_url TEXT NOT NULL,
                entry_id TEXT NOT NULL,
                seen_at INTEGER NOT NULL,
                PRIMARY KEY (feed_url, entry_id)
            )",
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(DatabaseError::MigrationFailed(e.to_string())))?;

        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (1, strftime('%s','now'))")
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(DatabaseError::MigrationFailed(e.to_string())))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(DatabaseError::MigrationFailed(e.to_string())))?;

        Ok(())
    }
}
