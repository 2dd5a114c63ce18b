// ABOUTME: SQLite-backed persistent store shared by the build queue and rollout orchestrator.
// ABOUTME: Opens the connection pool and applies the embedded schema.

mod error;

pub use error::{ConnectSnafu, CorruptSnafu, MigrateSnafu, QuerySnafu, StoreError};
pub(crate) use error::is_contention;

use snafu::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

const SCHEMA: &str = include_str!("schema.sql");

/// Handle to the control-plane database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `url`, e.g. `sqlite:///var/lib/shipyard/state.db`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .context(ConnectSnafu { url })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .context(ConnectSnafu { url })?;

        tracing::debug!(url, max_connections, "opened database");
        Ok(Self { pool })
    }

    /// A private in-memory database with the schema applied.
    ///
    /// Pinned to a single connection that never expires: every SQLite
    /// connection to `:memory:` is a separate database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let url = "sqlite::memory:";
        let options = SqliteConnectOptions::from_str(url)
            .context(ConnectSnafu { url })?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context(ConnectSnafu { url })?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Apply the schema. Idempotent.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .context(MigrateSnafu)?;
        tracing::debug!("schema applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
