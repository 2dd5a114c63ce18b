// ABOUTME: Storage error types with SNAFU pattern.
// ABOUTME: Wraps sqlx failures and corrupt persisted values for programmatic handling.

use snafu::Snafu;

use crate::error::ErrorKind;

/// Failures talking to, or reading back from, the database.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(display("failed to open database {url}: {source}"))]
    Connect { url: String, source: sqlx::Error },

    #[snafu(display("schema migration failed: {source}"))]
    Migrate { source: sqlx::Error },

    #[snafu(display("database query failed: {source}"))]
    Query { source: sqlx::Error },

    #[snafu(display("corrupt {table}.{column} value {value:?}"))]
    Corrupt {
        table: &'static str,
        column: &'static str,
        value: String,
    },
}

impl StoreError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Connect { .. } | StoreError::Migrate { .. } => ErrorKind::Storage,
            StoreError::Query { source } if is_contention(source) => {
                ErrorKind::ConcurrencyConflict
            }
            StoreError::Query { .. } => ErrorKind::Storage,
            StoreError::Corrupt { .. } => ErrorKind::Format,
        }
    }

    /// Whether the failure is SQLite lock contention (another writer won).
    pub fn is_contention(&self) -> bool {
        matches!(self, StoreError::Query { source } if is_contention(source))
    }
}

/// SQLITE_BUSY and SQLITE_LOCKED, including their extended codes.
pub(crate) fn is_contention(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = err else {
        return false;
    };
    db.code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, 5 | 6))
}
