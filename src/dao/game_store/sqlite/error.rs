//! Error types shared by the SQLite storage implementation.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result alias returning [`SqliteDaoError`] failures.
pub type SqliteResult<T> = Result<T, SqliteDaoError>;

/// Failures that can occur while interacting with SQLite.
#[derive(Debug, Error)]
pub enum SqliteDaoError {
    /// The parent directory of the database file could not be created.
    #[error("failed to prepare database directory for `{path}`")]
    PrepareDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Opening the database connection failed.
    #[error("failed to open SQLite database `{path}`")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    /// A schema migration could not be applied.
    #[error("failed to apply migration {version} ({description})")]
    Migration {
        version: u32,
        description: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    /// A statement failed while running the named operation.
    #[error("SQLite operation `{operation}` failed")]
    Query {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    /// A previous holder of the connection panicked.
    #[error("SQLite connection mutex poisoned")]
    Poisoned,
    /// The blocking worker running the statement did not complete.
    #[error("SQLite worker for `{operation}` failed")]
    Worker {
        operation: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}
