//! Common error types for the learning-record services

use thiserror::Error;

/// Common result type for LRS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across LRS services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding of stored payloads
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Write rejected because it contradicts an existing record
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether retrying the same operation later can succeed.
    ///
    /// Covers SQLite busy/locked conditions, pool exhaustion and I/O
    /// failures. Validation, conflict and not-found errors are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            #[cfg(feature = "sqlx")]
            Error::Database(err) => is_transient_sqlx(err),
            Error::Io(_) => true,
            _ => false,
        }
    }
}

#[cfg(feature = "sqlx")]
fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db_err) => {
            // SQLITE_BUSY (5) and SQLITE_LOCKED (6), including extended codes
            let primary = db_err
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| code & 0xff);
            matches!(primary, Some(5) | Some(6))
                || db_err.message().contains("database is locked")
        }
        _ => false,
    }
}
