//! Store error types
//!
//! Defines all errors that can occur talking to the persistent record store.

use thiserror::Error;

/// Errors that can occur in the store layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// No connection could be established
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Bulk read failed on an open connection
    #[error("Query failed: {0}")]
    Query(String),

    /// Merge upsert failed or affected no rows
    #[error("Merge failed: {0}")]
    Merge(String),

    /// SQLite driver error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Blocking store task did not complete
    #[error("Store task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Task(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
