//! FMIACP Record Store
//!
//! The persistent side of the service:
//!
//! - **types**: DataRecord, NewRecord, RecordKey
//! - **sqlite**: SQLite-backed record table with a merge upsert
//! - **connection**: Lazily opened, torn-down-on-error connection handle
//! - **error**: Error types
//!
//! # Contract
//!
//! ```text
//! Connector::connect   → StoreHandle
//! StoreHandle::fetch_all → every row, ID descending
//! StoreHandle::merge     → insert-or-update keyed by unique token
//! ```
//!
//! The cache engine only ever talks to the store through these two traits,
//! so tests can substitute a scripted backend.

pub mod connection;
pub mod error;
pub mod sqlite;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{ConnectionManager, ConnectionState};
pub use error::{StoreError, StoreResult};
pub use sqlite::{SqliteConnector, SqliteHandle};
pub use types::{DataRecord, NewRecord, RecordKey};

use async_trait::async_trait;
use std::sync::Arc;

/// Opens connections to the persistent store
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a new connection
    async fn connect(&self) -> StoreResult<Arc<dyn StoreHandle>>;

    /// Human-readable description of the target, for logs
    fn describe(&self) -> String;
}

/// An open connection to the persistent store
#[async_trait]
pub trait StoreHandle: Send + Sync {
    /// Read every record, ordered by ID descending
    async fn fetch_all(&self) -> StoreResult<Vec<DataRecord>>;

    /// Insert or update the row identified by `unique_token`.
    ///
    /// Returns the number of rows affected.
    async fn merge(&self, record: &NewRecord, unique_token: &str) -> StoreResult<u64>;

    /// Release the connection. Further calls fail with `Unavailable`.
    async fn close(&self);
}
