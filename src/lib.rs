//! # FMIACP
//!
//! Machine-status event service: field devices post discrete signal
//! events (parking brake, collision-zone sensors), the service persists
//! them and serves dashboards two cached views, the full historical log
//! and the latest state per (machine, signal type).
//!
//! ## Modules
//!
//! - [`store`]: Record types, store traits, SQLite backend, connection lifecycle
//! - [`cache`]: Cached views, reload engine, single-flight coordinator, counters
//! - [`ingest`]: Event validation and the write path
//! - [`api`]: REST API server with Axum and Basic auth
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fmiacp::cache::{CacheEngine, ReloadCoordinator};
//! use fmiacp::ingest::IngestPath;
//! use fmiacp::store::{NewRecord, SqliteConnector};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = Arc::new(CacheEngine::new(Arc::new(SqliteConnector::new("fmiacp.db"))));
//!     let coordinator = ReloadCoordinator::new(Arc::clone(&engine));
//!
//!     // Write one event
//!     let ingest = IngestPath::new(Arc::clone(&engine));
//!     let stored = ingest.ingest(NewRecord::new("M1", "PARKING_BRAKE").value("1")).await;
//!     println!("stored: {}", stored);
//!
//!     // Reload and read both views
//!     coordinator.trigger().await;
//!     println!("{} rows, {} keys", engine.get_all().await.len(), engine.get_latest().await.len());
//!
//!     engine.shutdown().await;
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod ingest;
pub mod store;

// Re-export top-level types for convenience
pub use store::{
    ConnectionManager, ConnectionState, Connector, DataRecord, NewRecord, RecordKey,
    SqliteConnector, StoreError, StoreHandle, StoreResult,
};

pub use cache::{
    CacheEngine, CounterSnapshot, Counters, FullLogView, LatestStateView, ReloadCoordinator,
    ReloadOutcome,
};

pub use ingest::{IngestError, IngestPath, RawEvent};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use config::{
    ApiConfig as ConfigApiConfig, AuthConfig, CacheConfig, Config, ConfigError, ConfigOrigin,
    Credential, LoggingConfig, StoreConfig,
};
