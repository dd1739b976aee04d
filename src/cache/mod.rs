//! FMIACP Cache Engine
//!
//! In-memory views over the record store and the machinery that keeps
//! them fresh:
//!
//! - **views**: Full-log and latest-state snapshots
//! - **engine**: Reload / read / last-write-wins update
//! - **coordinator**: Single-flight reload trigger and periodic timer
//! - **counters**: Service counters for the status endpoint
//! - **usage**: Process CPU and memory sampling
//!
//! # Architecture
//!
//! ```text
//! Read Path:
//!   timer tick or GET → ReloadCoordinator → CacheEngine::reload
//!     → ConnectionManager → fetch_all → build views → swap → serialize
//!
//! Write Path:
//!   POST → IngestPath → merge upsert → CacheEngine::apply_update
//! ```

pub mod coordinator;
pub mod counters;
pub mod engine;
pub mod usage;
pub mod views;

pub use coordinator::ReloadCoordinator;
pub use counters::{CounterSnapshot, Counters};
pub use engine::{CacheEngine, ReloadOutcome};
pub use usage::{CpuUsage, MemoryUsage, UsageSampler};
pub use views::{build_views, FullLogView, LatestStateView};
