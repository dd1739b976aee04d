//! Cache Engine
//!
//! Sits between the HTTP API and the record store and owns everything
//! the service shares between tasks:
//!
//! - the full-log and latest-state views
//! - the store connection
//! - the service counters
//!
//! ```text
//! Reload:      connection → fetch_all → build views aside → swap
//! ApplyUpdate: latest-state view only, last-write-wins on START_TIME
//! ```
//!
//! A store that is down leaves the views untouched. A store that fails
//! the bulk query after connecting empties them: a broken store yields an
//! empty cache rather than a stale one.

use crate::cache::counters::Counters;
use crate::cache::usage::UsageSampler;
use crate::cache::views::{build_views, FullLogView, LatestStateView};
use crate::store::{ConnectionManager, ConnectionState, Connector, DataRecord};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Result of one reload attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Views rebuilt from the store
    Reloaded { rows: usize, latest: usize },
    /// Another reload was already running; nothing was done
    Skipped,
    /// No connection could be established; views unchanged
    Unavailable,
    /// Bulk query failed after connecting; views emptied
    Failed(String),
}

impl ReloadOutcome {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ReloadOutcome::Unavailable)
    }
}

/// The two views, always published together
#[derive(Debug, Clone, Default)]
struct Views {
    full_log: FullLogView,
    latest: LatestStateView,
}

/// Read-through / write-through cache over the record store
pub struct CacheEngine {
    connection: ConnectionManager,
    views: RwLock<Views>,
    counters: Counters,
    usage: Arc<UsageSampler>,
    last_reload: RwLock<Option<DateTime<Utc>>>,
}

impl CacheEngine {
    /// Create an engine with empty views. Nothing connects until the first
    /// reload or write.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connection: ConnectionManager::new(connector),
            views: RwLock::new(Views::default()),
            counters: Counters::new(),
            usage: Arc::new(UsageSampler::new()),
            last_reload: RwLock::new(None),
        }
    }

    /// Repopulate both views from the store.
    ///
    /// Callers must go through `ReloadCoordinator` so that only one reload
    /// runs at a time.
    pub async fn reload(&self) -> ReloadOutcome {
        Arc::clone(&self.usage).sample_blocking().await;

        let Some(handle) = self.connection.ensure_connection().await else {
            tracing::warn!("Reload skipped: store unavailable");
            return ReloadOutcome::Unavailable;
        };

        tracing::debug!("Loading records from store");

        match handle.fetch_all().await {
            Ok(rows) => {
                let (full_log, latest) = build_views(rows);
                let outcome = ReloadOutcome::Reloaded {
                    rows: full_log.len(),
                    latest: latest.len(),
                };

                *self.views.write().await = Views { full_log, latest };
                *self.last_reload.write().await = Some(Utc::now());

                tracing::info!(?outcome, "Reload complete");
                outcome
            }
            Err(e) => {
                tracing::error!(error = %e, "Reload query failed, clearing views");
                self.counters.record_store(false);
                *self.views.write().await = Views::default();
                self.connection.teardown(&handle).await;
                ReloadOutcome::Failed(e.to_string())
            }
        }
    }

    /// Snapshot of the full log, most recent ID first
    pub async fn get_all(&self) -> FullLogView {
        self.views.read().await.full_log.clone()
    }

    /// Snapshot of the latest-state view
    pub async fn get_latest(&self) -> LatestStateView {
        self.views.read().await.latest.clone()
    }

    /// Apply a freshly ingested record to the latest-state view.
    ///
    /// Returns whether the view changed.
    pub async fn apply_update(&self, record: DataRecord) -> bool {
        let key = record.key();
        let applied = self.views.write().await.latest.apply(record);

        if applied {
            tracing::debug!(key = %key, "Latest state updated");
        } else {
            tracing::debug!(key = %key, "Ingested record is not newer, latest state kept");
        }
        applied
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn usage(&self) -> &Arc<UsageSampler> {
        &self.usage
    }

    /// When the views were last rebuilt successfully
    pub async fn last_reload(&self) -> Option<DateTime<Utc>> {
        *self.last_reload.read().await
    }

    /// Close the store connection
    pub async fn shutdown(&self) {
        self.connection.close().await;
    }
}
