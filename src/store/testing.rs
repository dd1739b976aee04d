//! Scripted in-memory store for tests
//!
//! Behaves like the SQLite table (ID-descending reads, upsert by token) and
//! lets a test fail connects, queries or merges on demand, hold bulk queries
//! open, and observe how many bulk queries ran concurrently.

use crate::store::error::{StoreError, StoreResult};
use crate::store::types::{DataRecord, NewRecord};
use crate::store::{Connector, StoreHandle};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Default)]
struct Backend {
    /// (unique token, record) in insertion order
    rows: Mutex<Vec<(String, DataRecord)>>,
    next_id: AtomicUsize,
    fail_connect: AtomicBool,
    fail_query: AtomicBool,
    fail_merge: AtomicBool,
    hold_queries: AtomicBool,
    release: Notify,
    query_started: Notify,
    connects: AtomicUsize,
    closed: AtomicUsize,
    queries: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Handle to the scripted backend shared by a test and its connector
#[derive(Clone, Default)]
pub struct ScriptedStore {
    backend: Arc<Backend>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(ScriptedConnector {
            backend: Arc::clone(&self.backend),
        })
    }

    /// Insert a row directly, bypassing the merge path
    pub fn seed(&self, record: NewRecord) -> i64 {
        let id = self.backend.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        let mut row = record.to_record();
        row.id = Some(id);
        row.last_update = Some(Utc::now());
        self.backend
            .rows
            .lock()
            .unwrap()
            .push((format!("seed-{}", id), row));
        id
    }

    pub fn row_count(&self) -> usize {
        self.backend.rows.lock().unwrap().len()
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.backend.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_query(&self, fail: bool) {
        self.backend.fail_query.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_merge(&self, fail: bool) {
        self.backend.fail_merge.store(fail, Ordering::SeqCst);
    }

    /// Make bulk queries block until `release_query` is called
    pub fn hold_queries(&self, hold: bool) {
        self.backend.hold_queries.store(hold, Ordering::SeqCst);
    }

    /// Let one held bulk query finish
    pub fn release_query(&self) {
        self.backend.release.notify_one();
    }

    /// Wait until a bulk query has started
    pub async fn query_started(&self) {
        self.backend.query_started.notified().await;
    }

    pub fn connect_count(&self) -> usize {
        self.backend.connects.load(Ordering::SeqCst)
    }

    pub fn closed_count(&self) -> usize {
        self.backend.closed.load(Ordering::SeqCst)
    }

    pub fn query_count(&self) -> usize {
        self.backend.queries.load(Ordering::SeqCst)
    }

    pub fn peak_concurrent_queries(&self) -> usize {
        self.backend.peak_in_flight.load(Ordering::SeqCst)
    }
}

struct ScriptedConnector {
    backend: Arc<Backend>,
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> StoreResult<Arc<dyn StoreHandle>> {
        self.backend.connects.fetch_add(1, Ordering::SeqCst);
        if self.backend.fail_connect.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("scripted connect failure".to_string()));
        }
        Ok(Arc::new(ScriptedHandle {
            backend: Arc::clone(&self.backend),
            closed: AtomicBool::new(false),
        }))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

struct ScriptedHandle {
    backend: Arc<Backend>,
    closed: AtomicBool,
}

#[async_trait]
impl StoreHandle for ScriptedHandle {
    async fn fetch_all(&self) -> StoreResult<Vec<DataRecord>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection closed".to_string()));
        }

        let backend = &self.backend;
        backend.queries.fetch_add(1, Ordering::SeqCst);
        let now = backend.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        backend.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        backend.query_started.notify_one();

        if backend.hold_queries.load(Ordering::SeqCst) {
            backend.release.notified().await;
        } else {
            tokio::task::yield_now().await;
        }

        backend.in_flight.fetch_sub(1, Ordering::SeqCst);

        if backend.fail_query.load(Ordering::SeqCst) {
            return Err(StoreError::Query("scripted query failure".to_string()));
        }

        let rows = backend.rows.lock().unwrap();
        let mut records: Vec<DataRecord> = rows.iter().map(|(_, r)| r.clone()).collect();
        records.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(records)
    }

    async fn merge(&self, record: &NewRecord, unique_token: &str) -> StoreResult<u64> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection closed".to_string()));
        }
        if self.backend.fail_merge.load(Ordering::SeqCst) {
            return Err(StoreError::Merge("scripted merge failure".to_string()));
        }

        let mut rows = self.backend.rows.lock().unwrap();
        let mut row = record.to_record();
        row.last_update = Some(Utc::now());

        if let Some((_, existing)) = rows.iter_mut().find(|(t, _)| t == unique_token) {
            row.id = existing.id;
            *existing = row;
        } else {
            let id = self.backend.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
            row.id = Some(id);
            rows.push((unique_token.to_string(), row));
        }
        Ok(1)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.backend.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
