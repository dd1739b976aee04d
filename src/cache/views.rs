//! In-memory views over the record store
//!
//! Both views are immutable snapshots behind an `Arc`. A reload builds
//! fresh views off to the side and publishes them in one swap; readers
//! holding an older snapshot keep iterating it undisturbed.
//!
//! The latest-state view is the only one updated incrementally, through
//! copy-on-write in [`LatestStateView::apply`].

use crate::store::{DataRecord, RecordKey};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

/// Every known record, most recent store ID first
#[derive(Debug, Clone, Default)]
pub struct FullLogView {
    records: Arc<Vec<Arc<DataRecord>>>,
}

impl FullLogView {
    /// Build from rows in store order (ID descending)
    pub fn from_rows(rows: Vec<Arc<DataRecord>>) -> Self {
        Self {
            records: Arc::new(rows),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate in stored order. Can be called any number of times.
    pub fn iter(&self) -> impl Iterator<Item = &DataRecord> + '_ {
        self.records.iter().map(|r| r.as_ref())
    }
}

/// Most current record per `(machine, signal type)`
#[derive(Debug, Clone, Default)]
pub struct LatestStateView {
    entries: Arc<HashMap<RecordKey, Arc<DataRecord>>>,
}

impl LatestStateView {
    /// Rebuild from scratch: keep the record with the greatest start time
    /// per key. On equal start times the first-seen row stays.
    pub fn from_rows(rows: &[Arc<DataRecord>]) -> Self {
        let mut entries: HashMap<RecordKey, Arc<DataRecord>> = HashMap::new();

        for row in rows {
            match entries.entry(row.key()) {
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(row));
                }
                Entry::Occupied(mut slot) => {
                    if row.is_newer_than(slot.get()) {
                        slot.insert(Arc::clone(row));
                    }
                }
            }
        }

        Self {
            entries: Arc::new(entries),
        }
    }

    /// Last-write-wins update. Inserts an unseen key, replaces an existing
    /// entry only when `record` has a strictly later start time.
    ///
    /// Returns whether the view changed.
    pub fn apply(&mut self, record: DataRecord) -> bool {
        let key = record.key();

        if let Some(current) = self.entries.get(&key) {
            if !record.is_newer_than(current) {
                return false;
            }
        }

        Arc::make_mut(&mut self.entries).insert(key, Arc::new(record));
        true
    }

    pub fn get(&self, key: &RecordKey) -> Option<&DataRecord> {
        self.entries.get(key).map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate current entries, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &DataRecord> + '_ {
        self.entries.values().map(|r| r.as_ref())
    }
}

/// Build both views from one bulk query result
pub fn build_views(rows: Vec<DataRecord>) -> (FullLogView, LatestStateView) {
    let rows: Vec<Arc<DataRecord>> = rows.into_iter().map(Arc::new).collect();
    let latest = LatestStateView::from_rows(&rows);
    (FullLogView::from_rows(rows), latest)
}
