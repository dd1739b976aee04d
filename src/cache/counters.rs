//! Process-lifetime service counters
//!
//! Monotonic, lock-free, reset only by restarting the process.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals reported by the status endpoint
#[derive(Debug, Default)]
pub struct Counters {
    store_success: AtomicU64,
    store_failure: AtomicU64,
    input: AtomicU64,
    input_requests: AtomicU64,
    output: AtomicU64,
    output_requests: AtomicU64,
}

/// Point-in-time copy of [`Counters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub store_success: u64,
    pub store_failure: u64,
    pub input: u64,
    pub input_requests: u64,
    pub output: u64,
    pub output_requests: u64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one store write (merge) or failed store call
    pub fn record_store(&self, success: bool) {
        if success {
            self.store_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.store_failure.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_input_request(&self) {
        self.input_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_input(&self) {
        self.input.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_output_request(&self) {
        self.output_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_output(&self, records: usize) {
        self.output.fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            store_success: self.store_success.load(Ordering::Relaxed),
            store_failure: self.store_failure.load(Ordering::Relaxed),
            input: self.input.load(Ordering::Relaxed),
            input_requests: self.input_requests.load(Ordering::Relaxed),
            output: self.output.load(Ordering::Relaxed),
            output_requests: self.output_requests.load(Ordering::Relaxed),
        }
    }
}
