//! Core record types for the FMIACP store and cache
//!
//! - `DataRecord`: one machine-signal observation, as loaded from the store
//! - `NewRecord`: a validated observation that has not been persisted yet
//! - `RecordKey`: the `(machine, signal type)` pair the latest-state view is keyed by

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single machine-signal observation
///
/// Field names follow the store's column names so the JSON served to
/// dashboards is the same shape the table has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRecord {
    /// Store-assigned identifier, absent until the record has been loaded back
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "MACHINE_NAME")]
    pub machine_name: String,
    /// Event time with the offset the device reported
    #[serde(rename = "START_TIME")]
    pub start_time: Option<DateTime<FixedOffset>>,
    #[serde(rename = "CATEGORY")]
    pub category: Option<String>,
    #[serde(rename = "TYPE")]
    pub signal_type: String,
    #[serde(rename = "MEASUREMENT")]
    pub measurement: Option<String>,
    /// Textual value, typically "0" or "1"
    #[serde(rename = "VALUE")]
    pub value: Option<String>,
    /// Last time the store inserted or merged this row
    #[serde(
        rename = "LAST_UPDATE",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_update: Option<DateTime<Utc>>,
}

impl DataRecord {
    /// Key this record is tracked under in the latest-state view
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.machine_name, &self.signal_type)
    }

    /// True when this record's start time is strictly later than `other`'s.
    ///
    /// A missing start time orders before any real one, so a timestamped
    /// record always supersedes an untimed one and two untimed records
    /// never supersede each other.
    pub fn is_newer_than(&self, other: &DataRecord) -> bool {
        self.start_time > other.start_time
    }

    /// Value of a field by its column name, used by read filters
    pub fn field(&self, column: &str) -> Option<&str> {
        match column {
            "MACHINE_NAME" => Some(&self.machine_name),
            "TYPE" => Some(&self.signal_type),
            "CATEGORY" => self.category.as_deref(),
            "MEASUREMENT" => self.measurement.as_deref(),
            "VALUE" => self.value.as_deref(),
            _ => None,
        }
    }
}

/// A validated observation waiting to be written through the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub machine_name: String,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub category: Option<String>,
    pub signal_type: String,
    pub measurement: Option<String>,
    pub value: Option<String>,
}

impl NewRecord {
    /// Create a record with only the key fields set
    pub fn new(machine_name: impl Into<String>, signal_type: impl Into<String>) -> Self {
        Self {
            machine_name: machine_name.into(),
            start_time: None,
            category: None,
            signal_type: signal_type.into(),
            measurement: None,
            value: None,
        }
    }

    /// Builder method: set start time
    pub fn start_time(mut self, start_time: DateTime<FixedOffset>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    /// Builder method: set category
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Builder method: set measurement
    pub fn measurement(mut self, measurement: impl Into<String>) -> Self {
        self.measurement = Some(measurement.into());
        self
    }

    /// Builder method: set value
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Idempotency token for the merge upsert.
    ///
    /// Format: `{unix seconds with millis}-{machine}-{type}`.
    pub fn unique_token(&self, now: DateTime<Utc>) -> String {
        let millis = now.timestamp_millis();
        format!(
            "{}.{:03}-{}-{}",
            millis.div_euclid(1000),
            millis.rem_euclid(1000),
            self.machine_name,
            self.signal_type
        )
    }

    /// In-memory form of this record, before the store has assigned an id
    pub fn to_record(&self) -> DataRecord {
        DataRecord {
            id: None,
            machine_name: self.machine_name.clone(),
            start_time: self.start_time,
            category: self.category.clone(),
            signal_type: self.signal_type.clone(),
            measurement: self.measurement.clone(),
            value: self.value.clone(),
            last_update: None,
        }
    }
}

/// `(machine, signal type)` key of the latest-state view
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub machine_name: String,
    pub signal_type: String,
}

impl RecordKey {
    pub fn new(machine_name: impl Into<String>, signal_type: impl Into<String>) -> Self {
        Self {
            machine_name: machine_name.into(),
            signal_type: signal_type.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.machine_name, self.signal_type)
    }
}
