//! Ingest Path
//!
//! Validates an incoming event, writes it through the store's merge
//! upsert, then applies it to the latest-state view.
//!
//! The view is updated whether or not the upsert succeeded, so the
//! in-memory latest state can run ahead of what was durably stored. The
//! next successful reload reconciles the two.

use crate::cache::CacheEngine;
use crate::store::NewRecord;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Column widths of the record table
const MAX_NAME_LEN: usize = 64;
const MAX_VALUE_LEN: usize = 256;

/// Event as posted by field devices
///
/// Every field is optional on the wire; validation decides what is
/// required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "MACHINE_NAME", default)]
    pub machine_name: Option<String>,
    /// RFC 3339 string, naive UTC string, or epoch milliseconds
    #[serde(rename = "START_TIME", default)]
    pub start_time: Option<Value>,
    #[serde(rename = "CATEGORY", default)]
    pub category: Option<String>,
    #[serde(rename = "TYPE", default)]
    pub signal_type: Option<String>,
    #[serde(rename = "MEASUREMENT", default)]
    pub measurement: Option<String>,
    /// String, number or boolean; stored as text
    #[serde(rename = "VALUE", default)]
    pub value: Option<Value>,
}

/// Why an event was rejected before reaching the store
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IngestError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{field} exceeds maximum length of {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("START_TIME is not a valid timestamp: {0}")]
    InvalidStartTime(String),

    #[error("VALUE must be a string, number or boolean")]
    InvalidValue,
}

impl RawEvent {
    /// Check required fields and widths and normalize into a `NewRecord`
    pub fn validate(self) -> Result<NewRecord, IngestError> {
        let machine_name = required(self.machine_name, "MACHINE_NAME")?;
        let signal_type = required(self.signal_type, "TYPE")?;

        check_len(&machine_name, "MACHINE_NAME", MAX_NAME_LEN)?;
        check_len(&signal_type, "TYPE", MAX_NAME_LEN)?;
        if let Some(category) = &self.category {
            check_len(category, "CATEGORY", MAX_NAME_LEN)?;
        }
        if let Some(measurement) = &self.measurement {
            check_len(measurement, "MEASUREMENT", MAX_NAME_LEN)?;
        }

        let value = match self.value {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => Some(v.to_string()),
            Some(_) => return Err(IngestError::InvalidValue),
        };
        if let Some(value) = &value {
            check_len(value, "VALUE", MAX_VALUE_LEN)?;
        }

        let start_time = match self.start_time {
            None | Some(Value::Null) => None,
            Some(raw) => Some(parse_start_time(&raw)?),
        };

        Ok(NewRecord {
            machine_name,
            start_time,
            category: self.category,
            signal_type,
            measurement: self.measurement,
            value,
        })
    }
}

fn required(field: Option<String>, name: &'static str) -> Result<String, IngestError> {
    match field {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(IngestError::Missing(name)),
    }
}

fn check_len(value: &str, field: &'static str, max: usize) -> Result<(), IngestError> {
    if value.chars().count() > max {
        return Err(IngestError::TooLong { field, max });
    }
    Ok(())
}

/// Accepts RFC 3339, an offset-less date-time (read as UTC), or epoch
/// milliseconds
fn parse_start_time(raw: &Value) -> Result<DateTime<FixedOffset>, IngestError> {
    let utc = FixedOffset::east_opt(0)
        .ok_or_else(|| IngestError::InvalidStartTime(raw.to_string()))?;

    match raw {
        Value::String(s) => {
            if let Ok(t) = DateTime::parse_from_rfc3339(s) {
                return Ok(t);
            }
            for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return Ok(utc.from_utc_datetime(&naive));
                }
            }
            Err(IngestError::InvalidStartTime(s.clone()))
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .map(|t| t.with_timezone(&utc))
            .ok_or_else(|| IngestError::InvalidStartTime(n.to_string())),
        other => Err(IngestError::InvalidStartTime(other.to_string())),
    }
}

/// Write path into the store and the latest-state view
#[derive(Clone)]
pub struct IngestPath {
    engine: Arc<CacheEngine>,
}

impl IngestPath {
    pub fn new(engine: Arc<CacheEngine>) -> Self {
        Self { engine }
    }

    /// Persist `record` and apply it to the latest-state view.
    ///
    /// Returns whether the upsert succeeded. The view is updated either way.
    pub async fn ingest(&self, record: NewRecord) -> bool {
        self.ingest_at(record, Utc::now()).await
    }

    /// `ingest` with an explicit clock reading for the idempotency token
    pub async fn ingest_at(&self, record: NewRecord, now: DateTime<Utc>) -> bool {
        let token = record.unique_token(now);
        let stored = self.store(&record, &token).await;

        self.engine.counters().record_store(stored);
        self.engine.apply_update(record.to_record()).await;

        stored
    }

    async fn store(&self, record: &NewRecord, token: &str) -> bool {
        let connection = self.engine.connection();
        let Some(handle) = connection.ensure_connection().await else {
            tracing::warn!(
                machine = %record.machine_name,
                signal_type = %record.signal_type,
                "Record not stored: store unavailable"
            );
            return false;
        };

        match handle.merge(record, token).await {
            Ok(rows) if rows > 0 => {
                tracing::info!(
                    machine = %record.machine_name,
                    signal_type = %record.signal_type,
                    rows,
                    "Record stored"
                );
                true
            }
            Ok(_) => {
                tracing::warn!(
                    machine = %record.machine_name,
                    token,
                    "Merge affected no rows"
                );
                false
            }
            Err(e) => {
                tracing::error!(
                    machine = %record.machine_name,
                    token,
                    error = %e,
                    "Merge failed"
                );
                connection.teardown(&handle).await;
                false
            }
        }
    }
}
