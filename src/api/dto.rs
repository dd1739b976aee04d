//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! Records themselves are served as `DataRecord`, whose JSON shape is the
//! store's column layout.

use serde::{Deserialize, Serialize};

use crate::cache::{CpuUsage, MemoryUsage};
use crate::store::{ConnectionState, DataRecord};

// ============================================
// READ DTOs
// ============================================

/// Optional query-string filter for the read endpoints
///
/// Column filters are exact matches; `limit` caps the result after
/// filtering.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordFilter {
    #[serde(rename = "MACHINE_NAME")]
    pub machine_name: Option<String>,
    #[serde(rename = "TYPE")]
    pub signal_type: Option<String>,
    #[serde(rename = "CATEGORY")]
    pub category: Option<String>,
    #[serde(rename = "MEASUREMENT")]
    pub measurement: Option<String>,
    #[serde(rename = "VALUE")]
    pub value: Option<String>,
    pub limit: Option<usize>,
}

impl RecordFilter {
    fn conditions(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        [
            ("MACHINE_NAME", &self.machine_name),
            ("TYPE", &self.signal_type),
            ("CATEGORY", &self.category),
            ("MEASUREMENT", &self.measurement),
            ("VALUE", &self.value),
        ]
        .into_iter()
        .filter_map(|(column, wanted)| wanted.as_deref().map(|w| (column, w)))
    }

    pub fn matches(&self, record: &DataRecord) -> bool {
        self.conditions()
            .all(|(column, wanted)| record.field(column) == Some(wanted))
    }

    /// Filter and cap `records`, keeping their order
    pub fn apply<'a>(&self, records: impl Iterator<Item = &'a DataRecord>) -> Vec<DataRecord> {
        records
            .filter(|r| self.matches(r))
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

// ============================================
// STATUS DTOs
// ============================================

/// Body of `GET /api/getAppStatusFMIACP`
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusResponse {
    pub name: String,
    pub version: String,
    pub data_store_size: usize,
    pub data_store_count: u64,
    pub data_store_fail_count: u64,
    pub data_input_count: u64,
    pub data_input_request_count: u64,
    pub data_output_count: u64,
    pub data_output_request_count: u64,
    pub database_connection: ConnectionState,
    pub usage_memory: MemoryUsage,
    #[serde(rename = "UsageCPU")]
    pub usage_cpu: CpuUsage,
    #[serde(rename = "CPU")]
    pub cpu: f32,
    pub latest_state_size: usize,
    /// RFC 3339, or null before the first successful reload
    pub last_reload: Option<String>,
    pub uptime_seconds: u64,
}
