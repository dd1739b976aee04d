//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::cache::{CacheEngine, ReloadCoordinator};
use crate::config::{self, Credential};
use crate::ingest::IngestPath;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Views, counters and store connection
    pub engine: Arc<CacheEngine>,
    /// Single-flight reload trigger used by the read endpoints
    pub coordinator: Arc<ReloadCoordinator>,
    /// Write path for the create endpoint
    pub ingest: IngestPath,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Accepted Basic-auth users
    pub credentials: Arc<Vec<Credential>>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        engine: Arc<CacheEngine>,
        coordinator: Arc<ReloadCoordinator>,
        config: ApiConfig,
        credentials: Vec<Credential>,
    ) -> Self {
        if credentials.is_empty() {
            tracing::warn!("No API users configured, every request will be rejected");
        }

        Self {
            ingest: IngestPath::new(Arc::clone(&engine)),
            engine,
            coordinator,
            config: Arc::new(config),
            credentials: Arc::new(credentials),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4990,
            request_timeout_ms: 30_000,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

impl From<&config::ApiConfig> for ApiConfig {
    fn from(config: &config::ApiConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            request_timeout_ms: config.request_timeout_secs.saturating_mul(1000),
            max_body_size: config.max_body_size,
        }
    }
}

impl ApiConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
