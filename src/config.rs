//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.
//! Configuration is read once at startup; there is no hot reload.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4990
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_body_size() -> usize {
    1024 * 1024 // 1 MB
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_body_size: default_max_body_size(),
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file
    #[serde(default = "default_store_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_store_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("fmiacp").join("fmiacp.db").to_string_lossy().to_string())
        .unwrap_or_else(|| "./fmiacp_data/fmiacp.db".to_string())
}

fn default_busy_timeout() -> u64 {
    5000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

/// Cache refresh configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_reload_interval")]
    pub reload_interval_secs: u64,
}

fn default_reload_interval() -> u64 {
    30
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            reload_interval_secs: default_reload_interval(),
        }
    }
}

/// Static Basic-auth credential list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub users: Vec<Credential>,
}

/// One accepted user/password pair
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credential {
    pub user: String,
    pub passwd: String,
}

impl Credential {
    pub fn new(user: impl Into<String>, passwd: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            passwd: passwd.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("user", &self.user)
            .field("passwd", &"***")
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Where [`Config::load_default`] found its settings
#[derive(Debug, Default)]
pub struct ConfigOrigin {
    /// `None` means defaults with environment overrides
    pub path: Option<PathBuf>,
    /// Candidates that exist but failed to load
    pub skipped: Vec<ConfigError>,
}

impl ConfigOrigin {
    /// Report how the config was resolved
    pub fn log(&self) {
        for e in &self.skipped {
            tracing::warn!("Failed to load config: {}", e);
        }
        match &self.path {
            Some(path) => tracing::info!("Loaded config from {:?}", path),
            None => tracing::info!("Using default config with environment overrides"),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    ///
    /// Nothing is logged here; tracing is configured from the result, so the
    /// caller reports the returned [`ConfigOrigin`] once a subscriber exists.
    pub fn load_default() -> (Self, ConfigOrigin) {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("fmiacp").join("config.toml")),
            Some(PathBuf::from("/etc/fmiacp/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::load_first(&config_paths)
    }

    /// Load the first candidate that exists and parses, else defaults
    pub fn load_first(candidates: &[PathBuf]) -> (Self, ConfigOrigin) {
        let mut origin = ConfigOrigin::default();

        for path in candidates {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        origin.path = Some(path.clone());
                        return (config, origin);
                    }
                    Err(e) => origin.skipped.push(e),
                }
            }
        }

        (Self::from_env(), origin)
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // API overrides
        if let Ok(host) = std::env::var("FMIACP_API_HOST") {
            self.api.host = host;
        }
        if let Ok(port) = std::env::var("FMIACP_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        // Store overrides
        if let Ok(path) = std::env::var("FMIACP_STORE_PATH") {
            self.store.path = path;
        }

        // Cache overrides
        if let Ok(secs) = std::env::var("FMIACP_RELOAD_INTERVAL_SECS") {
            if let Ok(s) = secs.parse() {
                self.cache.reload_interval_secs = s;
            }
        }

        // Logging overrides
        if let Ok(level) = std::env::var("FMIACP_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("FMIACP_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# FMIACP Configuration
#
# Environment variables override these settings:
# - FMIACP_API_HOST
# - FMIACP_API_PORT
# - FMIACP_STORE_PATH
# - FMIACP_RELOAD_INTERVAL_SECS
# - FMIACP_LOG_LEVEL
# - FMIACP_LOG_FORMAT

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 4990

# Request timeout in seconds (504 after this)
request_timeout_secs = 30

# Maximum request body size in bytes
max_body_size = 1048576

[store]
# SQLite database file holding the record table
path = "./fmiacp_data/fmiacp.db"

# How long to wait on a locked database (ms)
busy_timeout_ms = 5000

[cache]
# How often to reload the cached views from the store (seconds)
reload_interval_secs = 30

# Basic-auth users. Every /api request must match one of these.
[[auth.users]]
user = "dashboard"
passwd = "change-me"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
