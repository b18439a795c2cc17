//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::alert::AlertConfig;
use crate::api::ApiConfig;
use crate::logging::{LogFormat, LoggingConfig};
use crate::storage::StoreConfig;
use crate::websocket::HubConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StoreConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub hub: HubConfig,

    #[serde(default)]
    pub alert: AlertConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Environment overrides that were present but unusable. Config is
    /// resolved before logging is up, so the caller reports these.
    #[serde(skip)]
    pub rejected_overrides: Vec<RejectedOverride>,
}

/// An override whose value could not be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedOverride {
    pub key: &'static str,
    pub value: String,
}

impl std::fmt::Display for RejectedOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={:?}", self.key, self.value)
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
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

    /// Resolve the effective configuration.
    ///
    /// An explicit path must load. Otherwise the first default location that
    /// exists is used, falling back to defaults plus environment. Returns the
    /// file that was loaded, if any.
    pub fn resolve(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::load_with_env(path)?, Some(path.to_path_buf())));
        }

        let config_paths = [
            dirs::config_dir().map(|p| p.join("sensorcast").join("config.toml")),
            Some(PathBuf::from("/etc/sensorcast/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Ok((Self::load_with_env(path)?, Some(path.clone())));
            }
        }

        Ok((Self::from_env(), None))
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Storage overrides
        if let Some(data_dir) = lookup("SENSORCAST_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(data_dir);
        }

        // API overrides; PORT is what most hosting platforms inject
        if let Some(host) = lookup("SENSORCAST_HOST") {
            self.api.host = host;
        }
        let port_key = if lookup("SENSORCAST_PORT").is_some() {
            "SENSORCAST_PORT"
        } else {
            "PORT"
        };
        if let Some(port) = lookup(port_key) {
            match port.parse() {
                Ok(p) => self.api.port = p,
                Err(_) => self.reject(port_key, port),
            }
        }
        if let Some(dir) = lookup("SENSORCAST_STATIC_DIR") {
            self.api.static_dir = Some(dir);
        }

        // Alert overrides
        if let Some(url) =
            lookup("SENSORCAST_ALERT_WEBHOOK_URL").or_else(|| lookup("DISCORD_WEBHOOK_URL"))
        {
            self.alert.webhook_url = Some(url);
        }
        if let Some(threshold) = lookup("SENSORCAST_ALERT_THRESHOLD") {
            match threshold.parse::<f64>() {
                Ok(t) if t.is_finite() => self.alert.threshold = t,
                _ => self.reject("SENSORCAST_ALERT_THRESHOLD", threshold),
            }
        }

        // Logging overrides
        if let Some(level) = lookup("SENSORCAST_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("SENSORCAST_LOG_FORMAT") {
            match format.parse::<LogFormat>() {
                Ok(f) => self.logging.format = f,
                Err(_) => self.reject("SENSORCAST_LOG_FORMAT", format),
            }
        }
    }

    fn reject(&mut self, key: &'static str, value: String) {
        self.rejected_overrides.push(RejectedOverride { key, value });
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
    r#"# Sensorcast Configuration
#
# Environment variables override these settings:
# - SENSORCAST_DATA_DIR
# - SENSORCAST_HOST
# - SENSORCAST_PORT (or PORT)
# - SENSORCAST_STATIC_DIR
# - SENSORCAST_ALERT_WEBHOOK_URL (or DISCORD_WEBHOOK_URL)
# - SENSORCAST_ALERT_THRESHOLD
# - SENSORCAST_LOG_LEVEL
# - SENSORCAST_LOG_FORMAT

[storage]
# Directory holding the SQLite database
data_dir = "./sensorcast_data"

# Database file name
db_file = "readings.db"

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 3000

# Serve files from this directory for unmatched paths (e.g. a dashboard)
# static_dir = "./public"

# History size when ?limit= is missing or invalid
default_history_limit = 50

# Largest history a single request may ask for
max_history_limit = 1000

[hub]
# Maximum concurrent WebSocket subscribers
max_connections = 1000

# Pending messages per subscriber before a slow one is dropped
queue_capacity = 256

# Timeout for a single WebSocket write (ms)
send_timeout_ms = 10000

[alert]
# Discord webhook URL; alerts are disabled when unset
# webhook_url = "https://discord.com/api/webhooks/..."

# Alert when temperature is strictly above this value (°C)
threshold = 30.0

# Timeout for a single webhook attempt (ms)
timeout_ms = 5000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
