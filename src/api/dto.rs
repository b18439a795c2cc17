//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use serde::{Deserialize, Serialize};

use crate::api::state::ApiConfig;

// ============================================
// READING DTOs
// ============================================

/// Reading ingest request; both fields must be JSON numbers
#[derive(Debug, Deserialize)]
pub struct CreateReadingRequest {
    /// Temperature in °C
    pub temperature: f64,
    /// Relative humidity in %
    pub humidity: f64,
}

/// History query parameters
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    /// Maximum number of readings; kept as text so bad values fall back to the default
    #[serde(default)]
    pub limit: Option<String>,
}

impl HistoryParams {
    /// Resolve the effective limit: missing, unparseable or zero means the default,
    /// anything above the configured maximum is capped
    pub fn resolve_limit(&self, config: &ApiConfig) -> usize {
        self.limit
            .as_deref()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(config.default_history_limit)
            .min(config.max_history_limit)
    }
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health status response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy or unhealthy
    pub status: String,
    /// Storage status: ok or error
    pub storage: String,
    /// Number of stored readings, when storage is reachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readings: Option<u64>,
    /// Open WebSocket subscribers
    pub subscribers: usize,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Crate version
    pub version: String,
}
