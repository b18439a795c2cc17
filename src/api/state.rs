//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

use crate::alert::AlertNotifier;
use crate::pipeline::{spawn_fanout, Ingestor};
use crate::storage::{ReadingStore, DEFAULT_RECENT_LIMIT};
use crate::websocket::{BroadcastHub, HubConfig};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Reading store for history and point queries
    pub store: ReadingStore,
    /// The write path: store append plus committed-event emission
    pub ingestor: Arc<Ingestor>,
    /// WebSocket broadcast hub for live subscribers
    pub hub: Arc<BroadcastHub>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Wire the store, hub and notifier together and start the commit fan-out.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        store: ReadingStore,
        hub_config: HubConfig,
        notifier: AlertNotifier,
        config: ApiConfig,
    ) -> Self {
        let hub = Arc::new(BroadcastHub::new(store.clone(), hub_config));
        let (ingestor, commits) = Ingestor::new(store.clone());
        spawn_fanout(commits, Arc::clone(&hub), Arc::new(notifier));

        Self {
            store,
            ingestor: Arc::new(ingestor),
            hub,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served for any path the API does not handle
    #[serde(default)]
    pub static_dir: Option<String>,
    /// History size when `limit` is missing or unusable
    #[serde(default = "default_history_limit")]
    pub default_history_limit: usize,
    /// Upper bound on `limit` for history queries
    #[serde(default = "default_max_history_limit")]
    pub max_history_limit: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_history_limit() -> usize {
    DEFAULT_RECENT_LIMIT
}

fn default_max_history_limit() -> usize {
    1000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
            default_history_limit: default_history_limit(),
            max_history_limit: default_max_history_limit(),
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
