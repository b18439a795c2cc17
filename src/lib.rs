//! # Sensorcast
//!
//! Ingests periodic temperature/humidity readings from a remote device,
//! stores them durably, pushes them live to WebSocket viewers and raises a
//! threshold alert on a webhook.
//!
//! ## Features
//!
//! - **Durable ingestion**: SQLite store with fsync'd appends and monotonic ids
//! - **Real-time**: WebSocket fan-out with a catch-up message on join
//! - **Alerts**: One-shot webhook notification above a temperature threshold
//! - **History**: Newest-first queries over the stored readings
//!
//! ## Modules
//!
//! - [`storage`]: Reading Store
//! - [`pipeline`]: Ingestion write path and ordered commit fan-out
//! - [`websocket`]: Broadcast Hub and subscriber transport
//! - [`alert`]: Threshold alerts and alert channels
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sensorcast::storage::{ReadingStore, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = ReadingStore::open(&StoreConfig::new("./data"))?;
//!
//!     let reading = store.append(31.5, 60.2).await?;
//!     assert_eq!(store.latest().await?, Some(reading));
//!
//!     Ok(())
//! }
//! ```

pub mod alert;
pub mod api;
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod storage;
pub mod websocket;

// Re-export top-level types for convenience
pub use storage::{Reading, ReadingStore, StorageError, StorageResult, StoreConfig};

pub use pipeline::{spawn_fanout, CommitFeed, Ingestor};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use websocket::{
    websocket_handler, BroadcastHub, ConnectionState, HubConfig, HubError, ServerMessage,
    Subscription,
};

pub use alert::{AlertChannel, AlertConfig, AlertError, AlertNotifier, AlertOutcome, DiscordWebhook};

pub use config::{generate_default_config, Config, ConfigError};

pub use logging::{LogFormat, LoggingConfig};
