//! Sensorcast Reading Store
//!
//! Durable, append-only storage for sensor readings:
//!
//! - **types**: The `Reading` record and timestamp formatting
//! - **store**: SQLite-backed store assigning ids and acceptance timestamps
//! - **error**: Error types
//!
//! # Write Path
//!
//! ```text
//!   (temperature, humidity) → validate → lock → stamp created_at → INSERT (fsync) → Reading
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use sensorcast::storage::{ReadingStore, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = ReadingStore::open(&StoreConfig::new("./data"))?;
//!
//!     let reading = store.append(21.5, 48.0).await?;
//!     println!("stored reading #{} at {}", reading.id, reading.created_at);
//!
//!     let history = store.recent(50).await?;
//!     println!("{} readings in history", history.len());
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod store;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use store::{ReadingStore, StoreConfig, DEFAULT_RECENT_LIMIT};
pub use types::{format_timestamp, validate_sample, Reading};
