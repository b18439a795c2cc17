//! Ingestion Pipeline
//!
//! The single write path for readings:
//!
//! ```text
//!   ingest → writer lane → ReadingStore::append (fsync) → commit feed
//!                                                            │
//!                                  fan-out task ─────────────┘
//!                                    ├─ BroadcastHub::publish   (in id order)
//!                                    └─ AlertNotifier::evaluate (spawned, independent)
//! ```
//!
//! The writer lane is held from the append until the committed reading is
//! on the feed, so feed order is id order and the one fan-out task
//! publishes in that order.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::alert::AlertNotifier;
use crate::storage::{validate_sample, Reading, ReadingStore, StorageError, StorageResult};
use crate::websocket::BroadcastHub;

/// Committed readings, in id order
pub type CommitFeed = mpsc::UnboundedReceiver<Reading>;

/// Validates and durably writes readings, emitting each commit onto the feed
pub struct Ingestor {
    store: ReadingStore,
    /// Writer lane; holds the feed sender so only the lane owner can emit
    lane: Arc<Mutex<mpsc::UnboundedSender<Reading>>>,
}

impl Ingestor {
    /// Create an ingestor and the feed its commits are emitted on
    pub fn new(store: ReadingStore) -> (Self, CommitFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ingestor = Self {
            store,
            lane: Arc::new(Mutex::new(tx)),
        };
        (ingestor, rx)
    }

    /// Store one reading and queue its committed event.
    ///
    /// The event is emitted if and only if the write succeeded.
    pub async fn ingest(&self, temperature: f64, humidity: f64) -> StorageResult<Reading> {
        validate_sample(temperature, humidity)?;

        let store = self.store.clone();
        let lane = Arc::clone(&self.lane);

        // Detached so a dropped request cannot separate a commit from its event
        tokio::spawn(async move {
            let feed = lane.lock().await;
            let reading = store.append(temperature, humidity).await?;
            if feed.send(reading.clone()).is_err() {
                tracing::warn!(
                    reading_id = reading.id,
                    "Fan-out is not running, committed reading not dispatched"
                );
            }
            Ok::<_, StorageError>(reading)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

/// Start the fan-out task draining the commit feed.
///
/// Broadcast runs inline (it only enqueues); each alert evaluation gets its
/// own task so a slow webhook never holds up broadcast or later alerts.
pub fn spawn_fanout(
    mut commits: CommitFeed,
    hub: Arc<BroadcastHub>,
    notifier: Arc<AlertNotifier>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(reading) = commits.recv().await {
            if notifier.exceeds(&reading) {
                let notifier = Arc::clone(&notifier);
                let reading = reading.clone();
                tokio::spawn(async move {
                    notifier.evaluate(&reading).await;
                });
            }

            hub.publish(&reading).await;
        }

        tracing::debug!("Commit feed closed, fan-out stopped");
    })
}
