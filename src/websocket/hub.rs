//! Broadcast Hub
//!
//! Owns the set of live subscriber connections and fans committed readings
//! out to them. Each subscriber has its own ordered delivery queue, drained
//! by the connection's send task, so a slow socket never blocks `publish`.
//!
//! Queues are bounded. A subscriber whose queue is full has stopped keeping
//! up and is dropped from the live set instead of growing without limit.
//!
//! `join` reads the bootstrap reading from the store while holding the
//! write lock and remembers its id as the subscriber's floor. `publish`
//! skips readings at or below the floor, so a reading committed around
//! join time reaches the subscriber exactly once.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::messages::ServerMessage;
use crate::storage::{Reading, ReadingStore};

/// Unique identifier for a subscriber connection
pub type SubscriberId = String;

/// Lifecycle of a subscriber connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// One subscriber connection as seen by the transport handler
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    state: ConnectionState,
}

impl Subscription {
    /// A fresh connection that has not joined yet
    pub fn connecting() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: ConnectionState::Connecting,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::connecting()
    }
}

/// Configuration for the broadcast hub
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Maximum number of concurrent subscribers
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Messages a subscriber may have pending before it is dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long a single socket write may take before the connection is closed (ms)
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

fn default_max_connections() -> usize {
    1000
}

fn default_queue_capacity() -> usize {
    256
}

fn default_send_timeout_ms() -> u64 {
    10_000
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            queue_capacity: default_queue_capacity(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl HubConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// Live subscriber entry
struct Subscriber {
    /// Ordered delivery queue for this connection
    sender: mpsc::Sender<ServerMessage>,
    /// Id of the bootstrap reading; anything at or below it was already delivered
    floor: Option<i64>,
}

/// Manages the live subscriber set
pub struct BroadcastHub {
    /// Open subscribers: SubscriberId → Subscriber
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    /// Source of bootstrap readings
    store: ReadingStore,
    /// Configuration
    config: HubConfig,
}

impl BroadcastHub {
    /// Create a new hub bootstrapping joiners from `store`
    pub fn new(store: ReadingStore, config: HubConfig) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            store,
            config,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// A delivery queue sized for this hub
    pub fn subscriber_queue(&self) -> (mpsc::Sender<ServerMessage>, mpsc::Receiver<ServerMessage>) {
        mpsc::channel(self.config.queue_capacity.max(1))
    }

    /// Open a connection and register it in the live set.
    ///
    /// Queues the bootstrap message when the store holds a reading and
    /// returns that reading. An empty store means no bootstrap.
    pub async fn join(
        &self,
        subscription: &mut Subscription,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<Option<Reading>, HubError> {
        if subscription.state != ConnectionState::Connecting {
            return Err(HubError::InvalidTransition(subscription.state));
        }

        let mut subscribers = self.subscribers.write().await;
        if subscribers.len() >= self.config.max_connections {
            subscription.state = ConnectionState::Closed;
            return Err(HubError::TooManyConnections(self.config.max_connections));
        }

        let bootstrap = match self.store.latest().await {
            Ok(latest) => latest,
            Err(e) => {
                tracing::warn!(
                    subscriber_id = %subscription.id,
                    error = %e,
                    "Bootstrap lookup failed, joining without catch-up"
                );
                None
            }
        };

        subscription.state = ConnectionState::Open;
        subscribers.insert(
            subscription.id.clone(),
            Subscriber {
                sender: sender.clone(),
                floor: bootstrap.as_ref().map(|r| r.id),
            },
        );

        if let Some(reading) = &bootstrap {
            if sender
                .try_send(ServerMessage::LatestReading(reading.clone()))
                .is_err()
            {
                tracing::debug!(
                    subscriber_id = %subscription.id,
                    "Bootstrap delivery failed, subscriber is closing"
                );
            }
        }

        tracing::info!(
            subscriber_id = %subscription.id,
            bootstrap_id = ?bootstrap.as_ref().map(|r| r.id),
            subscribers = subscribers.len(),
            "Subscriber joined"
        );

        Ok(bootstrap)
    }

    /// Queue a "new reading" message for every open subscriber.
    ///
    /// Must be called in id order. Returns the number of subscribers the
    /// message was queued for. Closed subscribers are skipped; subscribers
    /// whose queue is full are dropped from the live set.
    pub async fn publish(&self, reading: &Reading) -> usize {
        let mut delivered = 0;
        let mut lagging = Vec::new();

        {
            let subscribers = self.subscribers.read().await;
            for (id, subscriber) in subscribers.iter() {
                if subscriber.floor.is_some_and(|floor| reading.id <= floor) {
                    continue;
                }
                match subscriber
                    .sender
                    .try_send(ServerMessage::NewReading(reading.clone()))
                {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => lagging.push(id.clone()),
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!(
                            subscriber_id = %id,
                            reading_id = reading.id,
                            "Delivery failed, subscriber is closing"
                        );
                    }
                }
            }
        }

        if !lagging.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in &lagging {
                if subscribers.remove(id).is_some() {
                    tracing::warn!(
                        subscriber_id = %id,
                        reading_id = reading.id,
                        "Dropping subscriber with a full delivery queue"
                    );
                }
            }
        }

        tracing::trace!(
            reading_id = reading.id,
            subscribers = delivered,
            "Published reading"
        );

        delivered
    }

    /// Close a connection and drop it from the live set
    pub async fn leave(&self, subscription: &mut Subscription) -> bool {
        let removed = self
            .subscribers
            .write()
            .await
            .remove(&subscription.id)
            .is_some();
        subscription.state = ConnectionState::Closed;

        if removed {
            tracing::info!(subscriber_id = %subscription.id, "Subscriber left");
        }
        removed
    }

    /// Current number of open subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

/// Errors that can occur in the broadcast hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many subscribers (limit: {0})")]
    TooManyConnections(usize),

    #[error("Cannot join from state {0:?}")]
    InvalidTransition(ConnectionState),
}
