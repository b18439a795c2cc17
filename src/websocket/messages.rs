//! WebSocket Message Types
//!
//! Message shapes pushed from the server to subscribers. Subscribers are
//! not expected to send anything besides transport-level close.

use serde::{Deserialize, Serialize};

use crate::storage::Reading;

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Catch-up payload sent once on join, when a reading exists
    LatestReading(Reading),
    /// A reading was committed
    NewReading(Reading),
}

impl ServerMessage {
    /// The reading carried by this message
    pub fn reading(&self) -> &Reading {
        match self {
            ServerMessage::LatestReading(reading) | ServerMessage::NewReading(reading) => reading,
        }
    }
}
