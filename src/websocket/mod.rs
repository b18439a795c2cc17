//! WebSocket Real-Time Fan-out
//!
//! Pushes committed readings to dashboard clients via WebSocket.
//!
//! ## Architecture
//!
//! - **BroadcastHub**: Owns the live subscriber set (`join` / `leave` / `publish`)
//! - **Handler**: Handles WebSocket upgrade and the connection lifecycle
//! - **Messages**: Defines the server message formats
//!
//! ## Protocol
//!
//! Clients connect to `/ws` (or upgrade at `/`, where dashboards served
//! from the static directory open their socket) and never need to send anything. On join the
//! server sends the latest stored reading (if any), then every new one:
//!
//! ```text
//! {"type": "latest-reading", "data": {"id": 41, "temperature": 22.1, ...}}
//! {"type": "new-reading",    "data": {"id": 42, "temperature": 22.3, ...}}
//! ```
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:3000/ws');
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   console.log(msg.type, msg.data.temperature);
//! };
//! ```

mod handler;
mod hub;
mod messages;

#[cfg(test)]
pub(crate) mod testing;

pub use handler::{root_handler, websocket_handler};
pub use hub::{BroadcastHub, ConnectionState, HubConfig, HubError, SubscriberId, Subscription};
pub use messages::ServerMessage;
