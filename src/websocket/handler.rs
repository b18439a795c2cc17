//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle:
//! `Connecting` on upgrade, `Open` once joined to the hub, `Closed` when
//! the transport goes away.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use super::hub::{BroadcastHub, Subscription};
use crate::api::AppState;

/// WebSocket upgrade handler
///
/// Entry point for subscriber connections at `GET /ws`.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = Arc::clone(&state.hub);
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// `GET /` handler
///
/// Dashboards open their socket on the page origin, so an upgrade request
/// at the root joins the hub. Anything else is served from the static
/// directory when one is configured.
pub async fn root_handler(
    ws: Option<WebSocketUpgrade>,
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Response {
    if let Some(ws) = ws {
        let hub = Arc::clone(&state.hub);
        return ws.on_upgrade(move |socket| handle_socket(socket, hub));
    }

    match &state.config.static_dir {
        Some(dir) => match ServeDir::new(dir).oneshot(request).await {
            Ok(response) => response.into_response(),
            Err(never) => match never {},
        },
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Arc<BroadcastHub>) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscription = Subscription::connecting();

    // Ordered delivery queue for this connection
    let (tx, mut rx) = hub.subscriber_queue();
    let send_timeout = hub.config().send_timeout();

    if let Err(e) = hub.join(&mut subscription, tx).await {
        tracing::warn!(
            subscriber_id = %subscription.id(),
            error = %e,
            "Rejected WebSocket subscriber"
        );
        let _ = sender.send(Message::Close(None)).await;
        return;
    }

    let subscriber_id = subscription.id().to_string();
    let conn_id_for_send = subscriber_id.clone();

    // Task to forward queued messages to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    match tokio::time::timeout(send_timeout, sender.send(Message::Text(text))).await {
                        Ok(Ok(())) => {}
                        Ok(Err(_)) => {
                            tracing::debug!(
                                subscriber_id = %conn_id_for_send,
                                "WebSocket send failed, closing connection"
                            );
                            break;
                        }
                        Err(_) => {
                            tracing::warn!(
                                subscriber_id = %conn_id_for_send,
                                "WebSocket send timed out, closing connection"
                            );
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize message");
                }
            }
        }
    });

    let conn_id_for_recv = subscriber_id.clone();

    // Subscribers have nothing to say; watch for close and transport errors
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    tracing::debug!(subscriber_id = %conn_id_for_recv, "Client closed connection");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(
                        subscriber_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    hub.leave(&mut subscription).await;
}
