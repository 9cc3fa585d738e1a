use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::handlers::AppState;
use crate::fanout::ClientHandle;
use crate::profiles::ProfileError;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Authenticated user identity; token validation happens upstream of
    /// this service.
    pub user_id: Uuid,
}

/// Handle WebSocket upgrade for a client's portfolio stream.
pub async fn portfolio_ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let profile = match state.profiles.load(query.user_id).await {
        Ok(profile) => profile,
        Err(ProfileError::NotFound(user_id)) => {
            tracing::warn!(%user_id, "websocket rejected, unknown user");
            return StatusCode::NOT_FOUND.into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "profile lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, profile))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, profile: crate::models::UserProfile) {
    let user_id = profile.user_id;
    tracing::info!(%user_id, "websocket client connected");

    let (outbound_tx, outbound_rx) = mpsc::channel(state.config.outbound_queue_size);
    let cancel = state.shutdown.child_token();
    let client = Arc::new(ClientHandle::new(profile, outbound_tx, cancel.clone()));

    state.registry.register(Arc::clone(&client));

    let (sender, receiver) = socket.split();

    // Outbound loop on its own task; the inbound loop runs here and only
    // watches for closure.
    state.tracker.spawn(write_loop(
        sender,
        outbound_rx,
        cancel.clone(),
        state.config.ping_interval,
    ));
    read_loop(receiver, cancel).await;

    state.registry.unregister(&client);
    tracing::info!(%user_id, "websocket client disconnected");
}

/// Drain the private outbound queue to the socket, probing liveness with a
/// periodic ping. Ends on cancellation, queue closure, or a failed write.
async fn write_loop(
    mut sender: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
    ping_interval: std::time::Duration,
) {
    let mut heartbeat = interval(ping_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                return;
            }
            message = outbound_rx.recv() => {
                let Some(message) = message else {
                    let _ = sender.send(Message::Close(None)).await;
                    return;
                };
                if sender.send(Message::Text(message)).await.is_err() {
                    return;
                }
            }
            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Consume inbound frames purely to detect closure or death of the
/// connection.
async fn read_loop(
    mut receiver: futures::stream::SplitStream<WebSocket>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
