use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;

use crate::api;
use crate::error::RelayError;
use crate::registry::ConnectionHandle;
use crate::router::Frame;
use crate::state::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// GET / serves the banner, or upgrades when the client asks for a WebSocket
pub async fn root_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| handle_socket(socket, state)),
        Err(_) => api::banner().into_response(),
    }
}

/// Handle individual WebSocket connection
///
/// Registered on entry, deregistered on every exit path. The loop forwards
/// queued broadcasts to the socket and routes inbound frames.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let (handle, mut outbound_rx) = ConnectionHandle::new(state.config.outbound_queue_capacity);
    let id = handle.id().to_string();
    state.registry.register(handle).await;

    let connections = state.registry.len().await;
    tracing::info!(connection_id = %id, connections, "Client connected");

    loop {
        tokio::select! {
            // Broadcasts queued for this client
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(payload) => {
                        if let Err(e) = sender.send(Message::Text(payload)).await {
                            tracing::error!(connection_id = %id, "{}", RelayError::Transport(e.to_string()));
                            break;
                        }
                    }
                    None => break,
                }
            }

            // Frames from the client
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!(connection_id = %id, "Received message: {}", text.as_str());
                        state.router.route_frame(&id, Frame::Text(text.as_str())).await;
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        state.router.route_frame(&id, Frame::Binary(&bytes)).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::debug!(connection_id = %id, "Close frame received");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!(connection_id = %id, "{}", RelayError::Transport(e.to_string()));
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.registry.deregister(&id).await;

    let connections = state.registry.len().await;
    tracing::info!(connection_id = %id, connections, "Client disconnected");
}
