//! `WebSocket` upgrade handlers and the per-socket pump.
//!
//! Each upgraded socket runs one task that announces itself to the event
//! loop, forwards client messages inbound, and writes every frame the loop
//! queues for it. The task never interprets messages; all protocol logic
//! runs on the event loop.
//!
//! When the loop drops the socket's queue (write failure or shutdown) the
//! task sends a close frame and exits.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use signalcast_types::ProtocolKind;
use tracing::debug;

use crate::state::AppState;

/// Upgrade to a receive-only traffic stream.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_traffic(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state, ProtocolKind::Traffic))
}

/// Upgrade to the echo protocol (ack every message, pong on `ping`).
///
/// # Route
///
/// `GET /ws/echo`
pub async fn ws_echo(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state, ProtocolKind::Echo))
}

/// Pump one socket until either side goes away.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, protocol: ProtocolKind) {
    let Some((handle, mut frames)) = state.acceptor.open(protocol).await else {
        debug!("Event loop gone, refusing WebSocket");
        let _ = socket.send(Message::Close(None)).await;
        return;
    };
    debug!(%handle, protocol = protocol.as_str(), "WebSocket opened");

    loop {
        tokio::select! {
            // Frames queued by the event loop.
            frame = frames.recv() => {
                if let Some(text) = frame {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        debug!(%handle, "WebSocket client disconnected (send failed)");
                        break;
                    }
                } else {
                    debug!(%handle, "Outbound queue closed, closing WebSocket");
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            }
            // Messages from the client.
            msg = socket.recv() => {
                let payload = match msg {
                    Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(Message::Binary(data))) => String::from_utf8_lossy(&data).into_owned(),
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(%handle, "WebSocket client disconnected (pong failed)");
                            break;
                        }
                        continue;
                    }
                    Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(%handle, "WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(%handle, "WebSocket error: {e}");
                        break;
                    }
                };
                if !state.acceptor.deliver(handle, payload).await {
                    debug!(%handle, "Event loop gone, closing WebSocket");
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }

    state.acceptor.disconnect(handle).await;
}
