//! WebSocket handler streaming outbound events to clients.
//!
//! On connect the client receives the current coordinator snapshot, then
//! every [`BroadcastEvent`] as a JSON text frame. Incoming text frames are
//! only used for heartbeats.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::api::AppState;
use crate::events::BroadcastEvent;
use crate::services::CoordinatorSnapshot;

/// Incoming WebSocket message envelope.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum WsIncoming {
    Heartbeat,
}

/// Outgoing messages that are not broadcast events.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum WsOutgoing {
    InitialState { state: CoordinatorSnapshot },
    HeartbeatAck,
}

fn to_message<T: Serialize>(value: &T) -> Option<Message> {
    match serde_json::to_string(value) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            log::error!("[WS] Failed to serialize message: {}", e);
            None
        }
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = BroadcastStream::new(state.event_bridge.subscribe());
    log::info!("[WS] Client connected");

    if let Ok(snapshot) = state.coordinator.snapshot().await {
        if let Some(msg) = to_message(&WsOutgoing::InitialState { state: snapshot }) {
            if sender.send(msg).await.is_err() {
                log::warn!("[WS] Failed to send initial state, client disconnected");
                return;
            }
        }
    }

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            event = events.next() => {
                match event {
                    Some(Ok(event)) => {
                        if !forward(&mut sender, &event).await {
                            break;
                        }
                    }
                    Some(Err(BroadcastStreamRecvError::Lagged(n))) => {
                        log::warn!("[WS] Client lagged, {} event(s) skipped", n);
                    }
                    None => break,
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<WsIncoming>(&text) {
                            Ok(WsIncoming::Heartbeat) => {
                                if let Some(msg) = to_message(&WsOutgoing::HeartbeatAck) {
                                    let _ = sender.send(msg).await;
                                }
                            }
                            Err(e) => log::debug!("[WS] Ignoring message: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::debug!("[WS] Receive error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    log::info!("[WS] Client disconnected");
}

/// Sends one event; returns `false` once the client is gone.
async fn forward<S>(sender: &mut S, event: &BroadcastEvent) -> bool
where
    S: futures::Sink<Message> + Unpin,
{
    match to_message(event) {
        Some(msg) => sender.send(msg).await.is_ok(),
        None => true,
    }
}
