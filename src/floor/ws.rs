use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use lineboard_common::{Notification, Topic};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::api::SharedState;
use crate::notifier::{Notifier, Subscription};

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Drop the connection if no Pong arrives within this window after a Ping.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

// ── Fan-out bridge ───────────────────────────────────────────────────

/// Forward every topic published on `notifier` into the broadcast channel
/// that feeds WebSocket and SSE connections.
///
/// Sending never blocks: with no connected clients the send fails and the
/// notification is simply dropped, matching the no-replay contract.
pub fn forward_to_broadcast(
    notifier: &Notifier,
    tx: broadcast::Sender<Notification>,
) -> Vec<Subscription> {
    notifier.subscribe_all(&Topic::ALL, move |notification| {
        let _ = tx.send(notification.clone());
        Ok(())
    })
}

/// Wire form of a push frame: `{"type": "<topic>", "data": <payload|null>}`.
pub fn encode_frame(notification: &Notification) -> Option<String> {
    match serde_json::to_string(notification) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!(topic = %notification.topic, error = %e, "failed to encode push frame");
            None
        }
    }
}

// ── WebSocket handler ────────────────────────────────────────────────

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (sender, receiver) = socket.split();
    let rx = state.events_tx.subscribe();
    tracing::debug!(clients = state.events_tx.receiver_count(), "websocket connected");
    run_socket_loop(sender, receiver, rx).await;
    tracing::debug!("websocket disconnected");
}

/// Core WebSocket loop with ping/pong keepalive.
///
/// Combines broadcast forwarding, client message receiving, and periodic
/// ping/pong health checking into a single select loop. If no Pong is
/// received within [`PONG_TIMEOUT`] after a Ping is sent, the connection
/// is considered dead and the loop exits.
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: broadcast::Receiver<Notification>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // The first tick completes immediately; consume it so the first real
    // ping fires after PING_INTERVAL has elapsed.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    tracing::debug!("websocket pong timeout");
                    break;
                }
                if sender.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            result = rx.recv() => {
                match result {
                    Ok(notification) => {
                        let Some(frame) = encode_frame(&notification) else {
                            continue;
                        };
                        if sender.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Dashboards re-pull on the next frame, so skipped ones are harmless.
                        tracing::warn!(skipped, "websocket client lagging");
                        continue;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    // Best-effort close frame
    let _ = sender.send(Message::Close(None)).await;
}
