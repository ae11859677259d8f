//! Per-connection chat session: the event loop each live socket follows.
//!
//! Each upgraded WebSocket gets a reader loop and a writer task. The writer
//! drains the connection's bounded registry queue into the socket; the
//! reader decodes client events and dispatches them. For user messages,
//! persistence strictly precedes broadcast, and failures are reported only
//! to the originating connection.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use fitchat_proto::codec;
use fitchat_proto::event::{ClientEvent, ServerEvent};
use fitchat_proto::room::RoomKey;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::registry::ConnId;
use crate::server::ChatState;

/// Handles an upgraded WebSocket connection for its whole lifetime.
///
/// The connection lifecycle:
/// 1. Register an outbound queue with the connection registry.
/// 2. Spawn a writer task draining that queue into the socket.
/// 3. Run the reader loop, dispatching inbound events.
/// 4. On disconnect (either direction), unregister, which leaves every
///    joined room.
pub async fn handle_socket(socket: WebSocket, state: Arc<ChatState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::channel::<Message>(state.send_queue_capacity);
    let conn = state.registry.register(tx).await;
    tracing::info!(conn = %conn, "connection opened");

    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(conn = %conn, "WebSocket write failed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_client_event(conn, text.as_str(), &reader_state).await;
                }
                Message::Close(_) => {
                    tracing::info!(conn = %conn, "received close frame");
                    break;
                }
                _ => {
                    // Ignore binary, ping, pong frames.
                }
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.registry.unregister(conn).await;
    tracing::info!(conn = %conn, "connection closed and left all rooms");
}

/// Dispatches one inbound text frame from a connection.
async fn handle_client_event(conn: ConnId, text: &str, state: &Arc<ChatState>) {
    let event = match codec::decode_client(text) {
        Ok(event) => event,
        Err(e) => {
            // Unknown frames are skipped; well-formed events with bad
            // contents get an error event below.
            tracing::warn!(conn = %conn, error = %e, "undecodable frame, skipping");
            return;
        }
    };

    match event {
        ClientEvent::JoinRoom { room } => match RoomKey::parse(&room) {
            Ok(key) => {
                state.registry.join(conn, &key).await;
                tracing::debug!(conn = %conn, room = %key, "joined room");
            }
            Err(e) => report(state, conn, &e).await,
        },
        ClientEvent::UsrMessage(draft) => {
            let key = match RoomKey::resolve(&draft.from, &draft.to) {
                Ok(key) => key,
                Err(e) => {
                    report(state, conn, &e).await;
                    return;
                }
            };
            // Persist first; only a stored message is ever broadcast.
            match state.store.append(draft).await {
                Ok(message) => {
                    tracing::debug!(
                        conn = %conn,
                        room = %key,
                        id = %message.id,
                        "message stored, fanning out"
                    );
                    state
                        .registry
                        .broadcast(&key, &ServerEvent::SendMessage { message }, None)
                        .await;
                }
                Err(e) => {
                    tracing::warn!(conn = %conn, error = %e, "append failed, nothing broadcast");
                    report(state, conn, &e).await;
                }
            }
        }
        ClientEvent::SawMessage(notice) => {
            match RoomKey::resolve(&notice.from, &notice.to) {
                Ok(key) => {
                    // Live hint only; the durable flag goes through the
                    // REST facade independently.
                    state
                        .registry
                        .broadcast(&key, &ServerEvent::seen(notice), Some(conn))
                        .await;
                }
                Err(e) => report(state, conn, &e).await,
            }
        }
    }
}

/// Reports a failure to the originating connection only.
async fn report(state: &Arc<ChatState>, conn: ConnId, reason: &impl std::fmt::Display) {
    state.registry.send_to(conn, &ServerEvent::error(reason)).await;
}
