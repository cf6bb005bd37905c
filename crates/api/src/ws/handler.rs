use aether_core::appointment::Requester;
use aether_core::realtime::{ClientFrame, RoomId};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde_json::json;

use crate::middleware::requester::requester_from_headers;
use crate::state::AppState;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// The caller's identity headers are captured at upgrade time; sockets
/// without one stay connected but cannot join rooms.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let requester = requester_from_headers(&headers);
    ws.on_upgrade(move |socket| handle_socket(socket, state, requester))
}

/// Manage a single WebSocket connection after upgrade.
///
/// The connection is registered with both `WsManager` (control frames) and
/// `RoomHub` (room events). A sender task drains both queues into the sink
/// while inbound `room.join` / `room.leave` frames are handled here.
async fn handle_socket(socket: WebSocket, state: AppState, requester: Option<Requester>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        conn_id = %conn_id,
        user_id = requester.map(|r| r.id),
        "WebSocket connected"
    );

    let mut control_rx = state.ws_manager.add(conn_id.clone(), requester).await;
    let mut room_rx = state.rooms.connect(conn_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        loop {
            // Control frames first, so a join ack precedes the room's events.
            let outbound = tokio::select! {
                biased;
                control = control_rx.recv() => match control {
                    Some(msg) => msg,
                    None => break,
                },
                event = room_rx.recv() => match event {
                    Some(event) => match serde_json::to_string(&event) {
                        Ok(text) => Message::Text(text.into()),
                        Err(e) => {
                            tracing::warn!(error = %e, kind = event.kind(), "Failed to encode room event");
                            continue;
                        }
                    },
                    None => break,
                },
            };
            let closing = matches!(outbound, Message::Close(_));
            if sink.send(outbound).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Text(text)) => {
                handle_frame(&state, &conn_id, text.as_str()).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.rooms.disconnect(&conn_id).await;
    state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

/// Apply one inbound client frame for a connection registered with both
/// `WsManager` and `RoomHub`. Replies go out on the connection's control
/// queue.
pub async fn handle_frame(state: &AppState, conn_id: &str, text: &str) {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(conn_id, error = %e, "Unrecognized client frame");
            reply(state, conn_id, json!({ "type": "error", "message": "Unrecognized frame" })).await;
            return;
        }
    };

    match frame {
        ClientFrame::RoomJoin { conversation_id } => {
            let requester = state.ws_manager.requester(conn_id).await;
            if let Err(message) = authorize_join(state, requester, conversation_id).await {
                reply(
                    state,
                    conn_id,
                    json!({ "type": "error", "message": message, "conversation_id": conversation_id }),
                )
                .await;
                return;
            }
            if state.rooms.join(conn_id, conversation_id).await {
                reply(
                    state,
                    conn_id,
                    json!({ "type": "room.joined", "conversation_id": conversation_id }),
                )
                .await;
            }
        }
        ClientFrame::RoomLeave { conversation_id } => {
            state.rooms.leave(conn_id, conversation_id).await;
            reply(
                state,
                conn_id,
                json!({ "type": "room.left", "conversation_id": conversation_id }),
            )
            .await;
        }
    }
}

/// Customers may join their own conversation's room; staff may join any.
async fn authorize_join(
    state: &AppState,
    requester: Option<Requester>,
    room: RoomId,
) -> Result<(), &'static str> {
    let Some(requester) = requester else {
        return Err("Identify with x-user-id before joining rooms");
    };
    match state.chat.conversation(room).await {
        Ok(conversation) if requester.is_staff() || conversation.customer_id == requester.id => {
            Ok(())
        }
        Ok(_) => Err("Conversation not found"),
        Err(e) => {
            tracing::debug!(room, error = %e, "Room join refused");
            Err("Conversation not found")
        }
    }
}

async fn reply(state: &AppState, conn_id: &str, body: serde_json::Value) {
    state
        .ws_manager
        .send_to(conn_id, Message::Text(body.to_string().into()))
        .await;
}
