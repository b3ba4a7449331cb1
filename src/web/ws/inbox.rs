//! Mailbox notification WebSocket.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};

use crate::notify::Broadcaster;
use crate::web::handlers::AppState;

/// WebSocket handler for new-message notifications.
///
/// GET /ws/messages/:mailbox_id
///
/// The socket is registered with the broadcaster once the handshake has
/// completed. Text sent by the client is only echoed back.
pub async fn inbox_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(mailbox_id): Path<String>,
) -> Response {
    let broadcaster = state.broadcaster.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, broadcaster, mailbox_id))
}

async fn handle_socket(socket: WebSocket, broadcaster: Arc<Broadcaster>, mailbox_id: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut events) = Broadcaster::channel();
    let subscriber_id = broadcaster.subscribe(&mailbox_id, tx).await;

    tracing::debug!(mailbox_id = %mailbox_id, subscriber_id, "WebSocket connected");

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let echo = format!("Echo: {}", text.as_str());
                        if ws_sender.send(Message::Text(echo.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(mailbox_id = %mailbox_id, error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            event = events.recv() => {
                // None: the broadcaster dropped this subscriber.
                let Some(event) = event else { break };
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if ws_sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
                }
            }
        }
    }

    broadcaster.unsubscribe(&mailbox_id, subscriber_id).await;
    tracing::debug!(mailbox_id = %mailbox_id, subscriber_id, "WebSocket disconnected");
}
