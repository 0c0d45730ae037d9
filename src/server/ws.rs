// WebSocket endpoint bridging clients to their interactive sessions

use super::AppState;
use crate::events::{ClientEvent, SessionEvent};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

pub(super) async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Per-client loop: outbound session events become JSON text frames,
/// inbound text frames become typed client events. The registry entry
/// lives exactly as long as this socket.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4().to_string();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<SessionEvent>();
    state.registry.connect(&client_id, outbound_tx).await;

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            event = outbound_rx.recv() => {
                let Some(event) = event else { break };
                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::error!("Encoding session event failed: {}", e);
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => state.registry.handle_event(&client_id, event).await,
                            Err(e) => {
                                tracing::debug!(
                                    "Client [{}] sent undecodable frame: {}",
                                    client_id,
                                    e
                                );
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue, // binary/ping/pong ignored
                    Some(Err(e)) => {
                        tracing::debug!("Client [{}] socket error: {}", client_id, e);
                        break;
                    }
                }
            }
        }
    }

    state.registry.disconnect(&client_id).await;
}
