pub mod handlers;
pub mod lobby;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::app::AppState;
use crate::protocol::{ClientMessage, ServerMessage, PROTOCOL_VERSION};
use crate::types::{ParticipantId, RoomId};

/// Slack on top of the base64-inflated media limit for the JSON envelope
const FRAME_OVERHEAD: usize = 64 * 1024;

/// Per-connection state: who this socket is and which room it sits in
#[derive(Debug)]
pub struct Session {
    pub participant_id: ParticipantId,
    pub room_id: Option<RoomId>,
    /// Where room tasks push messages for this connection
    pub outlet: mpsc::UnboundedSender<ServerMessage>,
}

impl Session {
    pub fn new(outlet: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            participant_id: ulid::Ulid::new().to_string(),
            room_id: None,
            outlet,
        }
    }
}

/// Largest text frame accepted from a client
pub fn max_frame_bytes(max_media_bytes: usize) -> usize {
    max_media_bytes / 3 * 4 + FRAME_OVERHEAD
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let limit = max_frame_bytes(state.config.max_media_bytes);
    ws.max_message_size(limit)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_json(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            true
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (outlet, mut inbox) = mpsc::unbounded_channel();
    let mut session = Session::new(outlet);

    tracing::info!("WebSocket connected: {}", session.participant_id);

    let welcome = ServerMessage::Welcome {
        protocol: PROTOCOL_VERSION.to_string(),
        participant_id: session.participant_id.clone(),
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if !send_json(&mut sender, &welcome).await {
        tracing::error!("Failed to send welcome message");
        return;
    }

    loop {
        tokio::select! {
            // Pushed by the room task
            room_msg = inbox.recv() => {
                let Some(msg) = room_msg else { break };
                if !send_json(&mut sender, &msg).await {
                    break;
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::trace!("Received message: {}", text.as_str());

                        let response = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handlers::handle_message(client_msg, &mut session, &state).await
                            }
                            Err(e) => {
                                tracing::debug!("Failed to parse client message: {}", e);
                                Some(ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                })
                            }
                        };

                        if let Some(response) = response {
                            if !send_json(&mut sender, &response).await {
                                tracing::error!("Failed to send response");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    lobby::leave_current(&state, &mut session).await;
    tracing::info!("WebSocket connection closed: {}", session.participant_id);
}
