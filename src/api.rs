//! HTTP endpoints next to the WebSocket: health and room discovery.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::error::GameError;
use crate::state::LobbyInfo;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub rooms: usize,
    pub timestamp: String,
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        rooms: state.rooms.room_count().await,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /api/rooms
///
/// Public lobbies with at least one free seat.
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<LobbyInfo>> {
    Json(state.rooms.list_open_rooms().await)
}

/// GET /api/rooms/{id}
///
/// Broadcast view of one room; roles stay hidden until the game is over.
pub async fn get_room(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.rooms.snapshot(&id).await {
        Ok(view) => Json(view).into_response(),
        Err(GameError::RoomNotFound) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "code": GameError::RoomNotFound.code(),
                "msg": GameError::RoomNotFound.to_string(),
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to snapshot room {}: {}", id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
