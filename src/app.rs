use axum::{http::HeaderValue, routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::directory::RoomDirectory;
use crate::{api, ws};

/// Shared state behind every handler
pub struct AppState {
    pub config: ServerConfig,
    pub rooms: RoomDirectory,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let rooms = RoomDirectory::new(&config);
        Self { config, rooms }
    }
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    match &config.cors_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| match o.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any)
        }
        None => CorsLayer::permissive(),
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/health", get(api::health))
        .route("/api/rooms", get(api::list_rooms))
        .route("/api/rooms/{id}", get(api::get_room))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
