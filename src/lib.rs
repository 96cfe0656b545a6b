// Public API for integration tests and potential library usage

pub mod api;
pub mod app;
pub mod bots;
pub mod broadcast;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod media;
pub mod protocol;
pub mod roles;
pub mod state;
pub mod types;
pub mod ws;

pub use app::{router, AppState};
