//! Errors reported back to the participant whose action caused them.
//!
//! Nothing here ever crosses a room boundary: the room actor answers the
//! originating connection and leaves every other participant untouched.

use crate::protocol::ServerMessage;
use crate::types::Phase;

pub type GameResult<T> = Result<T, GameError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Room is full")]
    RoomFull,

    #[error("No free rooms left on this server")]
    ServerFull,

    #[error("The game has already started")]
    GameInProgress,

    #[error("Only the host can {0}")]
    NotHost(&'static str),

    #[error("Not enough players (min. {min}, now: {current})")]
    InsufficientPlayers { min: usize, current: usize },

    #[error("Not allowed during the {0:?} phase")]
    WrongPhase(Phase),

    /// Finish-turn signal from someone who is not the current speaker.
    /// Raced rather than misused, so it is never reported to the client.
    #[error("Not your turn")]
    StaleTurn,

    #[error("You are not in a room")]
    NotInRoom,

    #[error("Invalid target")]
    InvalidTarget,

    #[error("Dead participants cannot act")]
    NotAlive,

    #[error("{0}")]
    NotAllowed(&'static str),

    #[error("You have already acted this night")]
    AlreadyActed,

    #[error("Invalid media payload: {0}")]
    InvalidMedia(String),

    #[error("Media payload too large ({size} bytes, max {max})")]
    MediaTooLarge { size: usize, max: usize },
}

impl GameError {
    /// Stable machine-readable code sent alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            GameError::RoomNotFound => "ROOM_NOT_FOUND",
            GameError::RoomFull => "ROOM_FULL",
            GameError::ServerFull => "SERVER_FULL",
            GameError::GameInProgress => "GAME_IN_PROGRESS",
            GameError::NotHost(_) => "NOT_HOST",
            GameError::InsufficientPlayers { .. } => "INSUFFICIENT_PLAYERS",
            GameError::WrongPhase(_) => "WRONG_PHASE",
            GameError::StaleTurn => "STALE_TURN",
            GameError::NotInRoom => "NOT_IN_ROOM",
            GameError::InvalidTarget => "INVALID_TARGET",
            GameError::NotAlive => "NOT_ALIVE",
            GameError::NotAllowed(_) => "NOT_ALLOWED",
            GameError::AlreadyActed => "ALREADY_ACTED",
            GameError::InvalidMedia(_) => "INVALID_MEDIA",
            GameError::MediaTooLarge { .. } => "MEDIA_TOO_LARGE",
        }
    }

    /// Whether the originating client should hear about this error at all
    pub fn is_reported(&self) -> bool {
        !matches!(self, GameError::StaleTurn)
    }

    /// Convert into the wire error, or `None` for silently ignored errors
    pub fn into_message(self) -> Option<ServerMessage> {
        if !self.is_reported() {
            return None;
        }
        Some(ServerMessage::Error {
            code: self.code().to_string(),
            msg: self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(GameError::RoomNotFound.code(), "ROOM_NOT_FOUND");
        assert_eq!(GameError::NotHost("start the game").code(), "NOT_HOST");
        assert_eq!(GameError::ServerFull.code(), "SERVER_FULL");
        assert_eq!(
            GameError::InsufficientPlayers { min: 5, current: 3 }.to_string(),
            "Not enough players (min. 5, now: 3)"
        );
    }

    #[test]
    fn test_stale_turn_is_silent() {
        assert!(GameError::StaleTurn.into_message().is_none());

        match GameError::WrongPhase(Phase::Day).into_message() {
            Some(ServerMessage::Error { code, .. }) => assert_eq!(code, "WRONG_PHASE"),
            other => panic!("Expected Error message, got {:?}", other),
        }
    }
}
