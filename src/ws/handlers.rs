//! WebSocket message dispatch
//!
//! Membership messages are handled against the directory; everything else
//! is forwarded to the session's room task as a [`RoomAction`].

use crate::directory::RoomAction;
use crate::error::GameError;
use crate::protocol::{ClientMessage, ServerMessage};

use super::{lobby, AppState, Session};

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    session: &mut Session,
    state: &AppState,
) -> Option<ServerMessage> {
    let action = match msg {
        ClientMessage::CreateRoom {
            max_players,
            is_private,
            identity,
        } => {
            return lobby::handle_create_room(state, session, max_players, is_private, identity)
                .await
        }
        ClientMessage::JoinRoom { room_id, identity } => {
            return lobby::handle_join_room(state, session, room_id, identity).await
        }
        ClientMessage::QuickMatch { identity } => {
            return lobby::handle_quick_match(state, session, identity).await
        }
        ClientMessage::LeaveRoom => return lobby::handle_leave_room(state, session).await,
        ClientMessage::ListRooms => return lobby::handle_list_rooms(state).await,

        ClientMessage::AddBot => RoomAction::AddBot,
        ClientMessage::FillWithBots => RoomAction::FillWithBots,
        ClientMessage::StartGame => RoomAction::StartGame,
        ClientMessage::FinishSpeaking => RoomAction::FinishSpeaking,
        ClientMessage::NightAction { target_id } => RoomAction::NightAction { target_id },
        ClientMessage::DayVote { target_id } => RoomAction::DayVote { target: target_id },
        ClientMessage::SendChat { text, mafia_only } => RoomAction::Chat { text, mafia_only },
        ClientMessage::SendMedia {
            kind,
            payload,
            duration_seconds,
            mafia_only,
        } => RoomAction::Media {
            kind,
            payload,
            duration_seconds,
            mafia_only,
        },
        ClientMessage::React { target_id, kind } => RoomAction::React { target_id, kind },
    };

    forward(state, session, action).await
}

/// Send an in-room action to the session's room; successes are answered by
/// the room's own broadcasts
async fn forward(
    state: &AppState,
    session: &mut Session,
    action: RoomAction,
) -> Option<ServerMessage> {
    let Some(room_id) = session.room_id.clone() else {
        return GameError::NotInRoom.into_message();
    };

    match state
        .rooms
        .act(&room_id, &session.participant_id, action)
        .await
    {
        Ok(()) => None,
        Err(e) => {
            if matches!(e, GameError::RoomNotFound | GameError::NotInRoom) {
                session.room_id = None;
            }
            e.into_message()
        }
    }
}
