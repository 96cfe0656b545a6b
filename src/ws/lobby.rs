//! Room membership: create, join, quick match, leave, list

use crate::directory::MatchKind;
use crate::error::GameError;
use crate::protocol::ServerMessage;
use crate::state::RoomOptions;
use crate::types::{Identity, Participant};

use super::{AppState, Session};

/// Drop the session's current room, if any. Used before entering another one.
pub async fn leave_current(state: &AppState, session: &mut Session) -> Option<ServerMessage> {
    let room_id = session.room_id.take()?;
    match state.rooms.leave_room(&room_id, &session.participant_id).await {
        Ok(outcome) if outcome.removed => {
            tracing::debug!("{} left room {}", session.participant_id, room_id);
        }
        Ok(_) => {}
        // The room went away under us; nothing left to leave
        Err(GameError::RoomNotFound) => {}
        Err(e) => tracing::warn!("Failed to leave room {}: {}", room_id, e),
    }
    Some(ServerMessage::RoomLeft { room_id })
}

fn participant(session: &Session, identity: Identity) -> Participant {
    Participant::human(session.participant_id.clone(), identity)
}

pub async fn handle_create_room(
    state: &AppState,
    session: &mut Session,
    max_players: Option<usize>,
    is_private: Option<bool>,
    identity: Identity,
) -> Option<ServerMessage> {
    leave_current(state, session).await;

    let options = RoomOptions::new(max_players, is_private);
    match state
        .rooms
        .create_room(participant(session, identity), session.outlet.clone(), options)
        .await
    {
        Ok(room) => {
            session.room_id = Some(room.room_id.clone());
            Some(ServerMessage::RoomCreated { room })
        }
        Err(e) => e.into_message(),
    }
}

pub async fn handle_join_room(
    state: &AppState,
    session: &mut Session,
    room_id: String,
    identity: Identity,
) -> Option<ServerMessage> {
    let room_id = room_id.trim().to_string();
    if session.room_id.as_deref() == Some(room_id.as_str()) {
        return GameError::NotAllowed("You are already in this room").into_message();
    }
    leave_current(state, session).await;

    match state
        .rooms
        .join_room(&room_id, participant(session, identity), session.outlet.clone())
        .await
    {
        Ok(room) => {
            session.room_id = Some(room.room_id.clone());
            Some(ServerMessage::RoomJoined { room })
        }
        Err(e) => {
            tracing::info!(
                "{} could not join room {}: {}",
                session.participant_id,
                room_id,
                e
            );
            e.into_message()
        }
    }
}

pub async fn handle_quick_match(
    state: &AppState,
    session: &mut Session,
    identity: Identity,
) -> Option<ServerMessage> {
    leave_current(state, session).await;

    let (room, kind) = match state
        .rooms
        .quick_match(participant(session, identity), session.outlet.clone())
        .await
    {
        Ok(matched) => matched,
        Err(e) => return e.into_message(),
    };
    session.room_id = Some(room.room_id.clone());

    Some(match kind {
        MatchKind::Joined => ServerMessage::RoomJoined { room },
        MatchKind::Created => ServerMessage::RoomCreated { room },
    })
}

pub async fn handle_leave_room(state: &AppState, session: &mut Session) -> Option<ServerMessage> {
    match leave_current(state, session).await {
        Some(left) => Some(left),
        None => GameError::NotInRoom.into_message(),
    }
}

pub async fn handle_list_rooms(state: &AppState) -> Option<ServerMessage> {
    Some(ServerMessage::RoomsList {
        rooms: state.rooms.list_open_rooms().await,
    })
}
