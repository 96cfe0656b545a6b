use serde::{Deserialize, Serialize};

use crate::types::*;

use super::GameRoom;

/// One seat as an observer sees it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantView {
    pub id: ParticipantId,
    pub user_id: String,
    pub name: String,
    pub avatar: Option<String>,
    pub avatar_color: Option<String>,
    pub seat: usize,
    pub alive: bool,
    pub is_bot: bool,
    pub is_host: bool,
    /// Present only for the viewer's own seat, or for everyone once the game is over
    pub role: Option<Role>,
}

/// Phase snapshot sent as `phase_state`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomView {
    pub room_id: RoomId,
    pub phase: Phase,
    pub round: u32,
    pub players: Vec<ParticipantView>,
    pub my_role: Option<Role>,
    /// Index into the alive list, -1 when no turn is active
    pub current_speaker: i64,
    pub max_players: usize,
    pub phase_messages: Vec<ChatEntry>,
    pub last_night_result: Option<NightResult>,
    pub last_vote_result: Option<VoteResult>,
    pub narrator: Narration,
    pub winner: Option<Team>,
}

/// Roster snapshot carried by room_created / room_joined / room_updated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub host_id: ParticipantId,
    pub phase: Phase,
    pub is_private: bool,
    pub max_players: usize,
    pub players: Vec<ParticipantView>,
}

/// Directory-level summary of a room, kept current by the room actor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub host_id: ParticipantId,
    pub player_count: usize,
    pub human_count: usize,
    pub max_players: usize,
    pub phase: Phase,
    pub is_private: bool,
}

impl RoomSummary {
    /// Listed in the lobby and eligible for quick match
    pub fn is_open(&self) -> bool {
        !self.is_private && self.phase == Phase::Lobby && self.player_count < self.max_players
    }

    pub fn lobby_info(&self) -> LobbyInfo {
        LobbyInfo {
            room_id: self.room_id.clone(),
            player_count: self.player_count,
            max_players: self.max_players,
        }
    }
}

/// Entry of the rooms list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LobbyInfo {
    pub room_id: RoomId,
    pub player_count: usize,
    pub max_players: usize,
}

/// Final roster entry in game_over, roles revealed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevealedParticipant {
    pub id: ParticipantId,
    pub name: String,
    pub role: Option<Role>,
    pub alive: bool,
    pub is_bot: bool,
}

impl GameRoom {
    fn participant_views(&self, viewer: Option<&str>) -> Vec<ParticipantView> {
        let reveal_all = self.phase == Phase::GameOver;
        self.participants()
            .iter()
            .map(|p| ParticipantView {
                id: p.id.clone(),
                user_id: p.user_id.clone(),
                name: p.name.clone(),
                avatar: p.avatar.clone(),
                avatar_color: p.avatar_color.clone(),
                seat: p.seat,
                alive: p.alive,
                is_bot: p.is_bot(),
                is_host: p.id == self.host_id,
                role: if reveal_all || viewer == Some(p.id.as_str()) {
                    p.role
                } else {
                    None
                },
            })
            .collect()
    }

    fn view(&self, viewer: Option<&str>) -> RoomView {
        RoomView {
            room_id: self.id.clone(),
            phase: self.phase,
            round: self.round,
            players: self.participant_views(viewer),
            my_role: viewer.and_then(|id| self.participant(id)).and_then(|p| p.role),
            current_speaker: self
                .current_speaker
                .map(|i| i as i64)
                .unwrap_or(-1),
            max_players: self.max_players,
            phase_messages: self.phase_messages.clone(),
            last_night_result: self.last_night_result.clone(),
            last_vote_result: self.last_vote_result.clone(),
            narrator: self.narration.clone(),
            winner: self.winner,
        }
    }

    /// Snapshot for `viewer`: their own role, or every role after game over
    pub fn self_view(&self, viewer: &str) -> RoomView {
        self.view(Some(viewer))
    }

    /// Snapshot without any role before game over
    pub fn broadcast_view(&self) -> RoomView {
        self.view(None)
    }

    pub fn room_info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.id.clone(),
            host_id: self.host_id.clone(),
            phase: self.phase,
            is_private: self.is_private,
            max_players: self.max_players,
            players: self.participant_views(None),
        }
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            room_id: self.id.clone(),
            host_id: self.host_id.clone(),
            player_count: self.player_count(),
            human_count: self.human_count(),
            max_players: self.max_players,
            phase: self.phase,
            is_private: self.is_private,
        }
    }

    pub fn revealed_roster(&self) -> Vec<RevealedParticipant> {
        self.participants()
            .iter()
            .map(|p| RevealedParticipant {
                id: p.id.clone(),
                name: p.name.clone(),
                role: p.role,
                alive: p.alive,
                is_bot: p.is_bot(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::{room_with, room_with_roles};

    fn roles_visible(view: &RoomView) -> Vec<&str> {
        view.players
            .iter()
            .filter(|p| p.role.is_some())
            .map(|p| p.id.as_str())
            .collect()
    }

    #[test]
    fn test_self_view_reveals_only_own_role() {
        let room = room_with_roles(
            &[Role::Mafia, Role::Sheriff, Role::Civilian, Role::Civilian, Role::Civilian],
            Phase::Night,
        );
        let view = room.self_view("p1");
        assert_eq!(view.my_role, Some(Role::Sheriff));
        assert_eq!(roles_visible(&view), vec!["p1"]);
    }

    #[test]
    fn test_broadcast_view_hides_roles() {
        let room = room_with_roles(&[Role::Mafia, Role::Civilian, Role::Civilian, Role::Civilian, Role::Doctor], Phase::Day);
        let view = room.broadcast_view();
        assert!(view.my_role.is_none());
        assert!(roles_visible(&view).is_empty());

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("night").is_none());
        assert!(json.get("day_votes").is_none());
    }

    #[test]
    fn test_game_over_reveals_all() {
        let mut room = room_with_roles(&[Role::Mafia, Role::Civilian, Role::Civilian, Role::Civilian, Role::Sheriff], Phase::Voting);
        room.finish(Team::Town).unwrap();

        assert_eq!(roles_visible(&room.broadcast_view()).len(), 5);
        assert_eq!(room.self_view("p2").winner, Some(Team::Town));
    }

    #[test]
    fn test_current_speaker_inactive_is_minus_one() {
        let room = room_with(3);
        assert_eq!(room.broadcast_view().current_speaker, -1);
    }

    #[test]
    fn test_summary_open_only_for_public_lobby() {
        let mut room = room_with(3);
        assert!(!room.summary().is_open());

        room.is_private = false;
        assert!(room.summary().is_open());
        assert_eq!(room.summary().lobby_info().player_count, 3);

        room.phase = Phase::Dealing;
        assert!(!room.summary().is_open());
    }

    #[test]
    fn test_room_info_marks_host() {
        let room = room_with(2);
        let info = room.room_info();
        assert!(info.players[0].is_host);
        assert!(!info.players[1].is_host);
    }
}
