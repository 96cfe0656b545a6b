use crate::media::MediaKind;
use crate::state::{LobbyInfo, RevealedParticipant, RoomInfo, RoomView};
use crate::types::*;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom {
        #[serde(default)]
        max_players: Option<usize>,
        #[serde(default)]
        is_private: Option<bool>,
        #[serde(default)]
        identity: Identity,
    },
    JoinRoom {
        room_id: RoomId,
        #[serde(default)]
        identity: Identity,
    },
    LeaveRoom,
    ListRooms,
    QuickMatch {
        #[serde(default)]
        identity: Identity,
    },
    // Host-only, lobby-only
    AddBot,
    FillWithBots,
    StartGame,
    /// Current speaker hands the floor to the next participant
    FinishSpeaking,
    NightAction {
        target_id: ParticipantId,
    },
    /// Target is a participant id or "skip"
    DayVote {
        target_id: VoteTarget,
    },
    SendChat {
        text: String,
        #[serde(default)]
        mafia_only: bool,
    },
    SendMedia {
        kind: MediaKind,
        /// Base64 encoded clip, relayed verbatim
        payload: String,
        #[serde(default)]
        duration_seconds: f64,
        #[serde(default)]
        mafia_only: bool,
    },
    React {
        target_id: ParticipantId,
        kind: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        participant_id: ParticipantId,
        server_now: String,
    },
    RoomCreated {
        room: RoomInfo,
    },
    RoomJoined {
        room: RoomInfo,
    },
    RoomUpdated {
        room: RoomInfo,
    },
    RoomLeft {
        room_id: RoomId,
    },
    RoomsList {
        rooms: Vec<LobbyInfo>,
    },
    Error {
        code: String,
        msg: String,
    },
    /// Full snapshot, filtered for the receiving participant
    PhaseState {
        state: RoomView,
    },
    Chat {
        participant_id: ParticipantId,
        name: String,
        text: String,
        is_bot: bool,
        timestamp: i64,
    },
    /// Night-only channel for the living mafia team
    MafiaChat {
        participant_id: ParticipantId,
        name: String,
        text: String,
        target_id: Option<ParticipantId>,
    },
    VoteCast {
        voter_id: ParticipantId,
        voter_name: String,
        target: VoteTarget,
        target_name: Option<String>,
    },
    NightResult {
        result: NightResult,
    },
    VoteResult {
        result: VoteResult,
    },
    /// Private answer to the sheriff's check
    SheriffResult {
        target_id: ParticipantId,
        target_name: String,
        is_mafia: bool,
    },
    GameOver {
        winner: Team,
        players: Vec<RevealedParticipant>,
    },
    Media {
        participant_id: ParticipantId,
        name: String,
        kind: MediaKind,
        payload: String,
        duration_seconds: f64,
        mafia_only: bool,
    },
    Reaction {
        from: ParticipantId,
        target_id: ParticipantId,
        kind: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_room_defaults() {
        let msg: ClientMessage = serde_json::from_str(r#"{"t":"create_room"}"#).unwrap();
        match msg {
            ClientMessage::CreateRoom {
                max_players,
                is_private,
                identity,
            } => {
                assert!(max_players.is_none());
                assert!(is_private.is_none());
                assert!(identity.name.is_none());
            }
            other => panic!("Expected CreateRoom, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_day_vote_skip() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"t":"day_vote","target_id":"skip"}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::DayVote {
                target_id: VoteTarget::Skip
            }
        ));
    }

    #[test]
    fn test_parse_join_with_identity() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"t":"join_room","room_id":"4821","identity":{"name":"Anna","user_id":"77"}}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::JoinRoom { room_id, identity } => {
                assert_eq!(room_id, "4821");
                assert_eq!(identity.name.as_deref(), Some("Anna"));
                assert_eq!(identity.user_id.as_deref(), Some("77"));
            }
            other => panic!("Expected JoinRoom, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"t":"host_reset_game"}"#).is_err());
    }

    #[test]
    fn test_server_message_tagging() {
        let msg = ServerMessage::Error {
            code: "ROOM_FULL".to_string(),
            msg: "Room is full".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["t"], "error");
        assert_eq!(json["code"], "ROOM_FULL");

        let left = serde_json::to_value(ServerMessage::RoomLeft {
            room_id: "1234".to_string(),
        })
        .unwrap();
        assert_eq!(left["t"], "room_left");
    }
}
