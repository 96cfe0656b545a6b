use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::protocol::ServerMessage;
use crate::state::GameRoom;
use crate::types::{Participant, ParticipantId, Phase, Team};

/// Who receives an outbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Audience {
    /// Every human in the room
    Room,
    Participant(ParticipantId),
    /// Living humans of the mafia team. Only messages emitted at night go out.
    MafiaTeam {
        /// Phase at the moment the message was emitted
        sent_in: Phase,
    },
}

impl Audience {
    pub fn includes(&self, participant: &Participant) -> bool {
        match self {
            Audience::Room => true,
            Audience::Participant(id) => participant.id == *id,
            Audience::MafiaTeam { sent_in } => {
                *sent_in == Phase::Night
                    && participant.alive
                    && participant.team() == Some(Team::Mafia)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub audience: Audience,
    pub message: ServerMessage,
}

impl Envelope {
    pub fn room(message: ServerMessage) -> Self {
        Self {
            audience: Audience::Room,
            message,
        }
    }

    pub fn to(id: impl Into<ParticipantId>, message: ServerMessage) -> Self {
        Self {
            audience: Audience::Participant(id.into()),
            message,
        }
    }

    /// Mafia channel message emitted during `phase`
    pub fn mafia(phase: Phase, message: ServerMessage) -> Self {
        Self {
            audience: Audience::MafiaTeam { sent_in: phase },
            message,
        }
    }
}

/// Per-connection senders of the humans seated in one room
#[derive(Debug, Default)]
pub struct Outlets {
    senders: HashMap<ParticipantId, mpsc::UnboundedSender<ServerMessage>>,
}

impl Outlets {
    pub fn attach(&mut self, id: ParticipantId, tx: mpsc::UnboundedSender<ServerMessage>) {
        self.senders.insert(id, tx);
    }

    pub fn detach(&mut self, id: &str) -> Option<mpsc::UnboundedSender<ServerMessage>> {
        self.senders.remove(id)
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Fire-and-forget send; a closed connection is cleaned up by its own leave
    pub fn send_to(&self, id: &str, message: ServerMessage) {
        if let Some(tx) = self.senders.get(id) {
            if tx.send(message).is_err() {
                tracing::debug!("Outlet for {} is closed", id);
            }
        }
    }

    /// Resolve each envelope's audience against the roster and send
    pub fn deliver(&self, room: &GameRoom, envelopes: impl IntoIterator<Item = Envelope>) {
        for envelope in envelopes {
            for participant in room.humans() {
                if envelope.audience.includes(participant) {
                    self.send_to(&participant.id, envelope.message.clone());
                }
            }
        }
    }
}
