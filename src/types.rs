use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::bots::DecisionPolicy;

/// Opaque ID types for type safety
pub type RoomId = String;
pub type ParticipantId = String;

pub const MIN_PLAYERS: usize = 5;
pub const MAX_PLAYERS: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lobby,
    Dealing,
    Introduction,
    Night,
    Day,
    Voting,
    GameOver,
}

impl Phase {
    /// Phases in which participants take speaking turns
    pub fn is_speaking(self) -> bool {
        matches!(self, Phase::Introduction | Phase::Day)
    }

    /// Roles have been dealt and the game has not finished yet
    pub fn is_in_game(self) -> bool {
        !matches!(self, Phase::Lobby | Phase::GameOver)
    }

    /// Check if a phase transition is valid
    pub fn can_advance_to(self, to: Phase) -> bool {
        use Phase::*;

        match (self, to) {
            (Lobby, Dealing) => true,
            (Dealing, Introduction) => true,
            (Introduction, Night) => true,
            (Night, Day) => true,
            (Day, Voting) => true,
            (Voting, Night) => true,

            // A decided game can end from any in-game phase
            (from, GameOver) => from.is_in_game(),

            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Mafia,
    Don,
    Sheriff,
    Doctor,
    Civilian,
}

impl Role {
    pub fn team(self) -> Team {
        match self {
            Role::Mafia | Role::Don => Team::Mafia,
            Role::Sheriff | Role::Doctor | Role::Civilian => Team::Town,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Mafia => "Mafia",
            Role::Don => "Don",
            Role::Sheriff => "Sheriff",
            Role::Doctor => "Doctor",
            Role::Civilian => "Civilian",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Mafia,
    Town,
}

/// Who is driving a seat: a connected human or a synthetic stand-in
#[derive(Clone)]
pub enum ParticipantKind {
    Human,
    Synthetic(Arc<dyn DecisionPolicy>),
}

impl fmt::Debug for ParticipantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantKind::Human => f.write_str("Human"),
            ParticipantKind::Synthetic(policy) => write!(f, "Synthetic({})", policy.name()),
        }
    }
}

/// Identity details a client sends when entering a room
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub id: ParticipantId,
    /// External account id (Telegram id for humans, the bot id for bots)
    pub user_id: String,
    pub name: String,
    pub avatar: Option<String>,
    pub avatar_color: Option<String>,
    pub kind: ParticipantKind,
    pub role: Option<Role>,
    pub alive: bool,
    pub seat: usize,
}

impl Participant {
    /// Build a human participant from the identity sent by their client
    pub fn human(id: ParticipantId, identity: Identity) -> Self {
        let short: String = id.chars().skip(id.chars().count().saturating_sub(4)).collect();
        let user_id = identity.user_id.unwrap_or_else(|| id.clone());
        let name = identity
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Player_{}", short));

        Self {
            id,
            user_id,
            name,
            avatar: identity.avatar,
            avatar_color: None,
            kind: ParticipantKind::Human,
            role: None,
            alive: true,
            seat: 0,
        }
    }

    pub fn is_bot(&self) -> bool {
        matches!(self.kind, ParticipantKind::Synthetic(_))
    }

    pub fn policy(&self) -> Option<Arc<dyn DecisionPolicy>> {
        match &self.kind {
            ParticipantKind::Human => None,
            ParticipantKind::Synthetic(policy) => Some(policy.clone()),
        }
    }

    pub fn team(&self) -> Option<Team> {
        self.role.map(Role::team)
    }
}

/// Target of a day vote: a participant or the "skip" sentinel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VoteTarget {
    Skip,
    Participant(ParticipantId),
}

pub const SKIP_VOTE: &str = "skip";

impl From<String> for VoteTarget {
    fn from(value: String) -> Self {
        if value == SKIP_VOTE {
            VoteTarget::Skip
        } else {
            VoteTarget::Participant(value)
        }
    }
}

impl From<VoteTarget> for String {
    fn from(value: VoteTarget) -> Self {
        match value {
            VoteTarget::Skip => SKIP_VOTE.to_string(),
            VoteTarget::Participant(id) => id,
        }
    }
}

/// One line in the per-phase message log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatEntry {
    pub participant_id: ParticipantId,
    pub name: String,
    pub text: String,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Victim {
    pub id: ParticipantId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NightResult {
    pub killed: Option<Victim>,
    pub saved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ejection {
    pub id: ParticipantId,
    pub name: String,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoteResult {
    /// voter id -> target id (or "skip")
    pub votes: BTreeMap<ParticipantId, VoteTarget>,
    pub ejected: Option<Ejection>,
}

/// Headline and subtext shown to every observer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Narration {
    pub headline: String,
    pub subtext: String,
}

impl Default for Narration {
    fn default() -> Self {
        Self {
            headline: "Waiting for players...".to_string(),
            subtext: String::new(),
        }
    }
}

// ========== Timing ==========

/// A uniformly sampled delay window used for human-plausible bot pacing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn sample<R: rand::Rng>(&self, rng: &mut R) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        rng.random_range(self.min..self.max)
    }

    fn scaled(self, divisor: u32) -> Self {
        Self {
            min: self.min / divisor,
            max: self.max / divisor,
        }
    }
}

/// Every delay the phase scheduler uses
#[derive(Debug, Clone, PartialEq)]
pub struct Timings {
    /// Time players get to look at their role before introductions
    pub reveal_window: Duration,
    /// Pause between a phase announcement and its first action
    pub phase_lead: Duration,
    /// Ceiling for a human speaking turn
    pub speaking_turn: Duration,
    pub bot_speech: DelayRange,
    /// Pause after a bot has spoken before the next turn
    pub bot_post_speech: Duration,
    /// Pause after the last speaker before the next phase
    pub phase_outro: Duration,
    pub night_wake: Duration,
    pub bot_night_action: DelayRange,
    /// Ceiling for the whole night, measured from night entry
    pub night_ceiling: Duration,
    pub dawn: Duration,
    pub result_pause: Duration,
    pub game_over_pause: Duration,
    pub bot_vote: DelayRange,
    pub vote_ceiling: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        let ms = Duration::from_millis;
        let secs = Duration::from_secs;
        Self {
            reveal_window: secs(6),
            phase_lead: secs(2),
            speaking_turn: secs(30),
            bot_speech: DelayRange::new(ms(1500), secs(4)),
            bot_post_speech: ms(1500),
            phase_outro: secs(3),
            night_wake: secs(2),
            bot_night_action: DelayRange::new(secs(2), secs(6)),
            night_ceiling: secs(30),
            dawn: secs(2),
            result_pause: secs(4),
            game_over_pause: secs(3),
            bot_vote: DelayRange::new(secs(1), secs(4)),
            vote_ceiling: secs(10),
        }
    }
}

impl Timings {
    /// Divide every delay by `divisor` (used for fast local games and tests)
    pub fn scaled(&self, divisor: u32) -> Self {
        let d = divisor.max(1);
        Self {
            reveal_window: self.reveal_window / d,
            phase_lead: self.phase_lead / d,
            speaking_turn: self.speaking_turn / d,
            bot_speech: self.bot_speech.scaled(d),
            bot_post_speech: self.bot_post_speech / d,
            phase_outro: self.phase_outro / d,
            night_wake: self.night_wake / d,
            bot_night_action: self.bot_night_action.scaled(d),
            night_ceiling: self.night_ceiling / d,
            dawn: self.dawn / d,
            result_pause: self.result_pause / d,
            game_over_pause: self.game_over_pause / d,
            bot_vote: self.bot_vote.scaled(d),
            vote_ceiling: self.vote_ceiling / d,
        }
    }
}
