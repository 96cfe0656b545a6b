//! Authoritative state of one room: roster, phase, accumulators and results.
//!
//! `GameRoom` is plain data plus synchronous rules. It never schedules
//! anything and never talks to the network; the phase scheduler drives it
//! and the room actor owns it.

pub mod night;
pub mod view;
pub mod vote;

use std::sync::Arc;

use rand::Rng;

use crate::bots::{self, DecisionPolicy};
use crate::error::{GameError, GameResult};
use crate::roles;
use crate::types::*;

pub use night::{NightAck, NightActions};
pub use view::{LobbyInfo, ParticipantView, RevealedParticipant, RoomInfo, RoomSummary, RoomView};
pub use vote::DayVotes;

/// Options chosen by the creator of a room
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomOptions {
    pub max_players: usize,
    pub is_private: bool,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            max_players: MAX_PLAYERS,
            is_private: true,
        }
    }
}

impl RoomOptions {
    /// Build options from client input, clamping capacity into 5..=10
    pub fn new(max_players: Option<usize>, is_private: Option<bool>) -> Self {
        let defaults = Self::default();
        Self {
            max_players: max_players
                .unwrap_or(defaults.max_players)
                .clamp(MIN_PLAYERS, MAX_PLAYERS),
            is_private: is_private.unwrap_or(defaults.is_private),
        }
    }

    /// Public room with full capacity (quick match)
    pub fn public() -> Self {
        Self {
            is_private: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct GameRoom {
    pub id: RoomId,
    pub host_id: ParticipantId,
    pub is_private: bool,
    pub max_players: usize,
    pub phase: Phase,
    pub round: u32,
    /// Join order; seats are the index into this list
    roster: Vec<Participant>,
    pub night: NightActions,
    pub day_votes: DayVotes,
    /// Index into the alive list during speaking phases
    pub current_speaker: Option<usize>,
    pub phase_messages: Vec<ChatEntry>,
    pub last_night_result: Option<NightResult>,
    pub last_vote_result: Option<VoteResult>,
    pub narration: Narration,
    pub winner: Option<Team>,
    roles_dealt: bool,
}

impl GameRoom {
    /// Create a room with its host already seated
    pub fn new(id: RoomId, host: Participant, options: RoomOptions) -> Self {
        let mut room = Self {
            id,
            host_id: host.id.clone(),
            is_private: options.is_private,
            max_players: options.max_players,
            phase: Phase::Lobby,
            round: 0,
            roster: Vec::with_capacity(options.max_players),
            night: NightActions::default(),
            day_votes: DayVotes::default(),
            current_speaker: None,
            phase_messages: Vec::new(),
            last_night_result: None,
            last_vote_result: None,
            narration: Narration::default(),
            winner: None,
            roles_dealt: false,
        };
        room.seat(host);
        room
    }

    // ========== Roster ==========

    pub fn participants(&self) -> &[Participant] {
        &self.roster
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.roster.iter().find(|p| p.id == id)
    }

    pub fn participant_mut(&mut self, id: &str) -> Option<&mut Participant> {
        self.roster.iter_mut().find(|p| p.id == id)
    }

    pub fn seat_of(&self, id: &str) -> Option<usize> {
        self.participant(id).map(|p| p.seat)
    }

    pub fn player_count(&self) -> usize {
        self.roster.len()
    }

    pub fn is_full(&self) -> bool {
        self.roster.len() >= self.max_players
    }

    pub fn humans(&self) -> impl Iterator<Item = &Participant> {
        self.roster.iter().filter(|p| !p.is_bot())
    }

    pub fn human_count(&self) -> usize {
        self.humans().count()
    }

    pub fn alive(&self) -> impl Iterator<Item = &Participant> {
        self.roster.iter().filter(|p| p.alive)
    }

    pub fn alive_ids(&self) -> Vec<ParticipantId> {
        self.alive().map(|p| p.id.clone()).collect()
    }

    pub fn alive_count(&self) -> usize {
        self.alive().count()
    }

    /// Position of `id` in the alive list (the speaking order)
    pub fn alive_index_of(&self, id: &str) -> Option<usize> {
        self.alive().position(|p| p.id == id)
    }

    /// Participant holding the floor, if a speaking turn is active
    pub fn current_speaker_id(&self) -> Option<ParticipantId> {
        let idx = self.current_speaker?;
        self.alive().nth(idx).map(|p| p.id.clone())
    }

    fn seat(&mut self, mut participant: Participant) -> usize {
        let seat = self.roster.len();
        participant.seat = seat;
        self.roster.push(participant);
        seat
    }

    /// Seat a new participant. Only possible in the lobby with a free seat.
    pub fn add_participant(&mut self, participant: Participant) -> GameResult<usize> {
        if self.phase != Phase::Lobby {
            return Err(GameError::GameInProgress);
        }
        if self.is_full() {
            return Err(GameError::RoomFull);
        }
        if self.participant(&participant.id).is_some() {
            return Err(GameError::NotAllowed("Already seated in this room"));
        }
        Ok(self.seat(participant))
    }

    /// Seat one bot driven by `policy`
    pub fn add_bot(&mut self, policy: Arc<dyn DecisionPolicy>) -> GameResult<Participant> {
        let bot = bots::create_bot(policy);
        self.add_participant(bot.clone())?;
        Ok(bot)
    }

    /// Fill every free seat with bots, returning the bots added
    pub fn fill_with_bots(&mut self, policy: Arc<dyn DecisionPolicy>) -> GameResult<Vec<Participant>> {
        if self.phase != Phase::Lobby {
            return Err(GameError::GameInProgress);
        }
        if self.is_full() {
            return Err(GameError::RoomFull);
        }

        let mut added = Vec::new();
        while !self.is_full() {
            added.push(self.add_bot(policy.clone())?);
        }
        tracing::info!(
            "[room {}] Added {} bots, {} seated",
            self.id,
            added.len(),
            self.player_count()
        );
        Ok(added)
    }

    /// Remove a participant, re-pack seats and drop their pending actions.
    ///
    /// If the host leaves, the earliest-joined remaining human takes over.
    pub fn remove_participant(&mut self, id: &str) -> Option<Participant> {
        let index = self.roster.iter().position(|p| p.id == id)?;
        let removed = self.roster.remove(index);

        for (seat, p) in self.roster.iter_mut().enumerate() {
            p.seat = seat;
        }

        self.night.forget(&removed);
        self.day_votes.forget(&removed.id);

        if self.host_id == removed.id {
            let next = self.humans().next().map(|p| (p.id.clone(), p.name.clone()));
            if let Some((next_id, next_name)) = next {
                tracing::info!("[room {}] Host handed over to {}", self.id, next_name);
                self.host_id = next_id;
            }
        }

        Some(removed)
    }

    // ========== Game flow ==========

    pub fn can_start(&self) -> GameResult<()> {
        if self.phase != Phase::Lobby {
            return Err(GameError::GameInProgress);
        }
        if self.player_count() < MIN_PLAYERS {
            return Err(GameError::InsufficientPlayers {
                min: MIN_PLAYERS,
                current: self.player_count(),
            });
        }
        Ok(())
    }

    /// Move to `to`, rejecting anything the phase graph does not allow
    pub fn transition(&mut self, to: Phase) -> GameResult<()> {
        if !self.phase.can_advance_to(to) {
            return Err(GameError::WrongPhase(self.phase));
        }
        tracing::debug!("[room {}] {:?} -> {:?}", self.id, self.phase, to);
        self.phase = to;
        Ok(())
    }

    /// Deal one role per participant in roster order. Once per session.
    pub fn deal_roles<R: Rng>(&mut self, rng: &mut R) -> GameResult<()> {
        if self.roles_dealt {
            return Err(GameError::GameInProgress);
        }
        self.can_start()?;

        let roles = roles::deal(self.player_count(), rng);
        for (participant, role) in self.roster.iter_mut().zip(roles) {
            participant.role = Some(role);
        }
        self.transition(Phase::Dealing)?;
        self.roles_dealt = true;

        tracing::info!(
            "[room {}] Roles dealt: {}",
            self.id,
            self.roster
                .iter()
                .map(|p| format!(
                    "{}={}{}",
                    p.name,
                    p.role.map(Role::label).unwrap_or("?"),
                    if p.is_bot() { "(bot)" } else { "" }
                ))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(())
    }

    pub fn start_introduction(&mut self) -> GameResult<()> {
        self.transition(Phase::Introduction)?;
        self.current_speaker = Some(0);
        self.phase_messages.clear();
        Ok(())
    }

    pub fn start_night(&mut self) -> GameResult<()> {
        self.transition(Phase::Night)?;
        self.round += 1;
        self.night = NightActions::default();
        self.current_speaker = None;
        self.phase_messages.clear();
        Ok(())
    }

    pub fn start_day(&mut self) -> GameResult<()> {
        self.transition(Phase::Day)?;
        self.current_speaker = Some(0);
        self.day_votes = DayVotes::default();
        self.phase_messages.clear();
        Ok(())
    }

    pub fn start_voting(&mut self) -> GameResult<()> {
        self.transition(Phase::Voting)?;
        self.current_speaker = None;
        Ok(())
    }

    pub fn finish(&mut self, winner: Team) -> GameResult<()> {
        self.transition(Phase::GameOver)?;
        self.current_speaker = None;
        self.winner = Some(winner);
        Ok(())
    }

    /// Alive participants per team as (mafia, town)
    pub fn team_counts(&self) -> (usize, usize) {
        self.alive()
            .filter_map(Participant::team)
            .fold((0, 0), |(mafia, town), team| match team {
                Team::Mafia => (mafia + 1, town),
                Team::Town => (mafia, town + 1),
            })
    }

    /// Town wins when no mafia is alive; mafia wins on reaching parity
    pub fn check_win(&self) -> Option<Team> {
        let (mafia, town) = self.team_counts();
        if mafia == 0 {
            Some(Team::Town)
        } else if mafia >= town {
            Some(Team::Mafia)
        } else {
            None
        }
    }

    pub fn set_narration(&mut self, headline: impl Into<String>, subtext: impl Into<String>) {
        self.narration = Narration {
            headline: headline.into(),
            subtext: subtext.into(),
        };
    }

    /// Append to the message log of the current phase
    pub fn log_message(&mut self, participant_id: &str, text: &str) -> Option<ChatEntry> {
        let name = self.participant(participant_id)?.name.clone();
        let entry = ChatEntry {
            participant_id: participant_id.to_string(),
            name,
            text: text.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        self.phase_messages.push(entry.clone());
        Some(entry)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bots::HeuristicPolicy;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    pub(crate) fn human(id: &str) -> Participant {
        Participant::human(
            id.to_string(),
            Identity {
                user_id: None,
                name: Some(id.to_uppercase()),
                avatar: None,
            },
        )
    }

    /// Room with humans `p0..p{n-1}` seated in order
    pub(crate) fn room_with(n: usize) -> GameRoom {
        let mut room = GameRoom::new("1234".to_string(), human("p0"), RoomOptions::default());
        for i in 1..n {
            room.add_participant(human(&format!("p{}", i))).unwrap();
        }
        room
    }

    /// Room with `roles` assigned to `p0..` and phase forced to `phase`
    pub(crate) fn room_with_roles(roles: &[Role], phase: Phase) -> GameRoom {
        let mut room = room_with(roles.len());
        for (p, role) in room.roster.iter_mut().zip(roles) {
            p.role = Some(*role);
        }
        room.roles_dealt = true;
        room.phase = phase;
        room
    }

    pub(crate) fn kill(room: &mut GameRoom, id: &str) {
        room.participant_mut(id).unwrap().alive = false;
    }

    #[test]
    fn test_new_room_seats_host() {
        let room = room_with(1);
        assert_eq!(room.phase, Phase::Lobby);
        assert_eq!(room.round, 0);
        assert_eq!(room.host_id, "p0");
        assert_eq!(room.participant("p0").unwrap().seat, 0);
    }

    #[test]
    fn test_seats_follow_join_order() {
        let room = room_with(4);
        let seats: Vec<usize> = room.participants().iter().map(|p| p.seat).collect();
        assert_eq!(seats, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_add_participant_rejects_full_room() {
        let mut room = GameRoom::new(
            "1".to_string(),
            human("p0"),
            RoomOptions::new(Some(5), Some(false)),
        );
        for i in 1..5 {
            room.add_participant(human(&format!("p{}", i))).unwrap();
        }
        assert_eq!(room.add_participant(human("late")), Err(GameError::RoomFull));
    }

    #[test]
    fn test_add_participant_rejects_started_game() {
        let mut room = room_with(5);
        room.deal_roles(&mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(
            room.add_participant(human("late")),
            Err(GameError::GameInProgress)
        );
    }

    #[test]
    fn test_room_options_clamp() {
        assert_eq!(RoomOptions::new(Some(2), None).max_players, 5);
        assert_eq!(RoomOptions::new(Some(50), None).max_players, 10);
        assert!(RoomOptions::new(None, None).is_private);
        assert!(!RoomOptions::public().is_private);
    }

    #[test]
    fn test_fill_with_bots() {
        let mut room = room_with(2);
        let added = room.fill_with_bots(Arc::new(HeuristicPolicy)).unwrap();
        assert_eq!(added.len(), 8);
        assert!(room.is_full());
        assert_eq!(room.human_count(), 2);

        assert_eq!(
            room.fill_with_bots(Arc::new(HeuristicPolicy)).unwrap_err(),
            GameError::RoomFull
        );
    }

    #[test]
    fn test_remove_participant_repacks_and_hands_over_host() {
        let mut room = room_with(4);
        room.remove_participant("p0").unwrap();

        assert_eq!(room.host_id, "p1");
        let seats: Vec<(String, usize)> = room
            .participants()
            .iter()
            .map(|p| (p.id.clone(), p.seat))
            .collect();
        assert_eq!(
            seats,
            vec![
                ("p1".to_string(), 0),
                ("p2".to_string(), 1),
                ("p3".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_host_handover_skips_bots() {
        let mut room = room_with(1);
        room.add_bot(Arc::new(HeuristicPolicy)).unwrap();
        room.add_participant(human("p9")).unwrap();

        room.remove_participant("p0");
        assert_eq!(room.host_id, "p9");
    }

    #[test]
    fn test_deal_roles_requires_five() {
        let mut room = room_with(4);
        let err = room.deal_roles(&mut StdRng::seed_from_u64(1)).unwrap_err();
        assert_eq!(err, GameError::InsufficientPlayers { min: 5, current: 4 });
    }

    #[test]
    fn test_deal_roles_once() {
        let mut room = room_with(7);
        let mut rng = StdRng::seed_from_u64(3);
        room.deal_roles(&mut rng).unwrap();

        assert_eq!(room.phase, Phase::Dealing);
        assert!(room.participants().iter().all(|p| p.role.is_some()));

        let mut dealt: Vec<Role> = room.participants().iter().filter_map(|p| p.role).collect();
        let mut expected = roles::distribution(7);
        dealt.sort_by_key(|r| r.label());
        expected.sort_by_key(|r| r.label());
        assert_eq!(dealt, expected);

        assert_eq!(room.deal_roles(&mut rng), Err(GameError::GameInProgress));
    }

    #[test]
    fn test_round_increments_only_on_night() {
        let mut room = room_with_roles(
            &[Role::Mafia, Role::Sheriff, Role::Civilian, Role::Civilian, Role::Civilian],
            Phase::Dealing,
        );
        room.start_introduction().unwrap();
        assert_eq!(room.round, 0);
        room.start_night().unwrap();
        assert_eq!(room.round, 1);
        room.start_day().unwrap();
        room.start_voting().unwrap();
        assert_eq!(room.round, 1);
        room.start_night().unwrap();
        assert_eq!(room.round, 2);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut room = room_with_roles(&[Role::Civilian; 5], Phase::Introduction);
        assert_eq!(room.start_day(), Err(GameError::WrongPhase(Phase::Introduction)));
        assert_eq!(room.phase, Phase::Introduction);
    }

    #[test]
    fn test_check_win_depends_only_on_counts() {
        let roles = [Role::Don, Role::Mafia, Role::Sheriff, Role::Doctor, Role::Civilian, Role::Civilian, Role::Civilian];
        let mut room = room_with_roles(&roles, Phase::Night);
        assert_eq!(room.check_win(), None);

        // 2 mafia vs 3 town: still running
        kill(&mut room, "p4");
        kill(&mut room, "p5");
        assert_eq!(room.check_win(), None);

        // 2 mafia vs 2 town: parity
        kill(&mut room, "p6");
        assert_eq!(room.check_win(), Some(Team::Mafia));
    }

    #[test]
    fn test_check_win_town_when_mafia_gone() {
        let mut room = room_with_roles(
            &[Role::Mafia, Role::Sheriff, Role::Civilian, Role::Civilian, Role::Civilian],
            Phase::Voting,
        );
        kill(&mut room, "p0");
        assert_eq!(room.check_win(), Some(Team::Town));
    }

    #[test]
    fn test_current_speaker_skips_dead() {
        let mut room = room_with_roles(&[Role::Civilian; 5], Phase::Night);
        kill(&mut room, "p1");
        room.start_day().unwrap();
        room.current_speaker = Some(1);
        assert_eq!(room.current_speaker_id(), Some("p2".to_string()));
    }
}
