//! PhaseScheduler: drives one `GameRoom` through its phases.
//!
//! Every step is synchronous: the owner hands in the room and either an
//! action or the current time, the scheduler mutates the room, queues
//! follow-up tasks on its own [`TimerQueue`] and collects outbound
//! [`Envelope`]s. Cancelling timers is clearing that queue, so a stale
//! callback can never run against newer state.

mod night;
mod speaking;
pub mod timers;
mod voting;

use std::collections::HashMap;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::bots::{BotMove, BotView, Candidate, Prompt};
use crate::broadcast::Envelope;
use crate::error::GameResult;
use crate::protocol::ServerMessage;
use crate::state::GameRoom;
use crate::types::*;

pub use timers::TimerQueue;

/// Scheduled step of the phase machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    BeginIntroduction,
    /// Announce the participant at the current speaking index
    SpeakerTurn,
    BotSpeech { speaker: ParticipantId },
    /// Move the floor on (turn ceiling or pause after a bot spoke)
    AdvanceSpeaker,
    StartNight,
    WakeMafia,
    BotNightAction { bot: ParticipantId },
    ResolveNight,
    AnnounceNight,
    StartDay,
    StartVoting,
    BotVote { bot: ParticipantId },
    ResolveVoting,
    EndGame { winner: Team },
}

pub struct PhaseScheduler {
    timings: Timings,
    timers: TimerQueue,
    rng: StdRng,
    outbox: Vec<Envelope>,
    /// Checks made by synthetic sheriffs: bot -> (target -> team)
    sheriff_notes: HashMap<ParticipantId, HashMap<ParticipantId, Team>>,
}

impl PhaseScheduler {
    pub fn new(timings: Timings) -> Self {
        Self::with_rng(timings, StdRng::from_os_rng())
    }

    pub fn with_rng(timings: Timings, rng: StdRng) -> Self {
        Self {
            timings,
            timers: TimerQueue::default(),
            rng,
            outbox: Vec::new(),
            sheriff_notes: HashMap::new(),
        }
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    /// Logical time since the game started
    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    /// Logical time of the next pending task
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_due()
    }

    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Envelopes produced since the last call
    pub fn take_outbox(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outbox)
    }

    /// Deal roles and open the reveal window. Host checks are the caller's.
    pub fn start(&mut self, room: &mut GameRoom) -> GameResult<()> {
        room.deal_roles(&mut self.rng)?;
        tracing::info!(
            "[room {}] Game started with {} participants ({} human)",
            room.id,
            room.player_count(),
            room.human_count()
        );

        self.narrate(room, "Good evening, everyone.", "The cards are dealt. Look at your role");
        self.timers
            .schedule(self.timings.reveal_window, Task::BeginIntroduction);
        Ok(())
    }

    /// Run every task due at `now` (logical time since start)
    pub fn fire_due(&mut self, room: &mut GameRoom, now: Duration) -> usize {
        self.timers.advance_to(now);
        let mut fired = 0;
        while let Some(task) = self.timers.pop_due() {
            self.run(room, task);
            fired += 1;
        }
        fired
    }

    /// Jump straight to the next pending task and run it
    pub fn fire_next(&mut self, room: &mut GameRoom) -> bool {
        match self.timers.pop_next() {
            Some(task) => {
                self.run(room, task);
                true
            }
            None => false,
        }
    }

    fn run(&mut self, room: &mut GameRoom, task: Task) {
        tracing::debug!("[room {}] Running {:?} at {:?}", room.id, task, self.now());

        match task {
            Task::BeginIntroduction => self.begin_introduction(room),
            Task::SpeakerTurn => self.run_turn(room),
            Task::BotSpeech { speaker } => self.bot_speech(room, &speaker),
            Task::AdvanceSpeaker => self.advance_speaker(room),
            Task::StartNight => self.start_night(room),
            Task::WakeMafia => self.wake_mafia(room),
            Task::BotNightAction { bot } => self.bot_night_action(room, &bot),
            Task::ResolveNight => self.resolve_night(room),
            Task::AnnounceNight => self.announce_night(room),
            Task::StartDay => self.start_day(room),
            Task::StartVoting => self.start_voting(room),
            Task::BotVote { bot } => self.bot_vote(room, &bot),
            Task::ResolveVoting => self.resolve_voting(room),
            Task::EndGame { winner } => self.end_game(room, winner),
        }
    }

    /// Remove a participant mid-game and repair whatever they were part of
    pub fn depart(&mut self, room: &mut GameRoom, id: &str) -> Option<Participant> {
        let alive_index = room.alive_index_of(id);
        let removed = room.remove_participant(id)?;
        self.sheriff_notes.remove(id);

        if !room.phase.is_in_game() {
            return Some(removed);
        }
        tracing::info!("[room {}] {} left during {:?}", room.id, removed.name, room.phase);

        if let Some(winner) = room.check_win() {
            self.end_game(room, winner);
            return Some(removed);
        }

        if room.phase.is_speaking() {
            if let (Some(current), Some(gone)) = (room.current_speaker, alive_index) {
                if gone < current {
                    room.current_speaker = Some(current - 1);
                } else if gone == current {
                    // The floor passes on right away
                    self.timers.cancel_all();
                    self.run_turn(room);
                    return Some(removed);
                }
            }
        }

        self.publish(room);
        Some(removed)
    }

    // ========== Shared helpers ==========

    fn emit(&mut self, envelope: Envelope) {
        self.outbox.push(envelope);
    }

    /// Queue a self-filtered snapshot for every human
    fn publish(&mut self, room: &GameRoom) {
        for human in room.humans() {
            self.outbox.push(Envelope::to(
                human.id.clone(),
                ServerMessage::PhaseState {
                    state: room.self_view(&human.id),
                },
            ));
        }
    }

    fn narrate(
        &mut self,
        room: &mut GameRoom,
        headline: impl Into<String>,
        subtext: impl Into<String>,
    ) {
        room.set_narration(headline, subtext);
        tracing::info!(
            "[room {}] Narrator: {} | {}",
            room.id,
            room.narration.headline,
            room.narration.subtext
        );
        self.publish(room);
    }

    /// Continue with `next`, or end the game if a team has won
    fn continue_or_end(&mut self, room: &GameRoom, delay: Duration, next: Task) {
        match room.check_win() {
            Some(winner) => {
                tracing::info!("[room {}] {:?} team has won", room.id, winner);
                self.timers
                    .schedule(self.timings.game_over_pause, Task::EndGame { winner });
            }
            None => self.timers.schedule(delay, next),
        }
    }

    fn end_game(&mut self, room: &mut GameRoom, winner: Team) {
        self.timers.cancel_all();
        if let Err(e) = room.finish(winner) {
            tracing::warn!("[room {}] Cannot end game: {}", room.id, e);
            return;
        }
        self.sheriff_notes.clear();

        self.emit(Envelope::room(ServerMessage::GameOver {
            winner,
            players: room.revealed_roster(),
        }));
        match winner {
            Team::Town => self.narrate(room, "The town wins!", "The mafia is destroyed. Peace is restored."),
            Team::Mafia => self.narrate(room, "The mafia wins!", "The city has fallen into darkness."),
        }
    }

    /// What `bot` may know right now; `None` if it cannot act
    fn bot_view(&self, room: &GameRoom, bot: &str) -> Option<BotView> {
        let me = room.participant(bot).filter(|p| p.alive && p.is_bot())?;
        let role = me.role?;
        let notes = self.sheriff_notes.get(bot);

        let candidates = room
            .alive()
            .filter(|p| p.id != me.id)
            .map(|p| Candidate {
                id: p.id.clone(),
                name: p.name.clone(),
                known_team: match role.team() {
                    // The mafia knows its own members, so it knows everyone
                    Team::Mafia => p.team(),
                    Team::Town => notes.and_then(|n| n.get(&p.id).copied()),
                },
            })
            .collect();

        Some(BotView {
            me: me.id.clone(),
            role,
            candidates,
        })
    }

    fn decide(&mut self, room: &GameRoom, bot: &str, prompt: Prompt) -> Option<BotMove> {
        let policy = room.participant(bot)?.policy()?;
        let view = self.bot_view(room, bot)?;
        let decision = policy.decide(&view, prompt, &mut self.rng);
        tracing::debug!("[room {}] {} ({}) {:?} -> {:?}", room.id, bot, policy.name(), prompt, decision);
        Some(decision)
    }

    /// Log a spoken line for the phase and relay it to the room
    fn say(&mut self, room: &mut GameRoom, speaker: &str, text: &str) {
        if let Some(message) = chat_message(room, speaker, text) {
            self.emit(Envelope::room(message));
        }
    }
}

/// Record `text` in the phase log and build the chat frame for it
pub fn chat_message(room: &mut GameRoom, from: &str, text: &str) -> Option<ServerMessage> {
    let is_bot = room.participant(from)?.is_bot();
    let entry = room.log_message(from, text)?;
    tracing::info!("[room {}] {}: {:?}", room.id, entry.name, entry.text);

    Some(ServerMessage::Chat {
        participant_id: entry.participant_id,
        name: entry.name,
        text: entry.text,
        is_bot,
        timestamp: entry.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bots::{self, HeuristicPolicy};
    use crate::broadcast::Audience;
    use crate::error::GameError;
    use crate::state::tests::{human, room_with, room_with_roles};
    use crate::state::RoomOptions;
    use std::sync::Arc;

    pub(super) fn scheduler() -> PhaseScheduler {
        PhaseScheduler::with_rng(Timings::default(), StdRng::seed_from_u64(7))
    }

    fn bot_room(n: usize) -> GameRoom {
        let policy: Arc<dyn bots::DecisionPolicy> = Arc::new(HeuristicPolicy);
        let mut room = GameRoom::new(
            "9000".to_string(),
            bots::create_bot(policy.clone()),
            RoomOptions::new(Some(n), Some(false)),
        );
        room.fill_with_bots(policy).unwrap();
        room
    }

    #[test]
    fn test_start_requires_five() {
        let mut room = room_with(4);
        let mut sched = scheduler();
        assert_eq!(
            sched.start(&mut room),
            Err(GameError::InsufficientPlayers { min: 5, current: 4 })
        );
        assert_eq!(sched.pending(), 0);
        assert_eq!(room.phase, Phase::Lobby);
    }

    #[test]
    fn test_start_deals_and_opens_reveal_window() {
        let mut room = room_with(5);
        let mut sched = scheduler();
        sched.start(&mut room).unwrap();

        assert_eq!(room.phase, Phase::Dealing);
        assert!(room.participants().iter().all(|p| p.role.is_some()));
        assert_eq!(sched.next_deadline(), Some(Timings::default().reveal_window));

        // Each human gets their own snapshot with only their role
        let outbox = sched.take_outbox();
        assert_eq!(outbox.len(), 5);
        for envelope in &outbox {
            match (&envelope.audience, &envelope.message) {
                (Audience::Participant(id), ServerMessage::PhaseState { state }) => {
                    assert_eq!(state.my_role, room.participant(id).unwrap().role);
                    assert_eq!(state.players.iter().filter(|p| p.role.is_some()).count(), 1);
                }
                other => panic!("Unexpected envelope {:?}", other),
            }
        }
    }

    #[test]
    fn test_introduction_starts_after_reveal() {
        let mut room = room_with(5);
        let mut sched = scheduler();
        sched.start(&mut room).unwrap();

        assert_eq!(sched.fire_due(&mut room, Duration::from_secs(5)), 0);
        assert_eq!(sched.fire_due(&mut room, Duration::from_secs(6)), 1);
        assert_eq!(room.phase, Phase::Introduction);
        assert_eq!(room.current_speaker, Some(0));
    }

    #[test]
    fn test_game_over_snapshot_reveals_winner() {
        let mut room = room_with_roles(
            &[Role::Mafia, Role::Sheriff, Role::Civilian, Role::Civilian, Role::Civilian],
            Phase::Voting,
        );
        let mut sched = scheduler();
        sched.end_game(&mut room, Team::Town);

        assert_eq!(room.phase, Phase::GameOver);
        assert_eq!(sched.pending(), 0);
        let outbox = sched.take_outbox();
        assert!(outbox.iter().any(|e| matches!(
            &e.message,
            ServerMessage::GameOver { winner: Team::Town, players } if players.iter().all(|p| p.role.is_some())
        )));
    }

    #[test]
    fn test_departure_of_last_mafia_ends_game() {
        let mut room = room_with_roles(
            &[Role::Mafia, Role::Sheriff, Role::Civilian, Role::Civilian, Role::Civilian],
            Phase::Night,
        );
        let mut sched = scheduler();
        sched.timers.schedule(Duration::from_secs(30), Task::ResolveNight);

        let gone = sched.depart(&mut room, "p0").unwrap();
        assert_eq!(gone.id, "p0");
        assert_eq!(room.phase, Phase::GameOver);
        assert_eq!(room.winner, Some(Team::Town));
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_departure_in_lobby_only_removes() {
        let mut room = room_with(3);
        let mut sched = scheduler();
        sched.depart(&mut room, "p1");
        assert_eq!(room.player_count(), 2);
        assert!(sched.take_outbox().is_empty());
    }

    #[test]
    fn test_bot_only_game_runs_to_completion() {
        for seed in [1u64, 2, 3] {
            let mut room = bot_room(7);
            let mut sched = PhaseScheduler::with_rng(Timings::default(), StdRng::seed_from_u64(seed));
            sched.start(&mut room).unwrap();

            let mut steps = 0;
            while sched.fire_next(&mut room) {
                steps += 1;
                assert!(steps < 20_000, "game did not finish (seed {})", seed);
            }

            assert_eq!(room.phase, Phase::GameOver);
            assert_eq!(room.winner, room.check_win());
            assert!(room.round >= 1);
        }
    }

    #[test]
    fn test_bot_view_for_mafia_knows_teams() {
        let mut room = bot_room(5);
        let mut sched = scheduler();
        sched.start(&mut room).unwrap();

        let mafia = room
            .participants()
            .iter()
            .find(|p| p.team() == Some(Team::Mafia))
            .unwrap()
            .id
            .clone();
        let view = sched.bot_view(&room, &mafia).unwrap();
        assert_eq!(view.candidates.len(), 4);
        assert!(view.candidates.iter().all(|c| c.known_team == Some(Team::Town)));

        let civilian = room
            .participants()
            .iter()
            .find(|p| p.role == Some(Role::Civilian))
            .unwrap()
            .id
            .clone();
        let view = sched.bot_view(&room, &civilian).unwrap();
        assert!(view.candidates.iter().all(|c| c.known_team.is_none()));
        assert!(view.candidates.iter().all(|c| c.id != civilian));
    }

    #[test]
    fn test_bot_view_none_for_humans() {
        let mut room = room_with(5);
        room.add_participant(human("p5")).unwrap();
        let sched = scheduler();
        assert!(sched.bot_view(&room, "p5").is_none());
    }
}
