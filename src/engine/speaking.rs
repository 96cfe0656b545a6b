use crate::bots::{BotMove, Prompt};
use crate::error::{GameError, GameResult};
use crate::state::GameRoom;
use crate::types::Phase;

use super::{PhaseScheduler, Task};

impl PhaseScheduler {
    pub(super) fn begin_introduction(&mut self, room: &mut GameRoom) {
        self.timers.cancel_all();
        if let Err(e) = room.start_introduction() {
            tracing::warn!("[room {}] Cannot start introductions: {}", room.id, e);
            return;
        }
        self.narrate(room, "Introductions", "Everyone introduces themselves in turn");
        self.timers.schedule(self.timings.phase_lead, Task::SpeakerTurn);
    }

    pub(super) fn start_day(&mut self, room: &mut GameRoom) {
        self.timers.cancel_all();
        if let Err(e) = room.start_day() {
            tracing::warn!("[room {}] Cannot start day: {}", room.id, e);
            return;
        }
        self.narrate(room, "Day. Discussion.", "Who do we suspect?");
        self.timers.schedule(self.timings.phase_lead, Task::SpeakerTurn);
    }

    /// Hand the floor to the participant at the current index, or close the
    /// phase once everyone alive has spoken
    pub(super) fn run_turn(&mut self, room: &mut GameRoom) {
        let alive = room.alive_count();
        let index = room.current_speaker.unwrap_or(alive).min(alive);

        if index == alive {
            room.current_speaker = Some(alive);
            let (headline, subtext, next) = match room.phase {
                Phase::Introduction => (
                    "Everyone has introduced themselves.",
                    "The first night is coming...",
                    Task::StartNight,
                ),
                Phase::Day => ("Discussion is over.", "Time to vote...", Task::StartVoting),
                other => {
                    tracing::warn!("[room {}] Speaking turn during {:?}", room.id, other);
                    return;
                }
            };
            self.narrate(room, headline, subtext);
            self.timers.schedule(self.timings.phase_outro, next);
            return;
        }

        let Some(speaker) = room.alive().nth(index) else {
            return;
        };
        let (id, name, is_bot) = (speaker.id.clone(), speaker.name.clone(), speaker.is_bot());
        room.current_speaker = Some(index);

        self.narrate(
            room,
            format!("{}, the floor is yours", name),
            format!(
                "{} of {} · {}s",
                index + 1,
                alive,
                self.timings.speaking_turn.as_secs()
            ),
        );

        if is_bot {
            let delay = self.timings.bot_speech.sample(&mut self.rng);
            self.timers.schedule(delay, Task::BotSpeech { speaker: id });
        } else {
            self.timers
                .schedule(self.timings.speaking_turn, Task::AdvanceSpeaker);
        }
    }

    pub(super) fn advance_speaker(&mut self, room: &mut GameRoom) {
        room.current_speaker = Some(room.current_speaker.map_or(0, |i| i + 1));
        self.run_turn(room);
    }

    pub(super) fn bot_speech(&mut self, room: &mut GameRoom, speaker: &str) {
        if room.current_speaker_id().as_deref() != Some(speaker) {
            tracing::debug!("[room {}] Dropping speech of {}, floor moved on", room.id, speaker);
            return;
        }

        let prompt = match room.phase {
            Phase::Introduction => Prompt::Introduce,
            _ => Prompt::Discuss,
        };
        match self.decide(room, speaker, prompt) {
            Some(BotMove::Say(text)) => self.say(room, speaker, &text),
            Some(other) => tracing::debug!("[room {}] Ignoring {:?} during a turn", room.id, other),
            None => {}
        }

        self.timers
            .schedule(self.timings.bot_post_speech, Task::AdvanceSpeaker);
    }

    /// The exact current speaker gives up the floor early.
    ///
    /// Cancels the pending turn ceiling and advances exactly as the ceiling
    /// would have. Anyone else gets `StaleTurn`, which is never reported.
    pub fn finish_speaking(&mut self, room: &mut GameRoom, who: &str) -> GameResult<()> {
        if !room.phase.is_speaking() || room.current_speaker_id().as_deref() != Some(who) {
            return Err(GameError::StaleTurn);
        }

        let dropped = self.timers.cancel_all();
        tracing::debug!(
            "[room {}] {} finished speaking ({} timers cancelled)",
            room.id,
            who,
            dropped
        );
        self.advance_speaker(room);
        Ok(())
    }
}
