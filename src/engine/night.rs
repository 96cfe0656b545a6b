use crate::bots::{BotMove, Prompt};
use crate::broadcast::Envelope;
use crate::error::GameResult;
use crate::protocol::ServerMessage;
use crate::state::{GameRoom, NightAck};
use crate::types::*;

use super::{PhaseScheduler, Task};

impl PhaseScheduler {
    pub(super) fn start_night(&mut self, room: &mut GameRoom) {
        self.timers.cancel_all();
        if let Err(e) = room.start_night() {
            tracing::warn!("[room {}] Cannot start night: {}", room.id, e);
            return;
        }
        let subtext = format!("Night {}", room.round);
        self.narrate(room, "The city falls asleep...", subtext);

        self.timers.schedule(self.timings.night_wake, Task::WakeMafia);
        // Measured from night entry, not from wake-up
        self.timers
            .schedule(self.timings.night_ceiling, Task::ResolveNight);
    }

    pub(super) fn wake_mafia(&mut self, room: &mut GameRoom) {
        self.narrate(room, "The mafia wakes up.", "The mafia is choosing a victim...");

        let actors: Vec<ParticipantId> = room
            .alive()
            .filter(|p| p.is_bot() && p.role.is_some_and(|r| r != Role::Civilian))
            .map(|p| p.id.clone())
            .collect();
        for bot in actors {
            let delay = self.timings.bot_night_action.sample(&mut self.rng);
            self.timers.schedule(delay, Task::BotNightAction { bot });
        }
    }

    pub(super) fn bot_night_action(&mut self, room: &mut GameRoom, bot: &str) {
        if room.phase != Phase::Night {
            return;
        }
        let Some(BotMove::Target { target, line }) = self.decide(room, bot, Prompt::NightAction)
        else {
            return;
        };

        match room.record_night_action(bot, &target) {
            Ok(ack) => {
                if let NightAck::SheriffCheck { is_mafia } = ack {
                    let team = if is_mafia { Team::Mafia } else { Team::Town };
                    self.sheriff_notes
                        .entry(bot.to_string())
                        .or_default()
                        .insert(target.clone(), team);
                }

                if let (Some(text), Some(me)) = (line, room.participant(bot)) {
                    let message = ServerMessage::MafiaChat {
                        participant_id: me.id.clone(),
                        name: me.name.clone(),
                        text,
                        target_id: Some(target),
                    };
                    self.emit(Envelope::mafia(room.phase, message));
                }
            }
            Err(e) => tracing::warn!("[room {}] Night action of {} rejected: {}", room.id, bot, e),
        }
    }

    /// Night action from a human. The sheriff hears back immediately.
    pub fn night_action(
        &mut self,
        room: &mut GameRoom,
        actor: &str,
        target: &str,
    ) -> GameResult<NightAck> {
        let ack = room.record_night_action(actor, target)?;

        if let NightAck::SheriffCheck { is_mafia } = ack {
            let target_name = room
                .participant(target)
                .map(|p| p.name.clone())
                .unwrap_or_default();
            self.emit(Envelope::to(
                actor,
                ServerMessage::SheriffResult {
                    target_id: target.to_string(),
                    target_name,
                    is_mafia,
                },
            ));
        }
        Ok(ack)
    }

    pub(super) fn resolve_night(&mut self, room: &mut GameRoom) {
        self.timers.cancel_all();
        if room.phase != Phase::Night {
            tracing::warn!("[room {}] Night resolution during {:?}", room.id, room.phase);
            return;
        }

        room.resolve_night();
        self.narrate(room, "The city wakes up!", "Morning comes...");
        self.timers.schedule(self.timings.dawn, Task::AnnounceNight);
    }

    pub(super) fn announce_night(&mut self, room: &mut GameRoom) {
        let Some(result) = room.last_night_result.clone() else {
            return;
        };

        match (&result.killed, result.saved) {
            (Some(victim), _) => {
                let headline = format!("{} was killed tonight", victim.name);
                self.narrate(room, headline, "Rest in peace...");
            }
            (None, true) => self.narrate(room, "Nobody died tonight!", "The doctor saved the victim!"),
            (None, false) => self.narrate(room, "Nobody died tonight!", "The mafia missed"),
        }
        self.emit(Envelope::room(ServerMessage::NightResult { result }));

        self.continue_or_end(room, self.timings.result_pause, Task::StartDay);
    }
}
