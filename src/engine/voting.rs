use crate::bots::{BotMove, Prompt};
use crate::broadcast::Envelope;
use crate::error::GameResult;
use crate::protocol::ServerMessage;
use crate::state::GameRoom;
use crate::types::*;

use super::{PhaseScheduler, Task};

impl PhaseScheduler {
    pub(super) fn start_voting(&mut self, room: &mut GameRoom) {
        self.timers.cancel_all();
        if let Err(e) = room.start_voting() {
            tracing::warn!("[room {}] Cannot start voting: {}", room.id, e);
            return;
        }
        self.narrate(room, "Voting!", "Choose who leaves the table");

        let voters: Vec<ParticipantId> = room
            .alive()
            .filter(|p| p.is_bot())
            .map(|p| p.id.clone())
            .collect();
        for bot in voters {
            let delay = self.timings.bot_vote.sample(&mut self.rng);
            self.timers.schedule(delay, Task::BotVote { bot });
        }

        self.timers
            .schedule(self.timings.vote_ceiling, Task::ResolveVoting);
    }

    pub(super) fn bot_vote(&mut self, room: &mut GameRoom, bot: &str) {
        if room.phase != Phase::Voting {
            return;
        }
        if let Some(BotMove::Target { target, .. }) = self.decide(room, bot, Prompt::Vote) {
            if let Err(e) = self.day_vote(room, bot, VoteTarget::Participant(target)) {
                tracing::warn!("[room {}] Vote of {} rejected: {}", room.id, bot, e);
            }
        }
    }

    /// Record a day vote and announce it to the room
    pub fn day_vote(
        &mut self,
        room: &mut GameRoom,
        voter: &str,
        target: VoteTarget,
    ) -> GameResult<()> {
        room.cast_day_vote(voter, target.clone())?;

        let voter_name = room
            .participant(voter)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        let target_name = match &target {
            VoteTarget::Participant(id) => room.participant(id).map(|p| p.name.clone()),
            VoteTarget::Skip => None,
        };
        self.emit(Envelope::room(ServerMessage::VoteCast {
            voter_id: voter.to_string(),
            voter_name,
            target,
            target_name,
        }));
        Ok(())
    }

    pub(super) fn resolve_voting(&mut self, room: &mut GameRoom) {
        self.timers.cancel_all();
        if room.phase != Phase::Voting {
            tracing::warn!("[room {}] Vote resolution during {:?}", room.id, room.phase);
            return;
        }

        let result = room.resolve_day_vote();
        match &result.ejected {
            Some(ejected) => {
                let headline = format!("{} leaves the table!", ejected.name);
                let subtext = format!("Role: {}", ejected.role.map(Role::label).unwrap_or("unknown"));
                self.narrate(room, headline, subtext);
            }
            None => self.narrate(room, "Nobody was ejected.", "No majority was reached"),
        }
        self.emit(Envelope::room(ServerMessage::VoteResult { result }));

        self.continue_or_end(room, self.timings.result_pause, Task::StartNight);
    }
}
