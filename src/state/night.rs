use crate::error::{GameError, GameResult};
use crate::types::*;

use super::GameRoom;

/// Actions collected during one night. Reset on every night entry.
#[derive(Debug, Clone, Default)]
pub struct NightActions {
    /// (mafia member, target); one entry per member, last pick wins
    mafia_votes: Vec<(ParticipantId, ParticipantId)>,
    pub doctor_target: Option<ParticipantId>,
    pub sheriff_target: Option<ParticipantId>,
    /// Result of the last resolution; cleared whenever an action is recorded
    outcome: Option<NightResult>,
}

impl NightActions {
    pub fn mafia_votes(&self) -> &[(ParticipantId, ParticipantId)] {
        &self.mafia_votes
    }

    pub fn has_mafia_vote(&self, member: &str) -> bool {
        self.mafia_votes.iter().any(|(m, _)| m == member)
    }

    fn record_mafia_vote(&mut self, member: &str, target: &str) {
        match self.mafia_votes.iter_mut().find(|(m, _)| m == member) {
            Some(entry) => entry.1 = target.to_string(),
            None => self
                .mafia_votes
                .push((member.to_string(), target.to_string())),
        }
    }

    /// Drop everything the departing participant contributed
    pub(super) fn forget(&mut self, departed: &Participant) {
        self.mafia_votes.retain(|(m, _)| *m != departed.id);
        match departed.role {
            Some(Role::Doctor) => self.doctor_target = None,
            Some(Role::Sheriff) => self.sheriff_target = None,
            _ => {}
        }
    }
}

/// What a recorded night action amounted to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NightAck {
    MafiaVote,
    DoctorSave,
    SheriffCheck { is_mafia: bool },
}

impl GameRoom {
    /// Record a night action from `actor` against `target`, dispatched by role
    pub fn record_night_action(&mut self, actor: &str, target: &str) -> GameResult<NightAck> {
        if self.phase != Phase::Night {
            return Err(GameError::WrongPhase(self.phase));
        }

        let actor_p = self.participant(actor).ok_or(GameError::NotInRoom)?;
        if !actor_p.alive {
            return Err(GameError::NotAlive);
        }
        let role = actor_p.role.ok_or(GameError::NotAllowed("No role dealt"))?;

        let target_p = self
            .participant(target)
            .filter(|p| p.alive)
            .ok_or(GameError::InvalidTarget)?;
        let target_team = target_p.team();

        let ack = match role {
            Role::Mafia | Role::Don => {
                if target_team == Some(Team::Mafia) {
                    return Err(GameError::InvalidTarget);
                }
                self.night.record_mafia_vote(actor, target);
                tracing::debug!("[room {}] Mafia {} targets {}", self.id, actor, target);
                NightAck::MafiaVote
            }
            Role::Doctor => {
                self.night.doctor_target = Some(target.to_string());
                tracing::debug!("[room {}] Doctor protects {}", self.id, target);
                NightAck::DoctorSave
            }
            Role::Sheriff => {
                if self.night.sheriff_target.is_some() {
                    return Err(GameError::AlreadyActed);
                }
                if actor == target {
                    return Err(GameError::InvalidTarget);
                }
                self.night.sheriff_target = Some(target.to_string());
                let is_mafia = target_team == Some(Team::Mafia);
                tracing::debug!(
                    "[room {}] Sheriff checks {} (mafia: {})",
                    self.id,
                    target,
                    is_mafia
                );
                NightAck::SheriffCheck { is_mafia }
            }
            Role::Civilian => return Err(GameError::NotAllowed("Civilians have no night action")),
        };

        self.night.outcome = None;
        Ok(ack)
    }

    /// Target with the most mafia votes. Ties go to the lowest seat.
    pub fn plurality_target(&self) -> Option<ParticipantId> {
        let mut tally: Vec<(&ParticipantId, u32)> = Vec::new();
        for (_, target) in &self.night.mafia_votes {
            match tally.iter_mut().find(|(t, _)| *t == target) {
                Some(entry) => entry.1 += 1,
                None => tally.push((target, 1)),
            }
        }

        let seat = |id: &str| self.seat_of(id).unwrap_or(usize::MAX);
        tally
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| seat(b.0).cmp(&seat(a.0))))
            .map(|(target, _)| target.clone())
    }

    /// Apply the night: the plurality target dies unless the doctor chose it.
    ///
    /// Resolving again without a new action returns the same result.
    pub fn resolve_night(&mut self) -> NightResult {
        if let Some(done) = &self.night.outcome {
            return done.clone();
        }

        let target = self.plurality_target();
        let saved = target.is_some() && target == self.night.doctor_target;

        let mut killed = None;
        match target {
            Some(_) if saved => {
                tracing::info!("[room {}] Night {}: doctor saved the target", self.id, self.round);
            }
            Some(id) => match self.participant_mut(&id) {
                Some(victim) if victim.alive => {
                    victim.alive = false;
                    killed = Some(Victim {
                        id: victim.id.clone(),
                        name: victim.name.clone(),
                    });
                }
                _ => tracing::warn!("[room {}] Night target {} is gone", self.id, id),
            },
            None => {}
        }

        if let Some(victim) = &killed {
            tracing::info!("[room {}] Night {}: {} was killed", self.id, self.round, victim.name);
        }

        let result = NightResult { killed, saved };
        self.night.outcome = Some(result.clone());
        self.last_night_result = Some(result.clone());
        result
    }
}
