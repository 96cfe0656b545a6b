use std::collections::BTreeMap;

use crate::error::{GameError, GameResult};
use crate::types::*;

use super::GameRoom;

/// Day votes keyed by voter, in arrival order. Reset on every day entry.
#[derive(Debug, Clone, Default)]
pub struct DayVotes {
    votes: Vec<(ParticipantId, VoteTarget)>,
    /// Result of the last resolution; cleared by every new ballot
    outcome: Option<VoteResult>,
}

impl DayVotes {
    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn has_voted(&self, voter: &str) -> bool {
        self.votes.iter().any(|(v, _)| v == voter)
    }

    fn cast(&mut self, voter: &str, target: VoteTarget) {
        self.outcome = None;
        match self.votes.iter_mut().find(|(v, _)| v == voter) {
            Some(entry) => entry.1 = target,
            None => self.votes.push((voter.to_string(), target)),
        }
    }

    /// Votes per target, skips excluded
    pub fn tally(&self) -> BTreeMap<&ParticipantId, usize> {
        let mut counts = BTreeMap::new();
        for (_, target) in &self.votes {
            if let VoteTarget::Participant(id) = target {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn snapshot(&self) -> BTreeMap<ParticipantId, VoteTarget> {
        self.votes.iter().cloned().collect()
    }

    /// Drop the departing voter's ballot and any ballots naming them
    pub(super) fn forget(&mut self, departed: &str) {
        self.votes.retain(|(voter, target)| {
            voter != departed && *target != VoteTarget::Participant(departed.to_string())
        });
    }
}

impl GameRoom {
    /// Record or replace a day vote. Accepted during discussion and voting.
    pub fn cast_day_vote(&mut self, voter: &str, target: VoteTarget) -> GameResult<()> {
        if !matches!(self.phase, Phase::Day | Phase::Voting) {
            return Err(GameError::WrongPhase(self.phase));
        }

        let voter_p = self.participant(voter).ok_or(GameError::NotInRoom)?;
        if !voter_p.alive {
            return Err(GameError::NotAlive);
        }

        if let VoteTarget::Participant(id) = &target {
            if !self.participant(id).is_some_and(|p| p.alive) {
                return Err(GameError::InvalidTarget);
            }
        }

        tracing::debug!("[room {}] {} votes {:?}", self.id, voter, target);
        self.day_votes.cast(voter, target);
        Ok(())
    }

    /// Votes needed to eject: a strict majority of the living
    pub fn majority_threshold(&self) -> usize {
        self.alive_count() / 2 + 1
    }

    /// Eject the unique top target if it reached a strict majority.
    ///
    /// Resolving again without a new ballot returns the same result.
    pub fn resolve_day_vote(&mut self) -> VoteResult {
        if let Some(done) = &self.day_votes.outcome {
            return done.clone();
        }

        let threshold = self.majority_threshold();
        let tally = self.day_votes.tally();

        let top = tally.values().copied().max().unwrap_or(0);
        let mut leaders = tally.iter().filter(|(_, count)| **count == top);
        let chosen = match (leaders.next(), leaders.next()) {
            (Some((id, _)), None) if top >= threshold => Some((*id).clone()),
            _ => None,
        };

        let mut ejected = None;
        if let Some(id) = chosen {
            if let Some(p) = self.participant_mut(&id).filter(|p| p.alive) {
                p.alive = false;
                ejected = Some(Ejection {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    role: p.role,
                });
            }
        }

        match &ejected {
            Some(e) => tracing::info!(
                "[room {}] Day {}: {} ejected with {} votes (needed {})",
                self.id,
                self.round,
                e.name,
                top,
                threshold
            ),
            None => tracing::info!(
                "[room {}] Day {}: no ejection (top {}, needed {})",
                self.id,
                self.round,
                top,
                threshold
            ),
        }

        let result = VoteResult {
            votes: self.day_votes.snapshot(),
            ejected,
        };
        self.day_votes.outcome = Some(result.clone());
        self.last_vote_result = Some(result.clone());
        result
    }
}
