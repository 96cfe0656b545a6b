//! One task per room. It owns the `GameRoom`, the phase scheduler and the
//! outlets of the humans seated there; everything that touches the room
//! goes through its inbox, so actions and timers never interleave.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::bots::DecisionPolicy;
use crate::broadcast::{Envelope, Outlets};
use crate::engine::{self, PhaseScheduler};
use crate::error::{GameError, GameResult};
use crate::media::{self, MediaKind};
use crate::protocol::ServerMessage;
use crate::state::{GameRoom, RoomInfo, RoomSummary, RoomView};
use crate::types::*;

const INBOX_CAPACITY: usize = 64;

/// What a seated participant asks the room to do
#[derive(Debug, Clone)]
pub enum RoomAction {
    AddBot,
    FillWithBots,
    StartGame,
    FinishSpeaking,
    NightAction {
        target_id: ParticipantId,
    },
    DayVote {
        target: VoteTarget,
    },
    Chat {
        text: String,
        mafia_only: bool,
    },
    Media {
        kind: MediaKind,
        payload: String,
        duration_seconds: f64,
        mafia_only: bool,
    },
    React {
        target_id: ParticipantId,
        kind: String,
    },
}

pub enum RoomCommand {
    Join {
        participant: Participant,
        outlet: mpsc::UnboundedSender<ServerMessage>,
        reply: oneshot::Sender<GameResult<RoomInfo>>,
    },
    Leave {
        participant_id: ParticipantId,
        reply: oneshot::Sender<LeaveOutcome>,
    },
    Act {
        participant_id: ParticipantId,
        action: RoomAction,
        reply: oneshot::Sender<GameResult<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<RoomView>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeaveOutcome {
    pub removed: bool,
    /// No human is left; the room task has stopped
    pub closed: bool,
}

/// Shared per-room settings handed down by the directory
#[derive(Clone)]
pub struct RoomSettings {
    pub timings: Timings,
    pub max_media_bytes: usize,
    pub policy: Arc<dyn DecisionPolicy>,
}

/// Cheap, cloneable address of a room task
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> GameResult<T> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(build(reply))
            .await
            .map_err(|_| GameError::RoomNotFound)?;
        rx.await.map_err(|_| GameError::RoomNotFound)
    }

    pub async fn join(
        &self,
        participant: Participant,
        outlet: mpsc::UnboundedSender<ServerMessage>,
    ) -> GameResult<RoomInfo> {
        self.request(|reply| RoomCommand::Join {
            participant,
            outlet,
            reply,
        })
        .await?
    }

    pub async fn leave(&self, participant_id: &str) -> GameResult<LeaveOutcome> {
        self.request(|reply| RoomCommand::Leave {
            participant_id: participant_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn act(&self, participant_id: &str, action: RoomAction) -> GameResult<()> {
        self.request(|reply| RoomCommand::Act {
            participant_id: participant_id.to_string(),
            action,
            reply,
        })
        .await?
    }

    pub async fn snapshot(&self) -> GameResult<RoomView> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }
}

/// Spawn the task for a freshly created room whose host is already seated
pub fn spawn_room(
    room: GameRoom,
    host_outlet: mpsc::UnboundedSender<ServerMessage>,
    settings: RoomSettings,
) -> (RoomHandle, watch::Receiver<RoomSummary>, JoinHandle<()>) {
    let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
    let (summary_tx, summary_rx) = watch::channel(room.summary());

    let mut outlets = Outlets::default();
    outlets.attach(room.host_id.clone(), host_outlet);

    let handle = RoomHandle {
        room_id: room.id.clone(),
        sender,
    };
    let actor = RoomActor {
        room,
        scheduler: None,
        epoch: Instant::now(),
        outlets,
        settings,
        summary_tx,
    };
    let task = tokio::spawn(actor.run(inbox));

    (handle, summary_rx, task)
}

struct RoomActor {
    room: GameRoom,
    /// Attached once, when the host starts the game
    scheduler: Option<PhaseScheduler>,
    /// Wall-clock origin of the scheduler's logical clock
    epoch: Instant,
    outlets: Outlets,
    settings: RoomSettings,
    summary_tx: watch::Sender<RoomSummary>,
}

impl RoomActor {
    async fn run(mut self, mut inbox: mpsc::Receiver<RoomCommand>) {
        tracing::info!("[room {}] Room task started", self.room.id);

        loop {
            let deadline = self
                .scheduler
                .as_ref()
                .and_then(PhaseScheduler::next_deadline)
                .map(|due| self.epoch + due);

            tokio::select! {
                command = inbox.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = async {
                    match deadline {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending::<()>().await,
                    }
                } => self.fire_timers(),
            }

            self.flush();
            if self.room.human_count() == 0 {
                break;
            }
        }

        tracing::info!("[room {}] Room task stopped", self.room.id);
    }

    /// Apply one command. Output is flushed before the reply goes out, so a
    /// caller that awaited the reply sees the updated summary.
    fn handle(&mut self, command: RoomCommand) {
        // Bring the logical clock to now first, so anything the command
        // schedules is measured from the moment it arrived
        self.fire_timers();

        match command {
            RoomCommand::Join {
                participant,
                outlet,
                reply,
            } => {
                let result = self.join(participant, outlet);
                self.flush();
                let _ = reply.send(result);
            }
            RoomCommand::Leave {
                participant_id,
                reply,
            } => {
                let removed = self.leave(&participant_id);
                self.flush();
                let _ = reply.send(LeaveOutcome {
                    removed,
                    closed: self.room.human_count() == 0,
                });
            }
            RoomCommand::Act {
                participant_id,
                action,
                reply,
            } => {
                let result = self.act(&participant_id, action);
                if let Err(e) = &result {
                    tracing::debug!(
                        "[room {}] Rejected action from {}: {}",
                        self.room.id,
                        participant_id,
                        e
                    );
                }
                self.flush();
                let _ = reply.send(result);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.room.broadcast_view());
            }
        }
    }

    fn fire_timers(&mut self) {
        let now = self.epoch.elapsed();
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.fire_due(&mut self.room, now);
        }
    }

    /// Deliver scheduler output and refresh the directory summary
    fn flush(&mut self) {
        if let Some(scheduler) = self.scheduler.as_mut() {
            let envelopes = scheduler.take_outbox();
            self.outlets.deliver(&self.room, envelopes);
        }

        let summary = self.room.summary();
        self.summary_tx.send_if_modified(|current| {
            if *current == summary {
                false
            } else {
                *current = summary;
                true
            }
        });
    }

    /// Tell everyone but `except` about the current roster
    fn room_updated(&self, except: Option<&str>) {
        let message = ServerMessage::RoomUpdated {
            room: self.room.room_info(),
        };
        for human in self.room.humans() {
            if Some(human.id.as_str()) != except {
                self.outlets.send_to(&human.id, message.clone());
            }
        }
    }

    fn join(
        &mut self,
        participant: Participant,
        outlet: mpsc::UnboundedSender<ServerMessage>,
    ) -> GameResult<RoomInfo> {
        let id = participant.id.clone();
        let name = participant.name.clone();
        self.room.add_participant(participant)?;
        self.outlets.attach(id.clone(), outlet);

        tracing::info!(
            "[room {}] {} joined ({}/{})",
            self.room.id,
            name,
            self.room.player_count(),
            self.room.max_players
        );
        self.room_updated(Some(&id));
        Ok(self.room.room_info())
    }

    fn leave(&mut self, participant_id: &str) -> bool {
        self.outlets.detach(participant_id);
        let removed = match self.scheduler.as_mut() {
            Some(scheduler) => scheduler.depart(&mut self.room, participant_id),
            None => self.room.remove_participant(participant_id),
        };

        match removed {
            Some(p) => {
                tracing::info!("[room {}] {} left", self.room.id, p.name);
                self.room_updated(None);
                true
            }
            None => false,
        }
    }

    fn require_host(&self, who: &str, what: &'static str) -> GameResult<()> {
        if self.room.host_id == who {
            Ok(())
        } else {
            Err(GameError::NotHost(what))
        }
    }

    fn act(&mut self, who: &str, action: RoomAction) -> GameResult<()> {
        if self.room.participant(who).is_none() {
            return Err(GameError::NotInRoom);
        }

        match action {
            RoomAction::AddBot => {
                self.require_host(who, "add bots")?;
                let bot = self.room.add_bot(self.settings.policy.clone())?;
                tracing::info!("[room {}] Bot {} added", self.room.id, bot.name);
                self.room_updated(None);
                Ok(())
            }
            RoomAction::FillWithBots => {
                self.require_host(who, "add bots")?;
                self.room.fill_with_bots(self.settings.policy.clone())?;
                self.room_updated(None);
                Ok(())
            }
            RoomAction::StartGame => {
                self.require_host(who, "start the game")?;
                if self.scheduler.is_some() {
                    return Err(GameError::GameInProgress);
                }
                let mut scheduler = PhaseScheduler::new(self.settings.timings.clone());
                scheduler.start(&mut self.room)?;
                self.epoch = Instant::now();
                self.scheduler = Some(scheduler);
                self.room_updated(None);
                Ok(())
            }
            RoomAction::FinishSpeaking => match self.scheduler.as_mut() {
                Some(scheduler) => scheduler.finish_speaking(&mut self.room, who),
                None => Err(GameError::StaleTurn),
            },
            RoomAction::NightAction { target_id } => match self.scheduler.as_mut() {
                Some(scheduler) => scheduler
                    .night_action(&mut self.room, who, &target_id)
                    .map(|_| ()),
                None => Err(GameError::WrongPhase(self.room.phase)),
            },
            RoomAction::DayVote { target } => match self.scheduler.as_mut() {
                Some(scheduler) => scheduler.day_vote(&mut self.room, who, target),
                None => Err(GameError::WrongPhase(self.room.phase)),
            },
            RoomAction::Chat { text, mafia_only } => self.chat(who, &text, mafia_only),
            RoomAction::Media {
                kind,
                payload,
                duration_seconds,
                mafia_only,
            } => self.media(who, kind, payload, duration_seconds, mafia_only),
            RoomAction::React { target_id, kind } => {
                if self.room.participant(&target_id).is_none() {
                    return Err(GameError::InvalidTarget);
                }
                self.outlets.deliver(
                    &self.room,
                    [Envelope::room(ServerMessage::Reaction {
                        from: who.to_string(),
                        target_id,
                        kind,
                    })],
                );
                Ok(())
            }
        }
    }

    /// Only the living mafia may use the mafia channel, and only at night
    fn check_mafia_channel(&self, who: &str) -> GameResult<()> {
        if self.room.phase != Phase::Night {
            return Err(GameError::WrongPhase(self.room.phase));
        }
        match self.room.participant(who) {
            Some(p) if p.alive && p.team() == Some(Team::Mafia) => Ok(()),
            _ => Err(GameError::NotAllowed("Only the living mafia can use this channel")),
        }
    }

    fn chat(&mut self, who: &str, text: &str, mafia_only: bool) -> GameResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let envelope = if mafia_only {
            self.check_mafia_channel(who)?;
            let Some(me) = self.room.participant(who) else {
                return Err(GameError::NotInRoom);
            };
            Envelope::mafia(
                self.room.phase,
                ServerMessage::MafiaChat {
                    participant_id: me.id.clone(),
                    name: me.name.clone(),
                    text: text.to_string(),
                    target_id: None,
                },
            )
        } else {
            match engine::chat_message(&mut self.room, who, text) {
                Some(message) => Envelope::room(message),
                None => return Err(GameError::NotInRoom),
            }
        };

        self.outlets.deliver(&self.room, [envelope]);
        Ok(())
    }

    fn media(
        &mut self,
        who: &str,
        kind: MediaKind,
        payload: String,
        duration_seconds: f64,
        mafia_only: bool,
    ) -> GameResult<()> {
        let size = media::validate_clip(&payload, self.settings.max_media_bytes)?;
        if mafia_only {
            self.check_mafia_channel(who)?;
        }
        let Some(me) = self.room.participant(who) else {
            return Err(GameError::NotInRoom);
        };

        tracing::debug!(
            "[room {}] {:?} clip from {} ({} bytes, {:.1}s)",
            self.room.id,
            kind,
            me.name,
            size,
            duration_seconds
        );
        let message = ServerMessage::Media {
            participant_id: me.id.clone(),
            name: me.name.clone(),
            kind,
            payload,
            duration_seconds,
            mafia_only,
        };
        let envelope = if mafia_only {
            Envelope::mafia(self.room.phase, message)
        } else {
            Envelope::room(message)
        };

        self.outlets.deliver(&self.room, [envelope]);
        Ok(())
    }
}
