//! Registry of live rooms.
//!
//! The map only holds handles and summary receivers; the lock is held for
//! lookups, inserts and removals and never across a call into a room.

pub mod worker;

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::{mpsc, watch, RwLock};

use crate::bots::{DecisionPolicy, HeuristicPolicy};
use crate::config::ServerConfig;
use crate::error::{GameError, GameResult};
use crate::protocol::ServerMessage;
use crate::state::{GameRoom, LobbyInfo, RoomInfo, RoomOptions, RoomSummary, RoomView};
use crate::types::*;

pub use worker::{LeaveOutcome, RoomAction, RoomHandle, RoomSettings};

const ROOM_ID_MIN: u32 = 1000;
const ROOM_ID_MAX: u32 = 9999;
/// Random draws before falling back to a scan for a free id
const ROOM_ID_ATTEMPTS: usize = 32;

struct RoomEntry {
    handle: RoomHandle,
    summary: watch::Receiver<RoomSummary>,
}

impl RoomEntry {
    fn is_live(&self) -> bool {
        !self.handle.is_closed()
    }
}

/// How a quick match was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Joined,
    Created,
}

pub struct RoomDirectory {
    rooms: RwLock<HashMap<RoomId, RoomEntry>>,
    settings: RoomSettings,
    room_ids: RangeInclusive<u32>,
}

impl RoomDirectory {
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_settings(RoomSettings {
            timings: config.timings.clone(),
            max_media_bytes: config.max_media_bytes,
            policy: Arc::new(HeuristicPolicy),
        })
    }

    pub fn with_settings(settings: RoomSettings) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            settings,
            room_ids: ROOM_ID_MIN..=ROOM_ID_MAX,
        }
    }

    /// Narrow the pool room ids are drawn from
    pub fn with_room_ids(mut self, room_ids: RangeInclusive<u32>) -> Self {
        self.room_ids = room_ids;
        self
    }

    pub fn policy(&self) -> Arc<dyn DecisionPolicy> {
        self.settings.policy.clone()
    }

    /// An id not used by any live room, or `None` if the pool is exhausted
    fn free_room_id(&self, rooms: &HashMap<RoomId, RoomEntry>) -> Option<RoomId> {
        let is_free = |id: &str| !rooms.get(id).is_some_and(RoomEntry::is_live);

        let mut rng = rand::rng();
        for _ in 0..ROOM_ID_ATTEMPTS {
            let candidate = rng.random_range(self.room_ids.clone()).to_string();
            if is_free(&candidate) {
                return Some(candidate);
            }
        }
        self.room_ids
            .clone()
            .map(|n| n.to_string())
            .find(|id| is_free(id))
    }

    /// Create a room with `host` seated and start its task
    pub async fn create_room(
        &self,
        host: Participant,
        outlet: mpsc::UnboundedSender<ServerMessage>,
        options: RoomOptions,
    ) -> GameResult<RoomInfo> {
        let mut rooms = self.rooms.write().await;

        let Some(room_id) = self.free_room_id(&rooms) else {
            tracing::warn!("No free room id left ({} rooms live)", rooms.len());
            return Err(GameError::ServerFull);
        };

        let host_name = host.name.clone();
        let room = GameRoom::new(room_id.clone(), host, options);
        let info = room.room_info();
        let (handle, summary, _task) = worker::spawn_room(room, outlet, self.settings.clone());
        rooms.insert(room_id.clone(), RoomEntry { handle, summary });

        tracing::info!(
            "Room {} created by {} (max {}, {})",
            room_id,
            host_name,
            options.max_players,
            if options.is_private { "private" } else { "public" }
        );
        Ok(info)
    }

    async fn handle(&self, room_id: &str) -> GameResult<RoomHandle> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .filter(|entry| entry.is_live())
            .map(|entry| entry.handle.clone())
            .ok_or(GameError::RoomNotFound)
    }

    pub async fn join_room(
        &self,
        room_id: &str,
        participant: Participant,
        outlet: mpsc::UnboundedSender<ServerMessage>,
    ) -> GameResult<RoomInfo> {
        self.handle(room_id).await?.join(participant, outlet).await
    }

    /// Join the fullest open public lobby, or open a new public room
    pub async fn quick_match(
        &self,
        participant: Participant,
        outlet: mpsc::UnboundedSender<ServerMessage>,
    ) -> GameResult<(RoomInfo, MatchKind)> {
        let mut open = self.open_summaries().await;
        open.sort_by(|a, b| {
            b.player_count
                .cmp(&a.player_count)
                .then_with(|| a.room_id.cmp(&b.room_id))
        });

        for summary in open {
            match self
                .join_room(&summary.room_id, participant.clone(), outlet.clone())
                .await
            {
                Ok(info) => return Ok((info, MatchKind::Joined)),
                // Filled up or started since the summary was published
                Err(e) => tracing::debug!("Quick match skipped room {}: {}", summary.room_id, e),
            }
        }

        let info = self
            .create_room(participant, outlet, RoomOptions::public())
            .await?;
        Ok((info, MatchKind::Created))
    }

    /// Remove `participant_id` from the room; tears the room down when the
    /// last human leaves
    pub async fn leave_room(&self, room_id: &str, participant_id: &str) -> GameResult<LeaveOutcome> {
        let outcome = self.handle(room_id).await?.leave(participant_id).await?;
        if outcome.closed {
            self.rooms.write().await.remove(room_id);
            tracing::info!("Room {} closed: no humans left", room_id);
        }
        Ok(outcome)
    }

    pub async fn act(
        &self,
        room_id: &str,
        participant_id: &str,
        action: RoomAction,
    ) -> GameResult<()> {
        self.handle(room_id).await?.act(participant_id, action).await
    }

    pub async fn snapshot(&self, room_id: &str) -> GameResult<RoomView> {
        self.handle(room_id).await?.snapshot().await
    }

    async fn open_summaries(&self) -> Vec<RoomSummary> {
        self.rooms
            .read()
            .await
            .values()
            .filter(|entry| entry.is_live())
            .map(|entry| entry.summary.borrow().clone())
            .filter(RoomSummary::is_open)
            .collect()
    }

    /// Public lobbies with a free seat
    pub async fn list_open_rooms(&self) -> Vec<LobbyInfo> {
        let mut rooms: Vec<LobbyInfo> = self
            .open_summaries()
            .await
            .iter()
            .map(RoomSummary::lobby_info)
            .collect();
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        rooms
    }

    pub async fn room_count(&self) -> usize {
        self.rooms
            .read()
            .await
            .values()
            .filter(|entry| entry.is_live())
            .count()
    }
}
