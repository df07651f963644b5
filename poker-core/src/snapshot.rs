//! Serializable room view sent to clients.
//!
//! A snapshot is an owned copy taken while the room is locked, so it can
//! be encoded and fanned out after the lock is gone without ever seeing
//! a half-applied mutation. Field names follow the browser client
//! (`roomId`, `isVotesRevealed`, `players`, ...).

use serde::{Deserialize, Serialize};

use crate::aggregate::CompletedRecord;
use crate::id::{ConnectionId, ItemId, RoomId};
use crate::room::{Participant, Room, WorkItem};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub connection_id: ConnectionId,
    pub name: String,
    pub avatar_url: String,
    pub vote: String,
    pub has_voted: bool,
}

impl From<&Participant> for ParticipantView {
    fn from(p: &Participant) -> Self {
        Self {
            connection_id: p.connection_id,
            name: p.name.clone(),
            avatar_url: p.avatar_url.clone().unwrap_or_default(),
            vote: p.vote.clone(),
            has_voted: p.has_voted(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemView {
    pub id: ItemId,
    pub title: String,
    pub is_completed: bool,
}

impl From<&WorkItem> for WorkItemView {
    fn from(item: &WorkItem) -> Self {
        Self {
            id: item.id,
            title: item.title.clone(),
            is_completed: item.is_completed,
        }
    }
}

/// Full room state as broadcast in `RoomUpdated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub room_name: String,
    pub admin_connection_id: ConnectionId,
    pub is_started: bool,
    pub is_free_text: bool,
    pub estimate_options: Vec<String>,
    pub tasks: Vec<WorkItemView>,
    pub current_task_index: usize,
    pub is_votes_revealed: bool,
    pub players: Vec<ParticipantView>,
    pub history: Vec<CompletedRecord>,
    pub active_task: Option<WorkItemView>,
}

impl From<&Room> for RoomSnapshot {
    fn from(room: &Room) -> Self {
        Self {
            room_id: room.id().clone(),
            room_name: room.name().to_string(),
            admin_connection_id: room.admin(),
            is_started: room.is_started(),
            is_free_text: room.is_free_text(),
            estimate_options: room.estimate_options().to_vec(),
            tasks: room.items().iter().map(WorkItemView::from).collect(),
            current_task_index: room.cursor(),
            is_votes_revealed: room.votes_revealed(),
            players: room.participants().iter().map(ParticipantView::from).collect(),
            history: room.history().to_vec(),
            active_task: room.active_item().map(WorkItemView::from),
        }
    }
}

impl RoomSnapshot {
    /// Participant view for a given connection, if it joined.
    pub fn player(&self, connection_id: ConnectionId) -> Option<&ParticipantView> {
        self.players.iter().find(|p| p.connection_id == connection_id)
    }
}
