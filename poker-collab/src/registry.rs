//! Process-wide map from room token to live room.
//!
//! The map lock is held only to look up or insert a handle. Each room
//! has its own mutex, so work on one room never waits on another.
//! Rooms are never removed; the registry lives as long as the server
//! that constructed it.

use std::collections::HashMap;
use std::sync::Arc;

use poker_core::{ConnectionId, Room, RoomId, RoomParams};
use tokio::sync::{Mutex, RwLock};

/// Shared handle to one room's critical section.
pub type RoomHandle = Arc<Mutex<Room>>;

#[derive(Default)]
pub struct SessionRegistry {
    rooms: RwLock<HashMap<RoomId, RoomHandle>>,
}

impl SessionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room administered by `admin` and return its fresh token.
    pub async fn create(&self, admin: ConnectionId, params: RoomParams) -> RoomId {
        let mut rooms = self.rooms.write().await;
        let room_id = loop {
            let candidate = RoomId::generate();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
            log::warn!("Room id {candidate} already taken, drawing another");
        };

        let room = Room::new(room_id.clone(), admin, params);
        rooms.insert(room_id.clone(), Arc::new(Mutex::new(room)));
        room_id
    }

    /// Look up a room handle.
    pub async fn get(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Whether a room with this token exists.
    pub async fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.read().await.contains_key(room_id)
    }

    /// Number of live rooms.
    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Whether no room has been created yet.
    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }

    /// Tokens of every live room, in no particular order.
    pub async fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.read().await.keys().cloned().collect()
    }
}
