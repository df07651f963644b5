//! In-memory [`Dispatcher`] that records every delivery.
//!
//! Lets hub behaviour be checked without sockets:
//!
//! ```
//! use poker_collab::testing::RecordingDispatcher;
//! let dispatcher = RecordingDispatcher::new();
//! assert!(dispatcher.deliveries().is_empty());
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use poker_core::{ConnectionId, RoomId, RoomSnapshot};

use crate::broadcast::Dispatcher;
use crate::protocol::ServerEvent;

/// One recorded delivery, in issue order.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Room(RoomId, ServerEvent),
    Caller(ConnectionId, ServerEvent),
}

#[derive(Default)]
pub struct RecordingDispatcher {
    deliveries: Mutex<Vec<Delivery>>,
    groups: Mutex<HashMap<RoomId, HashSet<ConnectionId>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        lock(&self.deliveries).clone()
    }

    /// Events broadcast to `room_id`, in order.
    pub fn room_events(&self, room_id: &RoomId) -> Vec<ServerEvent> {
        lock(&self.deliveries)
            .iter()
            .filter_map(|d| match d {
                Delivery::Room(id, event) if id == room_id => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    /// Events sent to `connection` alone, in order.
    pub fn caller_events(&self, connection: ConnectionId) -> Vec<ServerEvent> {
        lock(&self.deliveries)
            .iter()
            .filter_map(|d| match d {
                Delivery::Caller(id, event) if *id == connection => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    /// Most recent snapshot broadcast to `room_id`.
    pub fn last_snapshot(&self, room_id: &RoomId) -> Option<RoomSnapshot> {
        self.room_events(room_id)
            .into_iter()
            .rev()
            .find_map(|event| match event {
                ServerEvent::RoomUpdated(snapshot) => Some(snapshot),
                _ => None,
            })
    }

    pub fn members(&self, room_id: &RoomId) -> HashSet<ConnectionId> {
        lock(&self.groups).get(room_id).cloned().unwrap_or_default()
    }

    pub fn clear(&self) {
        lock(&self.deliveries).clear();
    }
}

impl Dispatcher for RecordingDispatcher {
    async fn join_group(&self, room_id: &RoomId, connection: ConnectionId) {
        lock(&self.groups)
            .entry(room_id.clone())
            .or_default()
            .insert(connection);
    }

    async fn broadcast_to_room(&self, room_id: &RoomId, event: ServerEvent) {
        lock(&self.deliveries).push(Delivery::Room(room_id.clone(), event));
    }

    async fn send_to_caller(&self, connection: ConnectionId, event: ServerEvent) {
        lock(&self.deliveries).push(Delivery::Caller(connection, event));
    }
}
