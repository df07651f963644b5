//! Room-scoped fan-out and caller-only delivery.
//!
//! ```text
//! SessionHub ── broadcast_to_room ──► BroadcastGroup (tokio broadcast)
//!     │                                   │  one receiver per member
//!     │                                   ▼
//!     │                              forwarder task ──► connection outbox ──► socket
//!     └──── send_to_caller ────────────────────────────┘
//! ```
//!
//! Each room gets one [`BroadcastGroup`]. A tokio broadcast channel is
//! FIFO, so members see a room's events in publish order. Every
//! connection owns one outbox (`mpsc`); group forwarders and caller-only
//! replies both feed it.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use poker_core::{ConnectionId, RoomId};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, RwLock};

use crate::protocol::ServerEvent;

/// Per-connection queue of outgoing events.
pub type Outbox = mpsc::Sender<Arc<ServerEvent>>;

/// Delivery primitives the session hub needs from the transport.
///
/// Implementations must deliver a room's broadcasts in the order they
/// were issued. The hub issues them while holding the room's lock.
pub trait Dispatcher: Send + Sync + 'static {
    /// Associate a connection with a room's group. Repeated joins are no-ops.
    fn join_group(&self, room_id: &RoomId, connection: ConnectionId) -> impl Future<Output = ()> + Send;

    /// Deliver an event to every connection in the room's group.
    fn broadcast_to_room(&self, room_id: &RoomId, event: ServerEvent) -> impl Future<Output = ()> + Send;

    /// Deliver an event to one connection only.
    fn send_to_caller(&self, connection: ConnectionId, event: ServerEvent) -> impl Future<Output = ()> + Send;
}

/// Statistics for monitoring broadcast health.
#[derive(Debug, Clone, Default)]
pub struct BroadcastStats {
    pub messages_sent: u64,
    pub messages_dropped: u64,
    pub active_members: usize,
}

/// Lock-free counters; read through [`BroadcastGroup::stats`].
struct AtomicBroadcastStats {
    messages_sent: AtomicU64,
    messages_dropped: AtomicU64,
}

impl AtomicBroadcastStats {
    fn new() -> Self {
        Self {
            messages_sent: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
        }
    }
}

/// Broadcast group for a single room.
pub struct BroadcastGroup {
    sender: broadcast::Sender<Arc<ServerEvent>>,
    members: RwLock<HashSet<ConnectionId>>,
    /// Events buffered per receiver before a slow member starts lagging
    capacity: usize,
    atomic_stats: AtomicBroadcastStats,
}

impl BroadcastGroup {
    /// Create an empty group buffering `capacity` events per member.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            members: RwLock::new(HashSet::new()),
            capacity,
            atomic_stats: AtomicBroadcastStats::new(),
        }
    }

    /// Add a member and hand back its receiver.
    ///
    /// Returns `None` if the connection is already a member, so a
    /// re-join never duplicates delivery.
    pub async fn add_member(&self, connection: ConnectionId) -> Option<broadcast::Receiver<Arc<ServerEvent>>> {
        let mut members = self.members.write().await;
        if !members.insert(connection) {
            return None;
        }
        Some(self.sender.subscribe())
    }

    /// Remove a member. Returns `false` if it was not one.
    pub async fn remove_member(&self, connection: &ConnectionId) -> bool {
        self.members.write().await.remove(connection)
    }

    /// Publish to all current receivers. Never blocks.
    ///
    /// Returns the number of receivers the event was queued for.
    pub fn publish(&self, event: Arc<ServerEvent>) -> usize {
        let count = self.sender.send(event).unwrap_or(0);
        self.atomic_stats.messages_sent.fetch_add(1, Ordering::Relaxed);
        count
    }

    /// Account for events a lagging member never received.
    pub fn record_dropped(&self, count: u64) {
        self.atomic_stats.messages_dropped.fetch_add(count, Ordering::Relaxed);
    }

    /// Get the current member count.
    pub async fn member_count(&self) -> usize {
        self.members.read().await.len()
    }

    /// Whether `connection` is a member.
    pub async fn has_member(&self, connection: &ConnectionId) -> bool {
        self.members.read().await.contains(connection)
    }

    /// Get all member ids.
    pub async fn members(&self) -> Vec<ConnectionId> {
        self.members.read().await.iter().copied().collect()
    }

    /// Get broadcast statistics.
    pub async fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            messages_sent: self.atomic_stats.messages_sent.load(Ordering::Relaxed),
            messages_dropped: self.atomic_stats.messages_dropped.load(Ordering::Relaxed),
            active_members: self.member_count().await,
        }
    }

    /// Get the per-member buffer capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Production dispatcher: one [`BroadcastGroup`] per room plus one
/// outbox per connection.
pub struct GroupDispatcher {
    groups: RwLock<HashMap<RoomId, Arc<BroadcastGroup>>>,
    outboxes: RwLock<HashMap<ConnectionId, Outbox>>,
    group_capacity: usize,
}

impl GroupDispatcher {
    /// Create a dispatcher whose groups buffer `group_capacity` events.
    pub fn new(group_capacity: usize) -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
            outboxes: RwLock::new(HashMap::new()),
            group_capacity,
        }
    }

    /// Attach a connection's outbox. Must happen before it joins a room.
    pub async fn register(&self, connection: ConnectionId, outbox: Outbox) {
        self.outboxes.write().await.insert(connection, outbox);
    }

    /// Detach a connection and drop it from every group.
    ///
    /// The room's participant entry is left alone.
    pub async fn unregister(&self, connection: &ConnectionId) {
        self.outboxes.write().await.remove(connection);
        let groups: Vec<Arc<BroadcastGroup>> = self.groups.read().await.values().cloned().collect();
        for group in groups {
            group.remove_member(connection).await;
        }
    }

    /// Get a room's broadcast group, if one exists.
    pub async fn group(&self, room_id: &RoomId) -> Option<Arc<BroadcastGroup>> {
        self.groups.read().await.get(room_id).cloned()
    }

    /// Number of rooms with a broadcast group.
    pub async fn group_count(&self) -> usize {
        self.groups.read().await.len()
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.outboxes.read().await.len()
    }

    async fn get_or_create(&self, room_id: &RoomId) -> Arc<BroadcastGroup> {
        // Fast path: read lock
        if let Some(group) = self.groups.read().await.get(room_id) {
            return group.clone();
        }

        let mut groups = self.groups.write().await;
        groups
            .entry(room_id.clone())
            .or_insert_with(|| Arc::new(BroadcastGroup::new(self.group_capacity)))
            .clone()
    }
}

impl Dispatcher for GroupDispatcher {
    async fn join_group(&self, room_id: &RoomId, connection: ConnectionId) {
        let outbox = self.outboxes.read().await.get(&connection).cloned();
        let Some(outbox) = outbox else {
            log::debug!("Connection {connection} has no outbox; not joining room {room_id}");
            return;
        };

        let group = self.get_or_create(room_id).await;
        if let Some(rx) = group.add_member(connection).await {
            tokio::spawn(forward(rx, outbox, group, connection));
            log::debug!("Connection {connection} joined group {room_id}");
        }
    }

    async fn broadcast_to_room(&self, room_id: &RoomId, event: ServerEvent) {
        match self.group(room_id).await {
            Some(group) => {
                let receivers = group.publish(Arc::new(event));
                log::trace!("Published to {receivers} members of room {room_id}");
            }
            None => log::debug!("No broadcast group for room {room_id}"),
        }
    }

    async fn send_to_caller(&self, connection: ConnectionId, event: ServerEvent) {
        let outbox = self.outboxes.read().await.get(&connection).cloned();
        let Some(outbox) = outbox else {
            log::debug!("Dropping caller event for unknown connection {connection}");
            return;
        };
        // The caller's own socket loop drains this outbox, and it may be
        // the task awaiting us, so never wait for space here.
        if let Err(e) = outbox.try_send(Arc::new(event)) {
            log::warn!("Dropping caller event for connection {connection}: {e}");
        }
    }
}

/// Pump one member's group receiver into its connection outbox.
async fn forward(
    mut rx: broadcast::Receiver<Arc<ServerEvent>>,
    outbox: Outbox,
    group: Arc<BroadcastGroup>,
    connection: ConnectionId,
) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if outbox.send(event).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(n)) => {
                log::warn!("Connection {connection} lagged by {n} room events");
                group.record_dropped(n);
            }
            Err(RecvError::Closed) => break,
        }
    }
    group.remove_member(&connection).await;
}
