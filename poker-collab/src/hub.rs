//! Request entrypoint: resolve the room, run the state machine, publish.
//!
//! Every room operation follows the same path:
//!
//! ```text
//! registry.get(room) ─► lock room ─► Room::op(caller, ..) ─┬─ Ok  ─► broadcast signal(s) + snapshot
//!                                                          └─ Err ─► silent drop | caller-only Error
//!                                              (room unlocked here)
//! ```
//!
//! Publishing happens before the room lock is released. The dispatcher
//! never blocks on publish, and it keeps each room's broadcasts in the
//! order the operations were applied.
//!
//! Unknown rooms are ignored, except on `joinRoom` where the caller is
//! told the room does not exist.

use std::sync::Arc;

use poker_core::{ConnectionId, ItemId, Outcome, Room, RoomError, RoomId, RoomParams};

use crate::broadcast::Dispatcher;
use crate::protocol::{parse_item_id, ClientRequest, ServerEvent};
use crate::registry::SessionRegistry;

pub struct SessionHub<D> {
    registry: Arc<SessionRegistry>,
    dispatcher: Arc<D>,
}

impl<D: Dispatcher> SessionHub<D> {
    /// Create a hub over a registry and a dispatcher.
    pub fn new(registry: Arc<SessionRegistry>, dispatcher: Arc<D>) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    /// Get the room registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Get the dispatcher.
    pub fn dispatcher(&self) -> &Arc<D> {
        &self.dispatcher
    }

    /// Route a decoded request from `caller`.
    pub async fn handle(&self, caller: ConnectionId, request: ClientRequest) {
        match request {
            ClientRequest::CreateRoom {
                room_name,
                admin_name,
                avatar_url,
                task_titles,
                estimate_options,
                is_free_text,
            } => {
                let params = RoomParams {
                    room_name,
                    admin_name,
                    avatar_url,
                    item_titles: task_titles,
                    estimate_options,
                    is_free_text,
                };
                let room_id = self.create_room(caller, params).await;
                self.dispatcher
                    .send_to_caller(caller, ServerEvent::RoomCreated(room_id))
                    .await;
            }
            ClientRequest::JoinRoom {
                room_id,
                user_name,
                avatar_url,
            } => self.join_room(caller, &room_id, user_name, avatar_url).await,
            ClientRequest::TogglePeekStatus {
                room_id,
                is_peeking,
            } => self.toggle_peek(caller, &room_id, is_peeking).await,
            ClientRequest::StartRoom { room_id } => self.start_room(caller, &room_id).await,
            ClientRequest::UpdateTask {
                room_id,
                task_id,
                new_title,
            } => match parse_item_id(&task_id) {
                Some(item_id) => self.update_task(caller, &room_id, item_id, new_title).await,
                None => log::debug!("updateTask in room {room_id}: '{task_id}' is not a task id"),
            },
            ClientRequest::DeleteTask { room_id, task_id } => match parse_item_id(&task_id) {
                Some(item_id) => self.delete_task(caller, &room_id, item_id).await,
                None => log::debug!("deleteTask in room {room_id}: '{task_id}' is not a task id"),
            },
            ClientRequest::SendVote { room_id, vote } => self.send_vote(caller, &room_id, vote).await,
            ClientRequest::ShowVotes { room_id } => self.show_votes(caller, &room_id).await,
            ClientRequest::NextTask { room_id } => self.next_task(caller, &room_id).await,
            ClientRequest::AddTasks {
                room_id,
                new_task_titles,
            } => self.add_tasks(caller, &room_id, new_task_titles).await,
        }
    }

    /// Create a room with `caller` as admin and put the caller in its group.
    pub async fn create_room(&self, caller: ConnectionId, params: RoomParams) -> RoomId {
        let room_name = params.room_name.clone();
        let room_id = self.registry.create(caller, params).await;
        self.dispatcher.join_group(&room_id, caller).await;
        log::info!("Room {room_id} ('{room_name}') created by {caller}");
        room_id
    }

    /// Add `caller` to a room and broadcast the new snapshot.
    ///
    /// Unknown rooms are reported to the caller.
    pub async fn join_room(
        &self,
        caller: ConnectionId,
        room_id: &RoomId,
        user_name: String,
        avatar_url: Option<String>,
    ) {
        let Some(handle) = self.registry.get(room_id).await else {
            let err = RoomError::RoomNotFound(room_id.clone());
            self.dispatcher
                .send_to_caller(caller, ServerEvent::Error(err.to_string()))
                .await;
            return;
        };

        let mut room = handle.lock().await;
        if room.join(caller, user_name.as_str(), avatar_url) {
            log::info!("{user_name} ({caller}) joined room {room_id}");
        }
        // Re-joins still re-broadcast so the caller gets a fresh snapshot.
        self.dispatcher.join_group(room_id, caller).await;
        self.publish(&room, Outcome::Updated).await;
    }

    /// Tell the room whether the admin is peeking.
    pub async fn toggle_peek(&self, caller: ConnectionId, room_id: &RoomId, is_peeking: bool) {
        self.apply(caller, room_id, "togglePeekStatus", |room| {
            room.toggle_peek(caller, is_peeking)
        })
        .await;
    }

    /// Open voting on the first item.
    pub async fn start_room(&self, caller: ConnectionId, room_id: &RoomId) {
        self.apply(caller, room_id, "startRoom", |room| room.start(caller))
            .await;
    }

    /// Rename an item that is not yet locked.
    pub async fn update_task(&self, caller: ConnectionId, room_id: &RoomId, item_id: ItemId, new_title: String) {
        self.apply(caller, room_id, "updateTask", |room| {
            room.update_title(caller, item_id, new_title)
        })
        .await;
    }

    /// Remove an item that is not yet locked.
    pub async fn delete_task(&self, caller: ConnectionId, room_id: &RoomId, item_id: ItemId) {
        self.apply(caller, room_id, "deleteTask", |room| {
            room.delete_item(caller, item_id)
        })
        .await;
    }

    /// Record the caller's vote on the active item.
    pub async fn send_vote(&self, caller: ConnectionId, room_id: &RoomId, vote: String) {
        self.apply(caller, room_id, "sendVote", |room| room.vote(caller, vote))
            .await;
    }

    /// Reveal votes to the room.
    pub async fn show_votes(&self, caller: ConnectionId, room_id: &RoomId) {
        self.apply(caller, room_id, "showVotes", |room| room.reveal(caller))
            .await;
    }

    /// Finalize the active item and move to the next one.
    pub async fn next_task(&self, caller: ConnectionId, room_id: &RoomId) {
        self.apply(caller, room_id, "nextTask", |room| room.advance(caller))
            .await;
    }

    /// Append items to the queue.
    pub async fn add_tasks(&self, caller: ConnectionId, room_id: &RoomId, titles: Vec<String>) {
        self.apply(caller, room_id, "addTasks", |room| {
            room.append_items(caller, titles)
        })
        .await;
    }

    /// Run `op` inside the room's critical section and publish the result
    /// before leaving it.
    async fn apply<F>(&self, caller: ConnectionId, room_id: &RoomId, op_name: &str, op: F)
    where
        F: FnOnce(&mut Room) -> Result<Outcome, RoomError> + Send,
    {
        let Some(handle) = self.registry.get(room_id).await else {
            log::debug!("{op_name}: room {room_id} not found");
            return;
        };

        let mut room = handle.lock().await;
        match op(&mut *room) {
            Ok(outcome) => self.publish(&room, outcome).await,
            Err(err) if err.is_silent() => {
                log::debug!("{op_name} in room {room_id} ignored for {caller}: {err}");
            }
            Err(err) => {
                log::debug!("{op_name} in room {room_id} rejected for {caller}: {err}");
                self.dispatcher
                    .send_to_caller(caller, ServerEvent::Error(err.to_string()))
                    .await;
            }
        }
    }

    async fn publish(&self, room: &Room, outcome: Outcome) {
        let room_id = room.id();
        match outcome {
            Outcome::PeekChanged(is_peeking) => {
                self.dispatcher
                    .broadcast_to_room(room_id, ServerEvent::PeekStatusChanged(is_peeking))
                    .await;
                return;
            }
            Outcome::ItemChanged => {
                self.dispatcher
                    .broadcast_to_room(room_id, ServerEvent::NewTaskTriggered)
                    .await;
            }
            Outcome::Updated => {}
        }
        self.dispatcher
            .broadcast_to_room(room_id, ServerEvent::RoomUpdated(room.snapshot()))
            .await;
    }
}
