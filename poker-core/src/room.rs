//! Room aggregate and its state machine.
//!
//! A room holds an ordered queue of work items and a cursor into it.
//! The item under the cursor is *active* once the room has started.
//! Items behind the cursor are finalized; the active item is also
//! locked while its votes are revealed.
//!
//! ```text
//!   items:  [ done ][ done ][ active ][ queued ][ queued ]
//!                            ^cursor
//!   cursor == items.len()  →  no active item (session finished)
//! ```
//!
//! Every method validates before it mutates, so an `Err` always means
//! the room is unchanged.

use uuid::Uuid;

use crate::aggregate::{self, CompletedRecord, VoteResult};
use crate::error::{LockedAction, RoomError};
use crate::id::{ConnectionId, ItemId, RoomId};
use crate::snapshot::RoomSnapshot;

/// A connected voter.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub name: String,
    pub avatar_url: Option<String>,
    /// Empty string means no vote cast.
    pub vote: String,
}

impl Participant {
    pub fn new(connection_id: ConnectionId, name: impl Into<String>, avatar_url: Option<String>) -> Self {
        Self {
            connection_id,
            name: name.into(),
            avatar_url,
            vote: String::new(),
        }
    }

    pub fn has_voted(&self) -> bool {
        !self.vote.is_empty()
    }
}

/// A unit of work to estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub id: ItemId,
    pub title: String,
    pub is_completed: bool,
}

impl WorkItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            is_completed: false,
        }
    }
}

/// Parameters supplied by the creator of a room.
#[derive(Debug, Clone, Default)]
pub struct RoomParams {
    pub room_name: String,
    pub admin_name: String,
    pub avatar_url: Option<String>,
    pub item_titles: Vec<String>,
    pub estimate_options: Vec<String>,
    pub is_free_text: bool,
}

/// What a successful operation changed, so the caller knows which
/// signals to publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Room state changed; publish a snapshot.
    Updated,
    /// The active item changed; publish a new-item signal, then a snapshot.
    ItemChanged,
    /// Admin peek toggle; publish only the flag, the room is untouched.
    PeekChanged(bool),
}

/// The per-room aggregate.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    name: String,
    admin: ConnectionId,
    started: bool,
    is_free_text: bool,
    estimate_options: Vec<String>,
    items: Vec<WorkItem>,
    cursor: usize,
    votes_revealed: bool,
    participants: Vec<Participant>,
    history: Vec<CompletedRecord>,
}

impl Room {
    /// Create a room with `admin` as its admin and first participant.
    pub fn new(id: RoomId, admin: ConnectionId, params: RoomParams) -> Self {
        let RoomParams {
            room_name,
            admin_name,
            avatar_url,
            item_titles,
            estimate_options,
            is_free_text,
        } = params;

        Self {
            id,
            name: room_name,
            admin,
            started: false,
            is_free_text,
            estimate_options,
            items: item_titles.into_iter().map(WorkItem::new).collect(),
            cursor: 0,
            votes_revealed: false,
            participants: vec![Participant::new(admin, admin_name, avatar_url)],
            history: Vec::new(),
        }
    }

    /// Get the room token.
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Get the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the admin's connection id.
    pub fn admin(&self) -> ConnectionId {
        self.admin
    }

    /// Whether `caller` administers this room.
    pub fn is_admin(&self, caller: ConnectionId) -> bool {
        self.admin == caller
    }

    /// Whether voting has been opened.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Whether votes are free text rather than numbers.
    pub fn is_free_text(&self) -> bool {
        self.is_free_text
    }

    /// Get the allowed estimate values.
    pub fn estimate_options(&self) -> &[String] {
        &self.estimate_options
    }

    /// Get the item queue.
    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    /// Index of the active item; equals `items().len()` when all are done.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether votes on the active item are visible.
    pub fn votes_revealed(&self) -> bool {
        self.votes_revealed
    }

    /// Get all participants in join order.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Find a participant by connection.
    pub fn participant(&self, connection_id: ConnectionId) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.connection_id == connection_id)
    }

    /// Get finalized items, oldest first.
    pub fn history(&self) -> &[CompletedRecord] {
        &self.history
    }

    /// The item currently being voted on, if any.
    pub fn active_item(&self) -> Option<&WorkItem> {
        if self.started {
            self.items.get(self.cursor)
        } else {
            None
        }
    }

    /// Whether the item at `index` may no longer be edited or deleted.
    pub fn is_locked(&self, index: usize) -> bool {
        index < self.cursor || (index == self.cursor && self.votes_revealed)
    }

    /// Capture the broadcastable view of this room.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot::from(self)
    }

    /// Fail with [`RoomError::NotAdmin`] unless `caller` administers the room.
    pub fn ensure_admin(&self, caller: ConnectionId) -> Result<(), RoomError> {
        if self.is_admin(caller) {
            Ok(())
        } else {
            Err(RoomError::NotAdmin)
        }
    }

    /// Add a participant. Returns `false` if the connection already joined.
    pub fn join(&mut self, caller: ConnectionId, name: impl Into<String>, avatar_url: Option<String>) -> bool {
        if self.participant(caller).is_some() {
            return false;
        }
        self.participants.push(Participant::new(caller, name, avatar_url));
        true
    }

    /// Let the admin announce that they are peeking at hidden votes.
    pub fn toggle_peek(&self, caller: ConnectionId, is_peeking: bool) -> Result<Outcome, RoomError> {
        self.ensure_admin(caller)?;
        Ok(Outcome::PeekChanged(is_peeking))
    }

    /// Open voting on the first queued item.
    pub fn start(&mut self, caller: ConnectionId) -> Result<Outcome, RoomError> {
        self.ensure_admin(caller)?;
        if self.items.is_empty() {
            return Err(RoomError::NoItems);
        }
        self.started = true;
        Ok(Outcome::Updated)
    }

    /// Rename an unlocked item.
    pub fn update_title(
        &mut self,
        caller: ConnectionId,
        item_id: ItemId,
        title: impl Into<String>,
    ) -> Result<Outcome, RoomError> {
        self.ensure_admin(caller)?;
        let index = self.unlocked_index(item_id, LockedAction::Edit)?;
        self.items[index].title = title.into();
        Ok(Outcome::Updated)
    }

    /// Remove an unlocked item. Removing the active item starts a fresh
    /// round on whatever item slides under the cursor.
    pub fn delete_item(&mut self, caller: ConnectionId, item_id: ItemId) -> Result<Outcome, RoomError> {
        self.ensure_admin(caller)?;
        let index = self.unlocked_index(item_id, LockedAction::Delete)?;
        let was_active = self.active_item().is_some_and(|item| item.id == item_id);

        self.items.remove(index);

        if was_active {
            self.votes_revealed = false;
            self.reset_votes();
            Ok(Outcome::ItemChanged)
        } else {
            Ok(Outcome::Updated)
        }
    }

    /// Record the caller's vote. Any string is accepted here; numeric
    /// interpretation only happens when the item is finalized.
    pub fn vote(&mut self, caller: ConnectionId, value: impl Into<String>) -> Result<Outcome, RoomError> {
        if !self.started {
            return Err(RoomError::NotStarted);
        }
        let participant = self
            .participants
            .iter_mut()
            .find(|p| p.connection_id == caller)
            .ok_or(RoomError::NotParticipant)?;
        participant.vote = value.into();
        Ok(Outcome::Updated)
    }

    /// Reveal votes on the active item.
    pub fn reveal(&mut self, caller: ConnectionId) -> Result<Outcome, RoomError> {
        self.ensure_admin(caller)?;
        if !self.participants.iter().any(Participant::has_voted) {
            return Err(RoomError::NoVotes);
        }
        self.votes_revealed = true;
        Ok(Outcome::Updated)
    }

    /// Finalize the active item (if any) into history and move on.
    ///
    /// The cursor never passes the end of the queue; once it sits there,
    /// further calls only clear votes and the reveal flag.
    pub fn advance(&mut self, caller: ConnectionId) -> Result<Outcome, RoomError> {
        self.ensure_admin(caller)?;

        if let Some(item) = self.active_item() {
            let results = self
                .participants
                .iter()
                .map(|p| VoteResult::new(p.name.clone(), p.vote.clone()))
                .collect();
            let record = aggregate::finalize(&item.title, self.is_free_text, results);
            self.history.push(record);
            self.items[self.cursor].is_completed = true;
        }

        if self.cursor < self.items.len() {
            self.cursor += 1;
        }
        self.votes_revealed = false;
        self.reset_votes();
        Ok(Outcome::ItemChanged)
    }

    /// Queue more items at the end, keeping the given order.
    pub fn append_items<I, S>(&mut self, caller: ConnectionId, titles: I) -> Result<Outcome, RoomError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_admin(caller)?;
        self.items.extend(titles.into_iter().map(WorkItem::new));
        Ok(Outcome::Updated)
    }

    fn unlocked_index(&self, item_id: ItemId, action: LockedAction) -> Result<usize, RoomError> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or(RoomError::ItemNotFound(item_id))?;
        if self.is_locked(index) {
            return Err(RoomError::ItemLocked(action));
        }
        Ok(index)
    }

    fn reset_votes(&mut self) {
        for participant in &mut self.participants {
            participant.vote.clear();
        }
    }
}
