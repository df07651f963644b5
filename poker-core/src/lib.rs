//! # poker-core: room state machine for planning poker sessions
//!
//! Pure, synchronous domain logic. Nothing here knows about sockets,
//! locks or tasks; `poker-collab` wraps each [`Room`] in its own lock and
//! publishes the [`RoomSnapshot`] produced after every mutation.
//!
//! ## Modules
//!
//! - [`room`]: participants, work items, cursor, reveal and history
//! - [`aggregate`]: vote averaging for finalized items
//! - [`snapshot`]: serializable room view
//! - [`error`]: rejection taxonomy (silent vs. reported)
//! - [`id`]: room tokens and connection/item ids

pub mod aggregate;
pub mod error;
pub mod id;
pub mod room;
pub mod snapshot;

pub use aggregate::{CompletedRecord, VoteResult};
pub use error::{LockedAction, RoomError};
pub use id::{ConnectionId, ItemId, RoomId};
pub use room::{Outcome, Participant, Room, RoomParams, WorkItem};
pub use snapshot::{ParticipantView, RoomSnapshot, WorkItemView};
