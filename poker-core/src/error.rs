//! Rejections produced by room operations.
//!
//! Every rejection leaves the room untouched. Whether the caller hears
//! about it is decided by [`RoomError::is_silent`]: authorization and
//! not-found failures are swallowed so that a stale or racing client UI
//! does not alarm its user, while precondition failures are reported.

use crate::id::{ItemId, RoomId};

/// Which mutation hit a locked work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockedAction {
    Edit,
    Delete,
}

/// Room operation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    /// Referenced room does not exist
    RoomNotFound(RoomId),
    /// Referenced work item does not exist in the room
    ItemNotFound(ItemId),
    /// Admin-only operation attempted by another connection
    NotAdmin,
    /// Caller has not joined the room
    NotParticipant,
    /// Voting attempted before the room was started
    NotStarted,
    /// Start attempted with an empty item queue
    NoItems,
    /// Reveal attempted before anyone voted
    NoVotes,
    /// Item is finalized, or active with votes revealed
    ItemLocked(LockedAction),
}

impl RoomError {
    /// Silent rejections are dropped without telling the caller.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            Self::ItemNotFound(_) | Self::NotAdmin | Self::NotParticipant | Self::NotStarted
        )
    }
}

impl std::fmt::Display for RoomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoomNotFound(_) => write!(f, "Room not found!"),
            Self::ItemNotFound(id) => write!(f, "Task not found: {id}"),
            Self::NotAdmin => write!(f, "Only the room admin can do that"),
            Self::NotParticipant => write!(f, "You have not joined this room"),
            Self::NotStarted => write!(f, "The session has not started yet"),
            Self::NoItems => write!(f, "You must add at least one task first!"),
            Self::NoVotes => write!(f, "No one has voted yet!"),
            Self::ItemLocked(LockedAction::Edit) => {
                write!(f, "You cannot edit a task that has been finished or revealed!")
            }
            Self::ItemLocked(LockedAction::Delete) => {
                write!(f, "You cannot delete a task that has been finished or revealed!")
            }
        }
    }
}

impl std::error::Error for RoomError {}
