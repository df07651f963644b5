//! Identifiers for rooms, connections and work items.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of a generated room token.
pub const ROOM_ID_LEN: usize = 8;

/// Identity of a client connection. Stable for the connection's lifetime.
pub type ConnectionId = Uuid;

/// Identity of a work item, unique within its room.
pub type ItemId = Uuid;

/// Short opaque room token, e.g. `"3f2a9c1b"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Draw a fresh token from the first hex digits of a v4 UUID.
    pub fn generate() -> Self {
        let mut token = Uuid::new_v4().simple().to_string();
        token.truncate(ROOM_ID_LEN);
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_room_id_shape() {
        let id = RoomId::generate();
        assert_eq!(id.as_str().len(), ROOM_ID_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generated_room_ids_differ() {
        let a = RoomId::generate();
        let b = RoomId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_room_id_serializes_as_plain_string() {
        let id = RoomId::from("abcd1234");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abcd1234\"");
        assert_eq!(id.to_string(), "abcd1234");
    }
}
