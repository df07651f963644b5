//! Wire protocol between browser/CLI clients and the poker server.
//!
//! One request or event per WebSocket frame:
//! ```text
//! Text frame   → JSON    {"sendVote":{"roomId":"3f2a9c1b","vote":"5"}}
//! Binary frame → bincode (serde, standard config), same enums
//! ```
//!
//! Both enums are externally tagged so the same derive works for the
//! self-describing JSON form and for bincode. Field names are camelCase
//! to match the browser client.

use poker_core::{ItemId, RoomId, RoomParams, RoomSnapshot};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// Encoding used for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    /// JSON in text frames
    #[default]
    Json,
    /// bincode in binary frames
    Binary,
}

/// Requests a client can send. The caller is always the sending connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientRequest {
    CreateRoom {
        room_name: String,
        admin_name: String,
        avatar_url: Option<String>,
        #[serde(default)]
        task_titles: Vec<String>,
        #[serde(default)]
        estimate_options: Vec<String>,
        #[serde(default)]
        is_free_text: bool,
    },
    JoinRoom {
        room_id: RoomId,
        user_name: String,
        avatar_url: Option<String>,
    },
    TogglePeekStatus {
        room_id: RoomId,
        is_peeking: bool,
    },
    StartRoom {
        room_id: RoomId,
    },
    UpdateTask {
        room_id: RoomId,
        task_id: String,
        new_title: String,
    },
    DeleteTask {
        room_id: RoomId,
        task_id: String,
    },
    SendVote {
        room_id: RoomId,
        vote: String,
    },
    ShowVotes {
        room_id: RoomId,
    },
    NextTask {
        room_id: RoomId,
    },
    AddTasks {
        room_id: RoomId,
        #[serde(default)]
        new_task_titles: Vec<String>,
    },
}

impl ClientRequest {
    /// Operation name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "createRoom",
            Self::JoinRoom { .. } => "joinRoom",
            Self::TogglePeekStatus { .. } => "togglePeekStatus",
            Self::StartRoom { .. } => "startRoom",
            Self::UpdateTask { .. } => "updateTask",
            Self::DeleteTask { .. } => "deleteTask",
            Self::SendVote { .. } => "sendVote",
            Self::ShowVotes { .. } => "showVotes",
            Self::NextTask { .. } => "nextTask",
            Self::AddTasks { .. } => "addTasks",
        }
    }

    /// Target room. `None` for `createRoom`, which has no room yet.
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            Self::CreateRoom { .. } => None,
            Self::JoinRoom { room_id, .. }
            | Self::TogglePeekStatus { room_id, .. }
            | Self::StartRoom { room_id }
            | Self::UpdateTask { room_id, .. }
            | Self::DeleteTask { room_id, .. }
            | Self::SendVote { room_id, .. }
            | Self::ShowVotes { room_id }
            | Self::NextTask { room_id }
            | Self::AddTasks { room_id, .. } => Some(room_id),
        }
    }

    /// Build a `createRoom` request from room parameters.
    pub fn create_room(params: RoomParams) -> Self {
        Self::CreateRoom {
            room_name: params.room_name,
            admin_name: params.admin_name,
            avatar_url: params.avatar_url,
            task_titles: params.item_titles,
            estimate_options: params.estimate_options,
            is_free_text: params.is_free_text,
        }
    }

    pub fn encode(&self, format: WireFormat) -> Result<Vec<u8>, ProtocolError> {
        encode(self, format)
    }

    pub fn decode(bytes: &[u8], format: WireFormat) -> Result<Self, ProtocolError> {
        decode(bytes, format)
    }
}

/// Events the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerEvent {
    /// Caller-only reply to `createRoom`
    RoomCreated(RoomId),
    /// Full room state, room-scoped
    RoomUpdated(RoomSnapshot),
    /// Admin peek flag, room-scoped
    PeekStatusChanged(bool),
    /// Active item changed, room-scoped; a `RoomUpdated` follows
    NewTaskTriggered,
    /// Caller-only, human-readable
    Error(String),
}

impl ServerEvent {
    pub fn encode(&self, format: WireFormat) -> Result<Vec<u8>, ProtocolError> {
        encode(self, format)
    }

    pub fn decode(bytes: &[u8], format: WireFormat) -> Result<Self, ProtocolError> {
        decode(bytes, format)
    }

    pub fn snapshot(&self) -> Option<&RoomSnapshot> {
        match self {
            Self::RoomUpdated(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

/// Task ids travel as strings; anything that is not a UUID names no task.
pub fn parse_item_id(raw: &str) -> Option<ItemId> {
    Uuid::parse_str(raw.trim()).ok()
}

fn encode<T: Serialize>(value: &T, format: WireFormat) -> Result<Vec<u8>, ProtocolError> {
    match format {
        WireFormat::Json => serde_json::to_vec(value)
            .map_err(|e| ProtocolError::SerializationError(e.to_string())),
        WireFormat::Binary => bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string())),
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8], format: WireFormat) -> Result<T, ProtocolError> {
    match format {
        WireFormat::Json => serde_json::from_slice(bytes)
            .map_err(|e| ProtocolError::DeserializationError(e.to_string())),
        WireFormat::Binary => {
            let (value, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
            Ok(value)
        }
    }
}

/// Protocol errors.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    SerializationError(String),
    DeserializationError(String),
    ConnectionClosed,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SerializationError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for ProtocolError {}
