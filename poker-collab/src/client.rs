//! WebSocket client for the poker server.
//!
//! Used by the integration tests and by tooling that drives a room
//! without a browser. Events arrive on an mpsc receiver taken once with
//! [`PokerClient::take_event_rx`].

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use poker_core::{RoomId, RoomParams};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::{ClientRequest, ProtocolError, ServerEvent, WireFormat};

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events surfaced to the application.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected,
    Disconnected,
    Server(ServerEvent),
}

pub struct PokerClient {
    server_url: String,
    format: WireFormat,
    state: Arc<RwLock<ConnectionState>>,
    /// Frames for the writer task
    outgoing_tx: Option<mpsc::Sender<Message>>,
    event_rx: Option<mpsc::Receiver<ClientEvent>>,
    event_tx: mpsc::Sender<ClientEvent>,
}

impl PokerClient {
    /// Create a JSON client for `server_url` (e.g. `ws://127.0.0.1:5000`).
    pub fn new(server_url: impl Into<String>) -> Self {
        Self::with_format(server_url, WireFormat::Json)
    }

    /// Create a client that speaks `format`.
    pub fn with_format(server_url: impl Into<String>, format: WireFormat) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            server_url: server_url.into(),
            format,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            outgoing_tx: None,
            event_rx: Some(event_rx),
            event_tx,
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<ClientEvent>> {
        self.event_rx.take()
    }

    /// Connect and spawn the reader and writer tasks.
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        *self.state.write().await = ConnectionState::Connecting;

        let (ws_stream, _) = match tokio_tungstenite::connect_async(&self.server_url).await {
            Ok(ok) => ok,
            Err(e) => {
                log::warn!("Failed to connect to {}: {e}", self.server_url);
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(ProtocolError::ConnectionClosed);
            }
        };
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::channel::<Message>(256);
        self.outgoing_tx = Some(out_tx);

        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if ws_writer.send(frame).await.is_err() {
                    break;
                }
            }
            let _ = ws_writer.close().await;
        });

        *self.state.write().await = ConnectionState::Connected;
        let _ = self.event_tx.send(ClientEvent::Connected).await;

        let event_tx = self.event_tx.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                let decoded = match msg {
                    Ok(Message::Text(text)) => ServerEvent::decode(text.as_bytes(), WireFormat::Json),
                    Ok(Message::Binary(data)) => ServerEvent::decode(&data, WireFormat::Binary),
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                match decoded {
                    Ok(event) => {
                        if event_tx.send(ClientEvent::Server(event)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => log::warn!("Dropping undecodable server event: {e}"),
                }
            }

            *state.write().await = ConnectionState::Disconnected;
            let _ = event_tx.send(ClientEvent::Disconnected).await;
        });

        Ok(())
    }

    /// Send a raw request.
    pub async fn send(&self, request: &ClientRequest) -> Result<(), ProtocolError> {
        let Some(tx) = self.outgoing_tx.as_ref() else {
            return Err(ProtocolError::ConnectionClosed);
        };
        let encoded = request.encode(self.format)?;
        let frame = match self.format {
            WireFormat::Json => Message::Text(
                String::from_utf8(encoded)
                    .map_err(|e| ProtocolError::SerializationError(e.to_string()))?
                    .into(),
            ),
            WireFormat::Binary => Message::Binary(encoded.into()),
        };
        tx.send(frame)
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// Close the connection. The reader reports `Disconnected` once the
    /// server acknowledges.
    pub fn disconnect(&mut self) {
        self.outgoing_tx = None;
    }

    /// Send a `createRoom` request.
    pub async fn create_room(&self, params: RoomParams) -> Result<(), ProtocolError> {
        self.send(&ClientRequest::create_room(params)).await
    }

    /// Send a `joinRoom` request.
    pub async fn join_room(
        &self,
        room_id: &RoomId,
        user_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<(), ProtocolError> {
        self.send(&ClientRequest::JoinRoom {
            room_id: room_id.clone(),
            user_name: user_name.to_string(),
            avatar_url: avatar_url.map(str::to_string),
        })
        .await
    }

    /// Send a `togglePeekStatus` request.
    pub async fn toggle_peek(&self, room_id: &RoomId, is_peeking: bool) -> Result<(), ProtocolError> {
        self.send(&ClientRequest::TogglePeekStatus {
            room_id: room_id.clone(),
            is_peeking,
        })
        .await
    }

    /// Send a `startRoom` request.
    pub async fn start_room(&self, room_id: &RoomId) -> Result<(), ProtocolError> {
        self.send(&ClientRequest::StartRoom {
            room_id: room_id.clone(),
        })
        .await
    }

    /// Send an `updateTask` request.
    pub async fn update_task(&self, room_id: &RoomId, task_id: &str, new_title: &str) -> Result<(), ProtocolError> {
        self.send(&ClientRequest::UpdateTask {
            room_id: room_id.clone(),
            task_id: task_id.to_string(),
            new_title: new_title.to_string(),
        })
        .await
    }

    /// Send a `deleteTask` request.
    pub async fn delete_task(&self, room_id: &RoomId, task_id: &str) -> Result<(), ProtocolError> {
        self.send(&ClientRequest::DeleteTask {
            room_id: room_id.clone(),
            task_id: task_id.to_string(),
        })
        .await
    }

    /// Send a `sendVote` request.
    pub async fn send_vote(&self, room_id: &RoomId, vote: &str) -> Result<(), ProtocolError> {
        self.send(&ClientRequest::SendVote {
            room_id: room_id.clone(),
            vote: vote.to_string(),
        })
        .await
    }

    /// Send a `showVotes` request.
    pub async fn show_votes(&self, room_id: &RoomId) -> Result<(), ProtocolError> {
        self.send(&ClientRequest::ShowVotes {
            room_id: room_id.clone(),
        })
        .await
    }

    /// Send a `nextTask` request.
    pub async fn next_task(&self, room_id: &RoomId) -> Result<(), ProtocolError> {
        self.send(&ClientRequest::NextTask {
            room_id: room_id.clone(),
        })
        .await
    }

    /// Send an `addTasks` request.
    pub async fn add_tasks(&self, room_id: &RoomId, titles: &[&str]) -> Result<(), ProtocolError> {
        self.send(&ClientRequest::AddTasks {
            room_id: room_id.clone(),
            new_task_titles: titles.iter().map(|t| t.to_string()).collect(),
        })
        .await
    }

    /// Get the current connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Get the server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Get the wire format.
    pub fn format(&self) -> WireFormat {
        self.format
    }
}
