//! WebSocket server for planning poker rooms.
//!
//! Architecture:
//! ```text
//! Client A ──┐                        ┌── SessionRegistry ── Room (Mutex) per token
//!             ├── connection task ──► SessionHub
//! Client B ──┘        ▲               └── GroupDispatcher ── BroadcastGroup per room
//!                     │                                          │
//!                     └──────────── outbox (mpsc) ◄──────────────┘
//! ```
//!
//! Each connection gets a fresh [`ConnectionId`], which is its identity
//! for admin checks and votes. Requests from one connection are handled
//! in arrival order; different connections run in parallel.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use poker_core::{ConnectionId, RoomId};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::broadcast::GroupDispatcher;
use crate::hub::SessionHub;
use crate::protocol::{ClientRequest, ServerEvent, WireFormat};
use crate::registry::SessionRegistry;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// Room events buffered per member before it lags
    pub broadcast_capacity: usize,
    /// Outgoing events buffered per connection
    pub outbox_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            broadcast_capacity: 256,
            outbox_capacity: 256,
        }
    }
}

/// Server statistics.
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub total_messages: u64,
    pub total_bytes: u64,
    pub malformed_messages: u64,
    pub active_rooms: usize,
    /// Tokens of every live room
    pub room_ids: Vec<RoomId>,
}

/// The poker server.
pub struct PokerServer {
    config: ServerConfig,
    hub: Arc<SessionHub<GroupDispatcher>>,
    stats: Arc<RwLock<ServerStats>>,
}

impl PokerServer {
    /// Create a server with an empty room registry.
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let dispatcher = Arc::new(GroupDispatcher::new(config.broadcast_capacity));
        Self {
            config,
            hub: Arc::new(SessionHub::new(registry, dispatcher)),
            stats: Arc::new(RwLock::new(ServerStats::default())),
        }
    }

    /// Create a server with the default config.
    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    /// Bind the configured address and serve until the listener fails.
    pub async fn run(&self) -> Result<(), BoxError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("Poker server listening on {}", self.config.bind_addr);
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), BoxError> {
        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("New TCP connection from {addr}");

            let hub = self.hub.clone();
            let stats = self.stats.clone();
            let outbox_capacity = self.config.outbox_capacity;

            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, addr, hub, stats, outbox_capacity).await {
                    log::error!("Connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Handle a single WebSocket connection.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        hub: Arc<SessionHub<GroupDispatcher>>,
        stats: Arc<RwLock<ServerStats>>,
        outbox_capacity: usize,
    ) -> Result<(), BoxError> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let connection_id: ConnectionId = Uuid::new_v4();
        let (outbox_tx, outbox_rx) = mpsc::channel(outbox_capacity);
        hub.dispatcher().register(connection_id, outbox_tx).await;

        log::info!("WebSocket connection {connection_id} established from {addr}");
        {
            let mut s = stats.write().await;
            s.total_connections += 1;
            s.active_connections += 1;
        }

        let result = Self::connection_loop(ws_stream, connection_id, addr, outbox_rx, &hub, &stats).await;

        // The participant entry stays in its room; only delivery stops.
        hub.dispatcher().unregister(&connection_id).await;
        {
            let mut s = stats.write().await;
            s.active_connections -= 1;
        }
        log::info!("Connection {connection_id} from {addr} closed");

        result
    }

    async fn connection_loop(
        ws_stream: tokio_tungstenite::WebSocketStream<TcpStream>,
        connection_id: ConnectionId,
        addr: SocketAddr,
        mut outbox_rx: mpsc::Receiver<Arc<ServerEvent>>,
        hub: &SessionHub<GroupDispatcher>,
        stats: &RwLock<ServerStats>,
    ) -> Result<(), BoxError> {
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        // Replies follow the format of the most recent request.
        let mut format = WireFormat::Json;

        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    let (bytes, frame_format) = match msg {
                        Some(Ok(Message::Text(text))) => (text.as_bytes().to_vec(), WireFormat::Json),
                        Some(Ok(Message::Binary(data))) => (data.to_vec(), WireFormat::Binary),
                        Some(Ok(Message::Ping(data))) => {
                            ws_sender.send(Message::Pong(data)).await?;
                            continue;
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            log::error!("WebSocket error from {addr}: {e}");
                            break;
                        }
                        Some(Ok(_)) => continue,
                    };

                    {
                        let mut s = stats.write().await;
                        s.total_messages += 1;
                        s.total_bytes += bytes.len() as u64;
                    }

                    match ClientRequest::decode(&bytes, frame_format) {
                        Ok(request) => {
                            format = frame_format;
                            match request.room_id() {
                                Some(room_id) => log::debug!("{} for room {room_id} from {connection_id}", request.name()),
                                None => log::debug!("{} from {connection_id}", request.name()),
                            }
                            hub.handle(connection_id, request).await;
                        }
                        Err(e) => {
                            stats.write().await.malformed_messages += 1;
                            log::warn!("Failed to decode request from {addr}: {e}");
                        }
                    }
                }

                Some(event) = outbox_rx.recv() => {
                    let encoded = event.encode(format)?;
                    let frame = match format {
                        WireFormat::Json => Message::Text(String::from_utf8(encoded)?.into()),
                        WireFormat::Binary => Message::Binary(encoded.into()),
                    };
                    ws_sender.send(frame).await?;
                }
            }
        }

        Ok(())
    }

    /// Get server statistics.
    pub async fn stats(&self) -> ServerStats {
        let mut stats = self.stats.read().await.clone();
        stats.room_ids = self.hub.registry().room_ids().await;
        stats.active_rooms = stats.room_ids.len();
        stats
    }

    /// Get the configured bind address.
    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the session hub.
    pub fn hub(&self) -> &Arc<SessionHub<GroupDispatcher>> {
        &self.hub
    }
}
