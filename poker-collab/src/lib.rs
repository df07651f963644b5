//! # poker-collab: real-time room layer for planning poker
//!
//! Serves many concurrently connected clients over WebSocket, each room
//! mutated through its own lock and every change fanned out to the room.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     WebSocket      ┌─────────────┐
//! │ PokerClient │ ◄─────────────────► │ PokerServer │
//! │ (per user)  │   JSON / bincode    │ (central)   │
//! └─────────────┘                     └──────┬──────┘
//!                                            │
//!                                     ┌──────┴──────┐
//!                                     │ SessionHub  │
//!                                     └──┬───────┬──┘
//!                                        │       │
//!                          ┌─────────────┴─┐   ┌─┴──────────────┐
//!                          │SessionRegistry│   │ GroupDispatcher│
//!                          │ Room per token│   │ BroadcastGroup │
//!                          └───────────────┘   └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: requests and events, JSON or bincode frames
//! - [`registry`]: room token → locked room
//! - [`broadcast`]: `Dispatcher` trait, room fan-out, caller outboxes
//! - [`hub`]: resolve, validate, mutate, publish
//! - [`server`]: WebSocket server
//! - [`client`]: WebSocket client
//! - [`testing`]: recording dispatcher for socket-free tests

pub mod protocol;
pub mod registry;
pub mod broadcast;
pub mod hub;
pub mod server;
pub mod client;
pub mod testing;

// Re-exports for convenience
pub use protocol::{ClientRequest, ProtocolError, ServerEvent, WireFormat};
pub use registry::{RoomHandle, SessionRegistry};
pub use broadcast::{BroadcastGroup, BroadcastStats, Dispatcher, GroupDispatcher, Outbox};
pub use hub::SessionHub;
pub use server::{PokerServer, ServerConfig, ServerStats};
pub use client::{ClientEvent, ConnectionState, PokerClient};
