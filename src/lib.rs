//! Multi-Party WebRTC Signaling Relay Library
//!
//! A WebSocket signaling relay for multi-party WebRTC sessions built
//! with tokio-tungstenite, using the Actor pattern for state management.
//!
//! # Features
//! - Named rooms with optional password protection
//! - Roster exchange and join/leave notifications
//! - Opaque offer/answer/ICE-candidate relay between peers
//! - Room chat with optional mirroring into an IRC channel
//! - Per-room moderation: kick, ban, promote, rename
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `SignalingServer` is the central actor owning all session and room
//!   state; inbound messages are processed one at a time, so compound
//!   check-then-mutate sequences never interleave
//! - Each connection has a `handler` task translating envelopes into
//!   server commands and draining its own strictly-ordered delivery
//!   channel
//! - The optional chat bridge is injected behind the `ChatBridge` trait
//!   and managed by a `BridgeLink` connection state machine
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use signaling_relay::{handle_connection, BridgeLink, SignalingServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8765").await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     let bridge = BridgeLink::new(None, cmd_tx.clone());
//!     tokio::spawn(SignalingServer::new(cmd_rx, bridge).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let cmd_tx = cmd_tx.clone();
//!         tokio::spawn(handle_connection(stream, cmd_tx));
//!     }
//! }
//! ```

pub mod bridge;
pub mod error;
pub mod handler;
pub mod message;
pub mod room;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use bridge::irc::{IrcBridge, IrcConfig};
pub use bridge::{BridgeLink, BridgeState, ChatBridge};
pub use error::{AppError, BridgeError, SendError};
pub use handler::handle_connection;
pub use message::{ClientMessage, RoomUser, ServerMessage};
pub use room::{Room, RoomDirectory};
pub use server::{ServerCommand, SignalingServer};
pub use session::{ClientSession, Delivery, SessionRegistry};
pub use types::{ClientId, ConnId, RoomId};
