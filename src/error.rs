//! Error types for the signaling relay
//!
//! Defines transport-level errors, validation errors returned to clients,
//! and chat bridge errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and validation
/// errors (reported back to the requesting client as an `error` event).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal for the connection)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal for the connection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Target room does not exist
    #[error("Room does not exist")]
    RoomNotFound,

    /// Acting client id is on the room's ban list
    #[error("You have been banned from this room")]
    Banned,

    /// Supplied password does not match the room's digest
    #[error("Incorrect password")]
    IncorrectPassword,

    /// Moderator-only action attempted by a non-moderator.
    /// The payload names the action for the client-facing message.
    #[error("Only moderator can {0}")]
    NotModerator(&'static str),

    /// Moderation target is not a member of the acting room
    #[error("User not found in room")]
    TargetNotFound,
}

/// Message send errors
///
/// Occurs when queueing an outbound event on a per-connection channel.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    Closed,

    /// The per-connection buffer is full; the event is dropped
    #[error("Channel full")]
    Full,
}

/// Chat bridge errors
///
/// Failures of the external chat network adapter. These never propagate
/// into signaling results; callers log them and carry on.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// IO failure talking to the chat network
    #[error("bridge IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The chat network closed the stream before registration finished
    #[error("bridge connection closed during registration")]
    RegistrationClosed,

    /// An operation was attempted while not connected
    #[error("not connected to chat network")]
    NotConnected,
}
