//! Basic type definitions for the signaling relay
//!
//! Provides newtype wrappers for the three identifier spaces:
//! - `ConnId`: server-generated UUID identifying one live connection
//! - `ClientId`: caller-supplied client identifier (not unique)
//! - `RoomId`: room name

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server-side connection identifier (newtype pattern)
///
/// Generated per accepted connection and never sent on the wire.
/// This is the authoritative key for session state; the caller-supplied
/// `ClientId` is only an addressing alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub Uuid);

impl ConnId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-supplied client identifier
///
/// Sent by the client in its `register` envelope. The server performs no
/// uniqueness check; duplicate registrations resolve arbitrarily on relay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl ClientId {
    /// Synthesize a display name from the leading characters of the id
    pub fn default_username(&self) -> String {
        let prefix: String = self.0.chars().take(8).collect();
        format!("User_{}", prefix)
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Room identifier
///
/// Rooms are named by their creators; there is no server-side format
/// restriction on the string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conn_id_unique() {
        let id1 = ConnId::new();
        let id2 = ConnId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_default_username_truncates() {
        let id = ClientId::from("abcdef1234567890");
        assert_eq!(id.default_username(), "User_abcdef12");
    }

    #[test]
    fn test_default_username_short_id() {
        let id = ClientId::from("ab");
        assert_eq!(id.default_username(), "User_ab");
    }
}
