//! Message protocol definitions
//!
//! JSON-based bidirectional envelope protocol using Serde's tagged enums.
//! Type tags are kebab-case and payload fields camelCase, matching the
//! browser clients on the other end of the socket.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::types::{ClientId, RoomId};

/// Client → Server envelope
///
/// One self-contained record per WebSocket text frame, discriminated by
/// the `type` field. Unrecognized types fail deserialization and are
/// dropped by the connection handler without a reply.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Announce identity for this connection
    Register {
        client_id: ClientId,
        username: Option<String>,
    },
    /// Create a room (idempotent) and join it
    CreateRoom {
        room_id: RoomId,
        password: Option<String>,
        chat_channel: Option<String>,
    },
    /// Join a room, lazily creating an open one if it does not exist
    JoinRoom {
        room_id: RoomId,
        password: Option<String>,
    },
    /// Leave the current room
    LeaveRoom,
    /// Chat message to the current room
    ChatMessage { message: String },
    /// Camera on/off announcement to the current room
    VideoState { video_enabled: bool },
    /// Microphone on/off announcement to the current room
    AudioState { audio_enabled: bool },
    /// WebRTC offer, relayed verbatim to the target peer
    Offer { target_id: ClientId, data: Value },
    /// WebRTC answer, relayed verbatim to the target peer
    Answer { target_id: ClientId, data: Value },
    /// ICE candidate, relayed verbatim to the target peer
    IceCandidate { target_id: ClientId, data: Value },
    /// Moderator: disconnect a user from the room
    KickUser { target_id: ClientId },
    /// Moderator: ban a client id from the room and kick if present
    BanUser { target_id: ClientId },
    /// Moderator: hand moderation to another member
    PromoteModerator { target_id: ClientId },
    /// Rename self
    ChangeName { new_username: String },
    /// Moderator: rename another member
    ModeratorChangeName {
        target_id: ClientId,
        new_username: String,
    },
}

/// One entry of the roster sent to a joining client
#[derive(Debug, Clone, Serialize)]
pub struct RoomUser {
    pub id: ClientId,
    pub username: String,
}

/// Server → Client envelope
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Registration acknowledged
    Registered {
        client_id: ClientId,
        username: String,
    },
    /// Sent to a client that successfully joined a room
    RoomJoined {
        room_id: RoomId,
        users: Vec<RoomUser>,
        has_password: bool,
        irc_channel: Option<String>,
        is_moderator: bool,
        moderator_id: Option<ClientId>,
    },
    /// Another participant joined the room
    UserJoined {
        client_id: ClientId,
        username: String,
    },
    /// A participant left the room
    UserLeft {
        client_id: ClientId,
        username: String,
    },
    /// The room requires a password and none was supplied
    PasswordRequired { room_id: RoomId },
    /// Validation error
    Error { message: String },
    /// Chat message fanned out to the room
    ChatMessage {
        username: String,
        message: String,
        timestamp: f64,
    },
    /// A participant toggled their camera
    VideoState {
        client_id: ClientId,
        video_enabled: bool,
    },
    /// A participant toggled their microphone
    AudioState {
        client_id: ClientId,
        audio_enabled: bool,
    },
    /// Relayed WebRTC offer
    Offer { sender_id: ClientId, data: Value },
    /// Relayed WebRTC answer
    Answer { sender_id: ClientId, data: Value },
    /// Relayed ICE candidate
    IceCandidate { sender_id: ClientId, data: Value },
    /// You were kicked from the room
    Kicked { message: String },
    /// You were banned from the room
    Banned { message: String },
    /// A participant's display name changed
    NameChanged {
        client_id: ClientId,
        old_username: String,
        new_username: String,
    },
    /// The moderator changed your display name
    NameChangedByModerator { new_username: String },
    /// You are now the room's moderator
    YouAreModerator,
    /// The room has a new moderator
    ModeratorPromoted {
        moderator_id: ClientId,
        username: String,
    },
}

/// Convert a validation error to its client-facing `error` event
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        ServerMessage::Error {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_deserialize() {
        let raw = r#"{"type": "register", "clientId": "abc-123", "username": "Alice"}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::Register { client_id, username } => {
                assert_eq!(client_id, ClientId::from("abc-123"));
                assert_eq!(username.as_deref(), Some("Alice"));
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_join_room_optional_password() {
        let raw = r#"{"type": "join-room", "roomId": "lobby"}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::JoinRoom { room_id, password } => {
                assert_eq!(room_id, RoomId::from("lobby"));
                assert!(password.is_none());
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_relay_payload_is_opaque() {
        let raw = r#"{"type": "ice-candidate", "targetId": "peer-9",
                      "data": {"candidate": "candidate:1 1 UDP 2122", "sdpMLineIndex": 0}}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::IceCandidate { target_id, data } => {
                assert_eq!(target_id, ClientId::from("peer-9"));
                assert_eq!(data["sdpMLineIndex"], json!(0));
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let raw = r#"{"type": "self-destruct"}"#;
        assert!(serde_json::from_str::<ClientMessage>(raw).is_err());
    }

    #[test]
    fn test_room_joined_serialize() {
        let msg = ServerMessage::RoomJoined {
            room_id: RoomId::from("lobby"),
            users: vec![RoomUser {
                id: ClientId::from("abc"),
                username: "Alice".to_string(),
            }],
            has_password: true,
            irc_channel: Some("#lobby".to_string()),
            is_moderator: false,
            moderator_id: Some(ClientId::from("abc")),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"room-joined\""));
        assert!(json.contains("\"hasPassword\":true"));
        assert!(json.contains("\"ircChannel\":\"#lobby\""));
        assert!(json.contains("\"moderatorId\":\"abc\""));
        assert!(json.contains("\"username\":\"Alice\""));
    }

    #[test]
    fn test_password_required_serialize() {
        let msg = ServerMessage::PasswordRequired {
            room_id: RoomId::from("vault"),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"password-required\""));
        assert!(json.contains("\"roomId\":\"vault\""));
    }

    #[test]
    fn test_unit_variant_serialize() {
        let json = serde_json::to_string(&ServerMessage::YouAreModerator).unwrap();
        assert_eq!(json, r#"{"type":"you-are-moderator"}"#);
    }

    #[test]
    fn test_error_event_from_app_error() {
        let msg = ServerMessage::from(AppError::NotModerator("kick users"));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("Only moderator can kick users"));
    }
}
