//! WebSocket connection handler
//!
//! Handles individual connections: WebSocket handshake, envelope
//! parsing, and bidirectional communication with the SignalingServer
//! actor. A malformed or unrecognized envelope is logged and dropped;
//! the connection stays open and no reply is sent.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::message::ClientMessage;
use crate::server::{RelayKind, ServerCommand};
use crate::session::Delivery;
use crate::types::ConnId;

/// Per-connection outbound delivery buffer
const DELIVERY_BUFFER_SIZE: usize = 64;

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, sets up the outbound delivery
/// channel, and manages the connection lifecycle. The session itself is
/// only created once the client sends a `register` envelope.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let conn = ConnId::new();
    info!("Connection {} accepted from {}", conn, peer_addr);

    // Channel for server -> connection deliveries
    let (msg_tx, mut msg_rx) = mpsc::channel::<Delivery>(DELIVERY_BUFFER_SIZE);

    // Clone cmd_tx for the read task
    let cmd_tx_read = cmd_tx.clone();

    // Read task (WebSocket -> ServerCommand)
    let read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(envelope) => {
                            let cmd = envelope_to_command(conn, envelope, &msg_tx);
                            if cmd_tx_read.send(cmd).await.is_err() {
                                debug!("Server closed, ending read task for {}", conn);
                                break;
                            }
                        }
                        Err(e) => {
                            // Protocol error: log and drop, no reply
                            warn!("Invalid envelope from {}: {}", conn, e);
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Connection {} sent close frame", conn);
                    break;
                }
                Ok(Message::Ping(_)) => {
                    // Pong is handled automatically by tungstenite
                    debug!("Ping from {}", conn);
                }
                Ok(Message::Pong(_)) => {
                    debug!("Pong from {}", conn);
                }
                Ok(_) => {
                    // Binary or other message types - ignore
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", conn, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", conn);
    });

    // Write task (Delivery -> WebSocket)
    let write_task = tokio::spawn(async move {
        while let Some(delivery) = msg_rx.recv().await {
            match delivery {
                Delivery::Event(msg) => match serde_json::to_string(&msg) {
                    Ok(json) => {
                        if ws_sender.send(Message::Text(json.into())).await.is_err() {
                            debug!("WebSocket send failed, ending write task");
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        // Continue - don't break on serialization errors
                    }
                },
                Delivery::Close => {
                    // Forced disconnect (kick/ban); queued events before
                    // this point have already been flushed in order
                    debug!("Forced close for {}", conn);
                    break;
                }
            }
        }
        debug!("Write task ended for {}", conn);

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = read_task => {
            debug!("Read task completed for {}", conn);
        }
        _ = write_task => {
            debug!("Write task completed for {}", conn);
        }
    }

    // Disconnect runs the leave-room sequence inside the actor
    let _ = cmd_tx.send(ServerCommand::Disconnect { conn }).await;

    info!("Connection {} closed", conn);

    Ok(())
}

/// Convert a decoded envelope into the actor command for this connection
fn envelope_to_command(
    conn: ConnId,
    msg: ClientMessage,
    sender: &mpsc::Sender<Delivery>,
) -> ServerCommand {
    match msg {
        ClientMessage::Register { client_id, username } => ServerCommand::Register {
            conn,
            client_id,
            username,
            sender: sender.clone(),
        },
        ClientMessage::CreateRoom {
            room_id,
            password,
            chat_channel,
        } => ServerCommand::CreateRoom {
            conn,
            room_id,
            password,
            chat_channel,
        },
        ClientMessage::JoinRoom { room_id, password } => ServerCommand::JoinRoom {
            conn,
            room_id,
            password,
        },
        ClientMessage::LeaveRoom => ServerCommand::LeaveRoom { conn },
        ClientMessage::ChatMessage { message } => ServerCommand::Chat { conn, message },
        ClientMessage::VideoState { video_enabled } => ServerCommand::VideoState {
            conn,
            enabled: video_enabled,
        },
        ClientMessage::AudioState { audio_enabled } => ServerCommand::AudioState {
            conn,
            enabled: audio_enabled,
        },
        ClientMessage::Offer { target_id, data } => ServerCommand::Relay {
            conn,
            kind: RelayKind::Offer,
            target: target_id,
            data,
        },
        ClientMessage::Answer { target_id, data } => ServerCommand::Relay {
            conn,
            kind: RelayKind::Answer,
            target: target_id,
            data,
        },
        ClientMessage::IceCandidate { target_id, data } => ServerCommand::Relay {
            conn,
            kind: RelayKind::IceCandidate,
            target: target_id,
            data,
        },
        ClientMessage::KickUser { target_id } => ServerCommand::Kick {
            conn,
            target: target_id,
        },
        ClientMessage::BanUser { target_id } => ServerCommand::Ban {
            conn,
            target: target_id,
        },
        ClientMessage::PromoteModerator { target_id } => ServerCommand::Promote {
            conn,
            target: target_id,
        },
        ClientMessage::ChangeName { new_username } => ServerCommand::Rename { conn, new_username },
        ClientMessage::ModeratorChangeName {
            target_id,
            new_username,
        } => ServerCommand::RenameOther {
            conn,
            target: target_id,
            new_username,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientId;

    fn command_for(raw: &str) -> ServerCommand {
        let envelope: ClientMessage = serde_json::from_str(raw).unwrap();
        let (tx, _rx) = mpsc::channel(1);
        envelope_to_command(ConnId::new(), envelope, &tx)
    }

    #[test]
    fn test_register_carries_sender() {
        let cmd = command_for(r#"{"type": "register", "clientId": "abc"}"#);
        match cmd {
            ServerCommand::Register {
                client_id, username, ..
            } => {
                assert_eq!(client_id, ClientId::from("abc"));
                assert!(username.is_none());
            }
            other => panic!("expected register command, got {:?}", other),
        }
    }

    #[test]
    fn test_signaling_envelopes_map_to_relay() {
        for (raw, kind) in [
            (r#"{"type": "offer", "targetId": "t", "data": {}}"#, "offer"),
            (r#"{"type": "answer", "targetId": "t", "data": {}}"#, "answer"),
            (
                r#"{"type": "ice-candidate", "targetId": "t", "data": {}}"#,
                "ice-candidate",
            ),
        ] {
            match command_for(raw) {
                ServerCommand::Relay { kind: k, target, .. } => {
                    assert_eq!(k.to_string(), kind);
                    assert_eq!(target, ClientId::from("t"));
                }
                other => panic!("expected relay command, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_moderation_envelopes() {
        assert!(matches!(
            command_for(r#"{"type": "kick-user", "targetId": "t"}"#),
            ServerCommand::Kick { .. }
        ));
        assert!(matches!(
            command_for(r#"{"type": "ban-user", "targetId": "t"}"#),
            ServerCommand::Ban { .. }
        ));
        assert!(matches!(
            command_for(r#"{"type": "promote-moderator", "targetId": "t"}"#),
            ServerCommand::Promote { .. }
        ));
        assert!(matches!(
            command_for(
                r#"{"type": "moderator-change-name", "targetId": "t", "newUsername": "N"}"#
            ),
            ServerCommand::RenameOther { .. }
        ));
    }
}
