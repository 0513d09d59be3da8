//! SignalingServer actor implementation
//!
//! The central actor owning all mutable state: the session registry and
//! the room directory. Connection handlers translate inbound envelopes
//! into `ServerCommand`s over an mpsc channel; the actor processes them
//! one at a time, so every compound check-then-mutate sequence commits
//! its map/set mutations before any outbound traffic and no other
//! message can observe intermediate state.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bridge::BridgeLink;
use crate::error::AppError;
use crate::message::{RoomUser, ServerMessage};
use crate::room::{AdmissionDenied, RoomDirectory};
use crate::session::{ClientSession, Delivery, SessionRegistry};
use crate::types::{ClientId, ConnId, RoomId};

/// Which opaque negotiation payload is being relayed
#[derive(Debug, Clone, Copy)]
pub enum RelayKind {
    Offer,
    Answer,
    IceCandidate,
}

impl std::fmt::Display for RelayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RelayKind::Offer => "offer",
            RelayKind::Answer => "answer",
            RelayKind::IceCandidate => "ice-candidate",
        };
        write!(f, "{}", name)
    }
}

/// Commands sent from connection handlers (and the chat bridge) to the actor
#[derive(Debug)]
pub enum ServerCommand {
    /// Connection announced its identity
    Register {
        conn: ConnId,
        client_id: ClientId,
        username: Option<String>,
        sender: mpsc::Sender<Delivery>,
    },
    /// Connection went away
    Disconnect { conn: ConnId },
    /// Create a room (idempotent) and join it
    CreateRoom {
        conn: ConnId,
        room_id: RoomId,
        password: Option<String>,
        chat_channel: Option<String>,
    },
    /// Join a room, lazily creating an open one if absent
    JoinRoom {
        conn: ConnId,
        room_id: RoomId,
        password: Option<String>,
    },
    /// Leave the current room
    LeaveRoom { conn: ConnId },
    /// Chat message to the current room
    Chat { conn: ConnId, message: String },
    /// Camera toggle announcement
    VideoState { conn: ConnId, enabled: bool },
    /// Microphone toggle announcement
    AudioState { conn: ConnId, enabled: bool },
    /// Forward a negotiation payload to a peer by client id
    Relay {
        conn: ConnId,
        kind: RelayKind,
        target: ClientId,
        data: Value,
    },
    /// Moderator: disconnect a member
    Kick { conn: ConnId, target: ClientId },
    /// Moderator: ban a client id, kicking it if present
    Ban { conn: ConnId, target: ClientId },
    /// Moderator: hand authority to a member
    Promote { conn: ConnId, target: ClientId },
    /// Rename self
    Rename { conn: ConnId, new_username: String },
    /// Moderator: rename a member
    RenameOther {
        conn: ConnId,
        target: ClientId,
        new_username: String,
    },
    /// Message arriving from the external chat network
    BridgeInbound {
        room_id: RoomId,
        author: String,
        text: String,
    },
}

/// Queue an event for one session, funneling failures to the log
fn send_to(session: &ClientSession, msg: ServerMessage) {
    if let Err(e) = session.send(msg) {
        debug!("send to {} failed: {}", session.conn, e);
    }
}

/// Seconds since the Unix epoch, for chat message timestamps
fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// The signaling relay actor
///
/// Owns sessions and rooms; all access goes through the command channel.
pub struct SignalingServer {
    /// All registered sessions, keyed by connection
    sessions: SessionRegistry,
    /// All live rooms
    rooms: RoomDirectory,
    /// Handle to the optional external chat network
    bridge: BridgeLink,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
    /// Monotone join counter; stamps member tenure
    join_seq: u64,
}

impl SignalingServer {
    pub fn new(receiver: mpsc::Receiver<ServerCommand>, bridge: BridgeLink) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            rooms: RoomDirectory::new(),
            bridge,
            receiver,
            join_seq: 0,
        }
    }

    /// Run the actor event loop until all command senders are dropped.
    pub async fn run(mut self) {
        info!("SignalingServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!("SignalingServer shutting down");
    }

    /// Process a single command
    async fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Register {
                conn,
                client_id,
                username,
                sender,
            } => {
                self.handle_register(conn, client_id, username, sender).await;
            }
            ServerCommand::Disconnect { conn } => {
                self.handle_disconnect(conn).await;
            }
            ServerCommand::CreateRoom {
                conn,
                room_id,
                password,
                chat_channel,
            } => {
                self.handle_create_room(conn, room_id, password, chat_channel)
                    .await;
            }
            ServerCommand::JoinRoom {
                conn,
                room_id,
                password,
            } => {
                self.handle_join_room(conn, room_id, password).await;
            }
            ServerCommand::LeaveRoom { conn } => {
                self.leave_current_room(conn).await;
            }
            ServerCommand::Chat { conn, message } => {
                self.handle_chat(conn, message).await;
            }
            ServerCommand::VideoState { conn, enabled } => {
                self.handle_video_state(conn, enabled);
            }
            ServerCommand::AudioState { conn, enabled } => {
                self.handle_audio_state(conn, enabled);
            }
            ServerCommand::Relay {
                conn,
                kind,
                target,
                data,
            } => {
                self.handle_relay(conn, kind, target, data);
            }
            ServerCommand::Kick { conn, target } => {
                self.handle_kick(conn, target);
            }
            ServerCommand::Ban { conn, target } => {
                self.handle_ban(conn, target);
            }
            ServerCommand::Promote { conn, target } => {
                self.handle_promote(conn, target).await;
            }
            ServerCommand::Rename { conn, new_username } => {
                self.handle_rename(conn, new_username).await;
            }
            ServerCommand::RenameOther {
                conn,
                target,
                new_username,
            } => {
                self.handle_rename_other(conn, target, new_username).await;
            }
            ServerCommand::BridgeInbound {
                room_id,
                author,
                text,
            } => {
                self.handle_bridge_inbound(room_id, author, text);
            }
        }
    }

    /// Handle identity registration for a connection
    async fn handle_register(
        &mut self,
        conn: ConnId,
        client_id: ClientId,
        username: Option<String>,
        sender: mpsc::Sender<Delivery>,
    ) {
        // Re-registering while in a room runs the leave sequence first so
        // membership never points at a stale identity
        if self.sessions.get(conn).and_then(|s| s.room.as_ref()).is_some() {
            self.leave_current_room(conn).await;
        }

        let (client_id, username) = {
            let session = self.sessions.register(conn, client_id, username, sender);
            send_to(
                session,
                ServerMessage::Registered {
                    client_id: session.client_id.clone(),
                    username: session.username.clone(),
                },
            );
            (session.client_id.clone(), session.username.clone())
        };

        info!(
            "Client {} ({}) connected. Total clients: {}",
            client_id,
            username,
            self.sessions.len()
        );
    }

    /// Handle connection teardown: leave-room sequence, then removal
    async fn handle_disconnect(&mut self, conn: ConnId) {
        self.leave_current_room(conn).await;

        if let Some(session) = self.sessions.unregister(conn) {
            info!(
                "Client {} disconnected. Total clients: {}",
                session.client_id,
                self.sessions.len()
            );
        }
    }

    /// Create a room (no-op when it exists) and join the creator to it
    async fn handle_create_room(
        &mut self,
        conn: ConnId,
        room_id: RoomId,
        password: Option<String>,
        chat_channel: Option<String>,
    ) {
        let Some(session) = self.sessions.get(conn) else {
            warn!("create-room from unregistered connection {}", conn);
            return;
        };
        let creator = session.client_id.clone();

        let created = self.rooms.create(
            room_id.clone(),
            password.as_deref(),
            chat_channel.clone(),
            Some(creator),
        );
        if created {
            info!("Room {} created", room_id);
            if let Some(channel) = &chat_channel {
                // Room entry is already committed; binding may suspend
                self.bridge.bind_room(&room_id, channel).await;
            }
        }

        self.join_room(conn, room_id, password).await;
    }

    /// Join a room, lazily creating an open one on first join
    async fn handle_join_room(
        &mut self,
        conn: ConnId,
        room_id: RoomId,
        password: Option<String>,
    ) {
        if self.sessions.get(conn).is_none() {
            warn!("join-room from unregistered connection {}", conn);
            return;
        }

        if !self.rooms.contains(&room_id) {
            self.rooms.create(room_id.clone(), None, None, None);
            info!("Room {} created", room_id);
        }

        self.join_room(conn, room_id, password).await;
    }

    /// The join sequence: ordered admission checks, implicit leave of any
    /// prior room, membership mutation, then replies and fanout.
    async fn join_room(&mut self, conn: ConnId, room_id: RoomId, password: Option<String>) {
        let Some(session) = self.sessions.get(conn) else {
            return;
        };
        let client_id = session.client_id.clone();
        let username = session.username.clone();

        // Rejoining the current room is answered with the roster again
        // rather than churning membership
        if session.room.as_ref() == Some(&room_id) {
            if let Some(reply) = self.room_joined_reply(conn, &room_id) {
                if let Some(session) = self.sessions.get(conn) {
                    send_to(session, reply);
                }
                return;
            }
        }

        let Some(room) = self.rooms.get(&room_id) else {
            self.send_error(conn, AppError::RoomNotFound);
            return;
        };
        match room.admit(&client_id, password.as_deref()) {
            Err(AdmissionDenied::Banned) => {
                self.send_error(conn, AppError::Banned);
                return;
            }
            Err(AdmissionDenied::PasswordRequired) => {
                if let Some(session) = self.sessions.get(conn) {
                    send_to(
                        session,
                        ServerMessage::PasswordRequired {
                            room_id: room_id.clone(),
                        },
                    );
                }
                return;
            }
            Err(AdmissionDenied::IncorrectPassword) => {
                self.send_error(conn, AppError::IncorrectPassword);
                return;
            }
            Ok(()) => {}
        }

        // Implicit leave of any prior room
        if self.sessions.get(conn).and_then(|s| s.room.as_ref()).is_some() {
            self.leave_current_room(conn).await;
        }

        // Commit membership before any outbound traffic
        self.join_seq += 1;
        let seq = self.join_seq;
        let member_count = {
            let Some(room) = self.rooms.get_mut(&room_id) else {
                return;
            };
            room.insert_member(conn);
            room.member_count()
        };
        if let Some(session) = self.sessions.get_mut(conn) {
            session.room = Some(room_id.clone());
            session.joined_seq = seq;
        }

        info!(
            "Client {} ({}) joined room {}. Room size: {}",
            client_id, username, room_id, member_count
        );

        if let Some(reply) = self.room_joined_reply(conn, &room_id) {
            if let Some(session) = self.sessions.get(conn) {
                send_to(session, reply);
            }
        }

        self.broadcast(
            &room_id,
            ServerMessage::UserJoined {
                client_id: client_id.clone(),
                username: username.clone(),
            },
            Some(conn),
        );

        self.bridge
            .notify(&room_id, "System", &format!("{} joined the room", username))
            .await;
    }

    /// Compose the `room-joined` event for a connection: roster of the
    /// other members plus the room's password/channel/moderator facts.
    fn room_joined_reply(&self, conn: ConnId, room_id: &RoomId) -> Option<ServerMessage> {
        let room = self.rooms.get(room_id)?;
        let session = self.sessions.get(conn)?;
        let users: Vec<RoomUser> = room
            .members()
            .iter()
            .filter(|member| **member != conn)
            .filter_map(|member| self.sessions.get(*member))
            .map(|s| RoomUser {
                id: s.client_id.clone(),
                username: s.username.clone(),
            })
            .collect();
        Some(ServerMessage::RoomJoined {
            room_id: room_id.clone(),
            users,
            has_password: room.has_password(),
            irc_channel: room.irc_channel.clone(),
            is_moderator: room.is_moderator(&session.client_id),
            moderator_id: room.moderator.clone(),
        })
    }

    /// The leave sequence: membership mutation, `user-left` fanout,
    /// bridge notice, then empty-room deletion or moderator succession.
    async fn leave_current_room(&mut self, conn: ConnId) {
        let Some(session) = self.sessions.get_mut(conn) else {
            return;
        };
        let Some(room_id) = session.room.take() else {
            return;
        };
        let client_id = session.client_id.clone();
        let username = session.username.clone();

        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };
        let emptied = room.remove_member(conn);
        let was_moderator = room.is_moderator(&client_id);

        info!("Client {} left room {}", client_id, room_id);

        self.broadcast(
            &room_id,
            ServerMessage::UserLeft {
                client_id,
                username: username.clone(),
            },
            Some(conn),
        );
        self.bridge
            .notify(&room_id, "System", &format!("{} left the room", username))
            .await;

        if emptied {
            // Detach the chat binding before the room goes away
            self.bridge.unbind_room(&room_id).await;
            self.rooms.remove(&room_id);
            info!("Room {} deleted (empty)", room_id);
        } else if was_moderator {
            self.promote_successor(&room_id).await;
        }
    }

    /// Hand moderation to the longest-tenured remaining member after the
    /// moderator's departure.
    async fn promote_successor(&mut self, room_id: &RoomId) {
        let successor = {
            let Some(room) = self.rooms.get(room_id) else {
                return;
            };
            // With duplicate client ids another session may still carry
            // the moderator identity; authority is then already covered
            if let Some(moderator) = &room.moderator {
                let still_present = room
                    .members()
                    .iter()
                    .filter_map(|member| self.sessions.get(*member))
                    .any(|s| &s.client_id == moderator);
                if still_present {
                    return;
                }
            }
            room.members()
                .iter()
                .filter_map(|member| self.sessions.get(*member))
                .min_by_key(|s| s.joined_seq)
                .map(|s| (s.conn, s.client_id.clone(), s.username.clone()))
        };
        let Some((conn, client_id, username)) = successor else {
            return;
        };

        if let Some(room) = self.rooms.get_mut(room_id) {
            room.moderator = Some(client_id.clone());
        }
        info!("Client {} promoted to moderator of room {}", client_id, room_id);

        if let Some(session) = self.sessions.get(conn) {
            send_to(session, ServerMessage::YouAreModerator);
        }
        self.broadcast(
            room_id,
            ServerMessage::ModeratorPromoted {
                moderator_id: client_id,
                username: username.clone(),
            },
            None,
        );
        self.bridge
            .notify(room_id, "System", &format!("{} is now the moderator", username))
            .await;
    }

    /// Fan a chat message out to the whole room and mirror it outward
    async fn handle_chat(&mut self, conn: ConnId, message: String) {
        let Some(session) = self.sessions.get(conn) else {
            return;
        };
        let Some(room_id) = session.room.clone() else {
            debug!("chat from {} outside any room", conn);
            return;
        };
        let username = session.username.clone();

        self.broadcast(
            &room_id,
            ServerMessage::ChatMessage {
                username: username.clone(),
                message: message.clone(),
                timestamp: unix_timestamp(),
            },
            None,
        );
        self.bridge.notify(&room_id, &username, &message).await;
    }

    /// Announce a camera toggle to the rest of the room
    fn handle_video_state(&mut self, conn: ConnId, enabled: bool) {
        let Some(session) = self.sessions.get(conn) else {
            return;
        };
        let Some(room_id) = session.room.clone() else {
            return;
        };
        let client_id = session.client_id.clone();
        self.broadcast(
            &room_id,
            ServerMessage::VideoState {
                client_id,
                video_enabled: enabled,
            },
            Some(conn),
        );
    }

    /// Announce a microphone toggle to the rest of the room
    fn handle_audio_state(&mut self, conn: ConnId, enabled: bool) {
        let Some(session) = self.sessions.get(conn) else {
            return;
        };
        let Some(room_id) = session.room.clone() else {
            return;
        };
        let client_id = session.client_id.clone();
        self.broadcast(
            &room_id,
            ServerMessage::AudioState {
                client_id,
                audio_enabled: enabled,
            },
            Some(conn),
        );
    }

    /// Forward a negotiation payload to the target peer, opaquely.
    ///
    /// A miss is logged server-side only; the sender is never told, which
    /// mirrors normal negotiation races around disconnects.
    fn handle_relay(&mut self, conn: ConnId, kind: RelayKind, target: ClientId, data: Value) {
        let Some(session) = self.sessions.get(conn) else {
            return;
        };
        let sender_id = session.client_id.clone();

        let msg = match kind {
            RelayKind::Offer => ServerMessage::Offer { sender_id, data },
            RelayKind::Answer => ServerMessage::Answer { sender_id, data },
            RelayKind::IceCandidate => ServerMessage::IceCandidate { sender_id, data },
        };

        match self.sessions.find_by_client_id(&target) {
            Some(target_session) => send_to(target_session, msg),
            None => warn!("Could not relay {} to {}", kind, target),
        }
    }

    /// Room the acting connection moderates, or the error to report
    fn moderated_room(&self, conn: ConnId, action: &'static str) -> Result<RoomId, AppError> {
        let session = self
            .sessions
            .get(conn)
            .ok_or(AppError::NotModerator(action))?;
        let room_id = session
            .room
            .clone()
            .ok_or(AppError::NotModerator(action))?;
        let room = self
            .rooms
            .get(&room_id)
            .ok_or(AppError::NotModerator(action))?;
        if room.is_moderator(&session.client_id) {
            Ok(room_id)
        } else {
            Err(AppError::NotModerator(action))
        }
    }

    /// Resolve a moderation target within one room's membership.
    ///
    /// Moderation never consults the global registry, so a duplicate
    /// client id outside the room can't be confused with a member.
    fn member_by_client_id(&self, room_id: &RoomId, target: &ClientId) -> Option<ConnId> {
        let room = self.rooms.get(room_id)?;
        room.members()
            .iter()
            .copied()
            .find(|member| {
                self.sessions
                    .get(*member)
                    .is_some_and(|s| &s.client_id == target)
            })
    }

    /// Moderator: notify and forcibly disconnect a member.
    ///
    /// The close is queued behind the notice; cleanup then arrives via
    /// the connection's normal disconnect path, never blocking this turn.
    fn handle_kick(&mut self, conn: ConnId, target: ClientId) {
        let room_id = match self.moderated_room(conn, "kick users") {
            Ok(room_id) => room_id,
            Err(e) => {
                self.send_error(conn, e);
                return;
            }
        };
        let Some(target_conn) = self.member_by_client_id(&room_id, &target) else {
            self.send_error(conn, AppError::TargetNotFound);
            return;
        };
        if let Some(session) = self.sessions.get(target_conn) {
            send_to(
                session,
                ServerMessage::Kicked {
                    message: "You have been kicked from the room".to_string(),
                },
            );
            session.close();
        }
        info!("User {} kicked from room {}", target, room_id);
    }

    /// Moderator: ban a client id for the room's lifetime.
    ///
    /// The ban lands regardless of presence; a present target is kicked.
    fn handle_ban(&mut self, conn: ConnId, target: ClientId) {
        let room_id = match self.moderated_room(conn, "ban users") {
            Ok(room_id) => room_id,
            Err(e) => {
                self.send_error(conn, e);
                return;
            }
        };
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.ban(target.clone());
        }
        info!("User {} banned from room {}", target, room_id);

        if let Some(target_conn) = self.member_by_client_id(&room_id, &target) {
            if let Some(session) = self.sessions.get(target_conn) {
                send_to(
                    session,
                    ServerMessage::Banned {
                        message: "You have been banned from this room".to_string(),
                    },
                );
                session.close();
            }
        }
    }

    /// Moderator: hand authority to another member
    async fn handle_promote(&mut self, conn: ConnId, target: ClientId) {
        let room_id = match self.moderated_room(conn, "promote moderators") {
            Ok(room_id) => room_id,
            Err(e) => {
                self.send_error(conn, e);
                return;
            }
        };
        let Some(target_conn) = self.member_by_client_id(&room_id, &target) else {
            self.send_error(conn, AppError::TargetNotFound);
            return;
        };
        let Some(target_session) = self.sessions.get(target_conn) else {
            return;
        };
        let target_id = target_session.client_id.clone();
        let target_name = target_session.username.clone();

        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.moderator = Some(target_id.clone());
        }
        info!("Client {} promoted to moderator of room {}", target_id, room_id);

        if let Some(session) = self.sessions.get(target_conn) {
            send_to(session, ServerMessage::YouAreModerator);
        }
        self.broadcast(
            &room_id,
            ServerMessage::ModeratorPromoted {
                moderator_id: target_id,
                username: target_name.clone(),
            },
            None,
        );
        self.bridge
            .notify(&room_id, "System", &format!("{} is now the moderator", target_name))
            .await;
    }

    /// Any member may rename itself
    async fn handle_rename(&mut self, conn: ConnId, new_username: String) {
        let new_username = new_username.trim().to_string();
        if new_username.is_empty() {
            debug!("ignoring empty rename from {}", conn);
            return;
        }
        let Some(session) = self.sessions.get_mut(conn) else {
            return;
        };
        let Some(room_id) = session.room.clone() else {
            debug!("rename from {} outside any room", conn);
            return;
        };
        let client_id = session.client_id.clone();
        let old_username = std::mem::replace(&mut session.username, new_username.clone());

        info!(
            "User {} changed name to {} in room {}",
            old_username, new_username, room_id
        );

        self.broadcast(
            &room_id,
            ServerMessage::NameChanged {
                client_id,
                old_username: old_username.clone(),
                new_username: new_username.clone(),
            },
            Some(conn),
        );
        self.bridge
            .notify(
                &room_id,
                "System",
                &format!("{} changed their name to {}", old_username, new_username),
            )
            .await;
    }

    /// Moderator: rename another member
    async fn handle_rename_other(&mut self, conn: ConnId, target: ClientId, new_username: String) {
        let room_id = match self.moderated_room(conn, "change user names") {
            Ok(room_id) => room_id,
            Err(e) => {
                self.send_error(conn, e);
                return;
            }
        };
        let new_username = new_username.trim().to_string();
        if new_username.is_empty() {
            debug!("ignoring empty moderator rename in room {}", room_id);
            return;
        }
        let Some(target_conn) = self.member_by_client_id(&room_id, &target) else {
            self.send_error(conn, AppError::TargetNotFound);
            return;
        };
        let Some(session) = self.sessions.get_mut(target_conn) else {
            return;
        };
        let target_id = session.client_id.clone();
        let old_username = std::mem::replace(&mut session.username, new_username.clone());

        info!(
            "Moderator changed {} to {} in room {}",
            old_username, new_username, room_id
        );

        if let Some(session) = self.sessions.get(target_conn) {
            send_to(
                session,
                ServerMessage::NameChangedByModerator {
                    new_username: new_username.clone(),
                },
            );
        }
        self.broadcast(
            &room_id,
            ServerMessage::NameChanged {
                client_id: target_id,
                old_username: old_username.clone(),
                new_username: new_username.clone(),
            },
            None,
        );
        self.bridge
            .notify(
                &room_id,
                "System",
                &format!("Moderator changed {}'s name to {}", old_username, new_username),
            )
            .await;
    }

    /// Fan an external chat message into the room, tagged as external
    fn handle_bridge_inbound(&mut self, room_id: RoomId, author: String, text: String) {
        if !self.rooms.contains(&room_id) {
            debug!("inbound chat for unknown room {}", room_id);
            return;
        }
        self.broadcast(
            &room_id,
            ServerMessage::ChatMessage {
                username: format!("{} (IRC)", author),
                message: text,
                timestamp: unix_timestamp(),
            },
            None,
        );
    }

    /// Deliver one message to every current member except `exclude`.
    ///
    /// Failures are isolated per recipient and funneled to the log; the
    /// fanout itself never suspends, so it always observes (and never
    /// interleaves with) fully-committed room state.
    fn broadcast(&self, room_id: &RoomId, message: ServerMessage, exclude: Option<ConnId>) {
        let Some(room) = self.rooms.get(room_id) else {
            return;
        };
        for member in room.members() {
            if Some(*member) == exclude {
                continue;
            }
            let Some(session) = self.sessions.get(*member) else {
                continue;
            };
            if let Err(e) = session.send(message.clone()) {
                warn!("broadcast to {} in room {} failed: {}", member, room_id, e);
            }
        }
    }

    /// Report a validation error back to the requesting connection
    fn send_error(&self, conn: ConnId, err: AppError) {
        if let Some(session) = self.sessions.get(conn) {
            send_to(session, ServerMessage::from(err));
        }
    }
}
