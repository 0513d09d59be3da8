//! Client sessions and the session registry
//!
//! A `ClientSession` ties one live connection to its caller-supplied
//! identity; the `SessionRegistry` owns every session, keyed by the
//! server-side `ConnId`. The registry performs no clientId uniqueness
//! check; `find_by_client_id` resolves duplicates arbitrarily.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::{ClientId, ConnId, RoomId};

/// One item on a connection's outbound channel.
///
/// `Close` instructs the transport task to shut the socket; the
/// connection's normal disconnect path then performs state cleanup.
#[derive(Debug)]
pub enum Delivery {
    /// An outbound event to serialize and send
    Event(ServerMessage),
    /// Forcibly close the connection after draining queued events
    Close,
}

/// State for one registered connection
///
/// Created by a `register` envelope and destroyed on disconnect.
#[derive(Debug)]
pub struct ClientSession {
    /// Owning connection
    pub conn: ConnId,
    /// Caller-supplied identity (not unique)
    pub client_id: ClientId,
    /// Mutable display name
    pub username: String,
    /// Room currently joined, if any
    pub room: Option<RoomId>,
    /// Monotone stamp of the last successful join; defines tenure
    pub joined_seq: u64,
    /// Server → connection outbound channel
    sender: mpsc::Sender<Delivery>,
}

impl ClientSession {
    pub fn new(
        conn: ConnId,
        client_id: ClientId,
        username: Option<String>,
        sender: mpsc::Sender<Delivery>,
    ) -> Self {
        let username = username
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| client_id.default_username());
        Self {
            conn,
            client_id,
            username,
            room: None,
            joined_seq: 0,
            sender,
        }
    }

    /// Queue an event for this connection without blocking.
    ///
    /// A full or closed channel is reported to the caller, who logs and
    /// moves on; delivery failures are always isolated to one recipient.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.try_send(Delivery::Event(msg)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Queue a forced close for this connection.
    ///
    /// Events queued before the close are still delivered in order.
    pub fn close(&self) {
        if self.sender.try_send(Delivery::Close).is_err() {
            debug!("close signal for {} dropped, channel already gone", self.conn);
        }
    }

}

/// Registry of all live sessions, keyed by connection
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<ConnId, ClientSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    /// Create or overwrite the session for a connection.
    ///
    /// Callers must run the leave-room sequence on any existing session
    /// first; the registry itself only swaps the map entry.
    pub fn register(
        &mut self,
        conn: ConnId,
        client_id: ClientId,
        username: Option<String>,
        sender: mpsc::Sender<Delivery>,
    ) -> &ClientSession {
        let session = ClientSession::new(conn, client_id, username, sender);
        match self.sessions.entry(conn) {
            Entry::Occupied(mut entry) => {
                entry.insert(session);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(session),
        }
    }

    /// Remove a session, returning it if one existed.
    pub fn unregister(&mut self, conn: ConnId) -> Option<ClientSession> {
        self.sessions.remove(&conn)
    }

    pub fn get(&self, conn: ConnId) -> Option<&ClientSession> {
        self.sessions.get(&conn)
    }

    pub fn get_mut(&mut self, conn: ConnId) -> Option<&mut ClientSession> {
        self.sessions.get_mut(&conn)
    }

    /// First session whose clientId matches, in arbitrary iteration order.
    ///
    /// Used by peer relay only. Duplicate registrations of one clientId
    /// make this ambiguous, mirroring normal WebRTC negotiation races;
    /// moderation resolves its targets within room membership instead.
    pub fn find_by_client_id(&self, client_id: &ClientId) -> Option<&ClientSession> {
        self.sessions
            .values()
            .find(|session| &session.client_id == client_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientSession> {
        self.sessions.values()
    }

    /// Sessions currently pointing at the given room.
    pub fn in_room<'a>(&'a self, room: &'a RoomId) -> impl Iterator<Item = &'a ClientSession> {
        self.sessions
            .values()
            .filter(move |session| session.room.as_ref() == Some(room))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> mpsc::Sender<Delivery> {
        let (tx, _rx) = mpsc::channel(8);
        tx
    }

    #[tokio::test]
    async fn test_register_synthesizes_username() {
        let mut registry = SessionRegistry::new();
        let conn = ConnId::new();
        let session = registry.register(conn, ClientId::from("deadbeef-cafe"), None, sender());
        assert_eq!(session.username, "User_deadbeef");
        assert!(session.room.is_none());
    }

    #[tokio::test]
    async fn test_register_blank_username_synthesized() {
        let mut registry = SessionRegistry::new();
        let conn = ConnId::new();
        let session = registry.register(
            conn,
            ClientId::from("deadbeef"),
            Some("   ".to_string()),
            sender(),
        );
        assert_eq!(session.username, "User_deadbeef");
    }

    #[tokio::test]
    async fn test_register_overwrites() {
        let mut registry = SessionRegistry::new();
        let conn = ConnId::new();
        registry.register(conn, ClientId::from("first"), Some("A".into()), sender());
        registry.register(conn, ClientId::from("second"), Some("B".into()), sender());
        assert_eq!(registry.len(), 1);
        let session = registry.get(conn).unwrap();
        assert_eq!(session.client_id, ClientId::from("second"));
        assert_eq!(session.username, "B");
    }

    #[tokio::test]
    async fn test_unregister_returns_identity() {
        let mut registry = SessionRegistry::new();
        let conn = ConnId::new();
        registry.register(conn, ClientId::from("abc"), Some("Alice".into()), sender());
        let removed = registry.unregister(conn).unwrap();
        assert_eq!(removed.client_id, ClientId::from("abc"));
        assert!(registry.unregister(conn).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_find_by_client_id() {
        let mut registry = SessionRegistry::new();
        let conn = ConnId::new();
        registry.register(conn, ClientId::from("abc"), None, sender());
        assert_eq!(
            registry.find_by_client_id(&ClientId::from("abc")).unwrap().conn,
            conn
        );
        assert!(registry.find_by_client_id(&ClientId::from("zzz")).is_none());
    }

    #[tokio::test]
    async fn test_send_queues_event() {
        let (tx, mut rx) = mpsc::channel(8);
        let session = ClientSession::new(ConnId::new(), ClientId::from("abc"), None, tx);
        session
            .send(ServerMessage::Registered {
                client_id: ClientId::from("abc"),
                username: "User_abc".to_string(),
            })
            .unwrap();
        assert!(matches!(rx.try_recv(), Ok(Delivery::Event(_))));
    }

    #[tokio::test]
    async fn test_send_full_buffer_is_reported() {
        let (tx, _rx) = mpsc::channel(1);
        let session = ClientSession::new(ConnId::new(), ClientId::from("abc"), None, tx);
        session.send(ServerMessage::YouAreModerator).unwrap();
        assert!(matches!(
            session.send(ServerMessage::YouAreModerator),
            Err(SendError::Full)
        ));
    }
}
