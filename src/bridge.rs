//! Chat bridge seam
//!
//! The relay can mirror a room's chat into an external chat network.
//! The network adapter is injected behind the [`ChatBridge`] trait; the
//! actor talks to it only through a [`BridgeLink`], which adds an
//! explicit connection state machine (connect on first need, bounded
//! connect timeout, `Unavailable` instead of blocking room creation)
//! and tracks which rooms are actually bound. A failing bridge never
//! affects the signaling path or any other room.

pub mod irc;

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::server::ServerCommand;
use crate::types::RoomId;

/// Bound on the chat network connect; on expiry the bridge is marked
/// `Unavailable` and room creation proceeds without a binding.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Callback invoked for each inbound external message on a bound room:
/// `(author, text)`.
pub type InboundCallback = Box<dyn Fn(String, String) + Send + Sync>;

/// Contract consumed by the core for mirroring room chat.
#[async_trait]
pub trait ChatBridge: Send {
    /// Connect and register with the chat network.
    async fn connect(&mut self) -> Result<(), BridgeError>;

    /// Tear the connection down.
    async fn disconnect(&mut self);

    /// Join a channel and map it to a room.
    async fn join_channel(&mut self, channel: &str, room_id: &RoomId) -> Result<(), BridgeError>;

    /// Leave the channel mapped to a room.
    async fn leave_channel(&mut self, room_id: &RoomId) -> Result<(), BridgeError>;

    /// Mirror one room message out to the mapped channel.
    async fn send_message(
        &mut self,
        room_id: &RoomId,
        author: &str,
        text: &str,
    ) -> Result<(), BridgeError>;

    /// Register the inbound callback for a room's channel.
    fn on_inbound_message(&mut self, room_id: &RoomId, callback: InboundCallback);
}

/// Connection state of the injected bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Never connected, or explicitly disconnected
    Disconnected,
    /// A connect attempt is in flight
    Connecting,
    /// Connected and usable
    Connected,
    /// The last connect attempt failed or timed out; retried on next need
    Unavailable,
}

/// Actor-side handle over the injected bridge.
///
/// All bridge traffic from the signaling core goes through here, so the
/// core never observes bridge failures as anything but a log line.
pub struct BridgeLink {
    bridge: Option<Box<dyn ChatBridge>>,
    state: BridgeState,
    bound: HashSet<RoomId>,
    commands: mpsc::Sender<ServerCommand>,
}

impl BridgeLink {
    /// Wrap an optional bridge. Inbound external messages are forwarded
    /// into the actor as [`ServerCommand::BridgeInbound`] via `commands`.
    pub fn new(bridge: Option<Box<dyn ChatBridge>>, commands: mpsc::Sender<ServerCommand>) -> Self {
        Self {
            bridge,
            state: BridgeState::Disconnected,
            bound: HashSet::new(),
            commands,
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn is_bound(&self, room_id: &RoomId) -> bool {
        self.bound.contains(room_id)
    }

    /// Connect on first need, bounded by [`CONNECT_TIMEOUT`].
    ///
    /// `Unavailable` is not sticky: the next need retries the connect.
    async fn ensure_connected(&mut self) -> bool {
        let Some(bridge) = self.bridge.as_mut() else {
            return false;
        };
        if self.state == BridgeState::Connected {
            return true;
        }
        if self.state == BridgeState::Unavailable {
            debug!("retrying previously unavailable chat bridge");
        }
        self.state = BridgeState::Connecting;
        match time::timeout(CONNECT_TIMEOUT, bridge.connect()).await {
            Ok(Ok(())) => {
                info!("chat bridge connected");
                self.state = BridgeState::Connected;
                true
            }
            Ok(Err(e)) => {
                warn!("chat bridge connect failed: {}", e);
                self.state = BridgeState::Unavailable;
                false
            }
            Err(_) => {
                warn!(
                    "chat bridge connect timed out after {:?}",
                    CONNECT_TIMEOUT
                );
                self.state = BridgeState::Unavailable;
                false
            }
        }
    }

    /// Bind a room to a chat channel: join it and wire inbound messages
    /// back into the actor. Returns whether the binding took effect.
    pub async fn bind_room(&mut self, room_id: &RoomId, channel: &str) -> bool {
        if !self.ensure_connected().await {
            warn!(
                "room {} created without chat binding, bridge unavailable",
                room_id
            );
            return false;
        }
        let Some(bridge) = self.bridge.as_mut() else {
            return false;
        };
        if let Err(e) = bridge.join_channel(channel, room_id).await {
            warn!("failed to join chat channel {} for room {}: {}", channel, room_id, e);
            return false;
        }

        let commands = self.commands.clone();
        let inbound_room = room_id.clone();
        bridge.on_inbound_message(
            room_id,
            Box::new(move |author, text| {
                let forwarded = commands.try_send(ServerCommand::BridgeInbound {
                    room_id: inbound_room.clone(),
                    author,
                    text,
                });
                if forwarded.is_err() {
                    debug!("dropping inbound chat message, server queue unavailable");
                }
            }),
        );

        self.bound.insert(room_id.clone());
        info!("room {} bound to chat channel {}", room_id, channel);
        true
    }

    /// Leave a room's channel. Idempotent; the actual `leave_channel`
    /// call happens exactly once per binding.
    pub async fn unbind_room(&mut self, room_id: &RoomId) {
        if !self.bound.remove(room_id) {
            return;
        }
        if let Some(bridge) = self.bridge.as_mut() {
            if let Err(e) = bridge.leave_channel(room_id).await {
                warn!("failed to leave chat channel for room {}: {}", room_id, e);
            }
        }
    }

    /// Mirror one message out for a bound room; unbound rooms are a no-op.
    pub async fn notify(&mut self, room_id: &RoomId, author: &str, text: &str) {
        if !self.bound.contains(room_id) {
            return;
        }
        if let Some(bridge) = self.bridge.as_mut() {
            if let Err(e) = bridge.send_message(room_id, author, text).await {
                warn!("failed to mirror message to chat network for room {}: {}", room_id, e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording bridge double for actor and link tests.

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::*;

    /// One observed bridge call.
    #[derive(Debug, Clone, PartialEq)]
    pub enum BridgeCall {
        Connect,
        Disconnect,
        Join(String, RoomId),
        Leave(RoomId),
        Send(RoomId, String, String),
    }

    /// Shared view of a [`RecordingBridge`]'s activity.
    #[derive(Clone, Default)]
    pub struct BridgeProbe {
        pub calls: Arc<Mutex<Vec<BridgeCall>>>,
        pub callbacks: Arc<Mutex<HashMap<RoomId, InboundCallback>>>,
    }

    impl BridgeProbe {
        pub fn calls(&self) -> Vec<BridgeCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, pred: impl Fn(&BridgeCall) -> bool) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
        }

        /// Simulate an inbound external message on a bound room.
        pub fn push_inbound(&self, room_id: &RoomId, author: &str, text: &str) {
            let callbacks = self.callbacks.lock().unwrap();
            if let Some(callback) = callbacks.get(room_id) {
                callback(author.to_string(), text.to_string());
            }
        }
    }

    /// ChatBridge double that records every call.
    pub struct RecordingBridge {
        probe: BridgeProbe,
        fail_connect: bool,
    }

    impl RecordingBridge {
        pub fn new() -> (Self, BridgeProbe) {
            let probe = BridgeProbe::default();
            (
                Self {
                    probe: probe.clone(),
                    fail_connect: false,
                },
                probe,
            )
        }

        pub fn failing() -> (Self, BridgeProbe) {
            let probe = BridgeProbe::default();
            (
                Self {
                    probe: probe.clone(),
                    fail_connect: true,
                },
                probe,
            )
        }
    }

    #[async_trait]
    impl ChatBridge for RecordingBridge {
        async fn connect(&mut self) -> Result<(), BridgeError> {
            self.probe.calls.lock().unwrap().push(BridgeCall::Connect);
            if self.fail_connect {
                Err(BridgeError::NotConnected)
            } else {
                Ok(())
            }
        }

        async fn disconnect(&mut self) {
            self.probe.calls.lock().unwrap().push(BridgeCall::Disconnect);
        }

        async fn join_channel(
            &mut self,
            channel: &str,
            room_id: &RoomId,
        ) -> Result<(), BridgeError> {
            self.probe
                .calls
                .lock()
                .unwrap()
                .push(BridgeCall::Join(channel.to_string(), room_id.clone()));
            Ok(())
        }

        async fn leave_channel(&mut self, room_id: &RoomId) -> Result<(), BridgeError> {
            self.probe
                .calls
                .lock()
                .unwrap()
                .push(BridgeCall::Leave(room_id.clone()));
            Ok(())
        }

        async fn send_message(
            &mut self,
            room_id: &RoomId,
            author: &str,
            text: &str,
        ) -> Result<(), BridgeError> {
            self.probe.calls.lock().unwrap().push(BridgeCall::Send(
                room_id.clone(),
                author.to_string(),
                text.to_string(),
            ));
            Ok(())
        }

        fn on_inbound_message(&mut self, room_id: &RoomId, callback: InboundCallback) {
            self.probe
                .callbacks
                .lock()
                .unwrap()
                .insert(room_id.clone(), callback);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{BridgeCall, RecordingBridge};
    use super::*;

    fn commands() -> (
        mpsc::Sender<ServerCommand>,
        mpsc::Receiver<ServerCommand>,
    ) {
        mpsc::channel(16)
    }

    #[tokio::test]
    async fn test_no_bridge_configured() {
        let (tx, _rx) = commands();
        let mut link = BridgeLink::new(None, tx);
        assert!(!link.bind_room(&RoomId::from("r1"), "chan").await);
        assert_eq!(link.state(), BridgeState::Disconnected);
    }

    #[tokio::test]
    async fn test_bind_connects_on_first_need() {
        let (bridge, probe) = RecordingBridge::new();
        let (tx, _rx) = commands();
        let mut link = BridgeLink::new(Some(Box::new(bridge)), tx);

        assert_eq!(link.state(), BridgeState::Disconnected);
        assert!(link.bind_room(&RoomId::from("r1"), "chan").await);
        assert_eq!(link.state(), BridgeState::Connected);
        assert!(link.is_bound(&RoomId::from("r1")));
        assert_eq!(
            probe.calls(),
            vec![
                BridgeCall::Connect,
                BridgeCall::Join("chan".to_string(), RoomId::from("r1"))
            ]
        );

        // Second binding reuses the connection
        assert!(link.bind_room(&RoomId::from("r2"), "other").await);
        assert_eq!(probe.count(|c| matches!(c, BridgeCall::Connect)), 1);
    }

    #[tokio::test]
    async fn test_failed_connect_marks_unavailable_and_retries() {
        let (bridge, probe) = RecordingBridge::failing();
        let (tx, _rx) = commands();
        let mut link = BridgeLink::new(Some(Box::new(bridge)), tx);

        assert!(!link.bind_room(&RoomId::from("r1"), "chan").await);
        assert_eq!(link.state(), BridgeState::Unavailable);
        assert!(!link.is_bound(&RoomId::from("r1")));

        // Next need retries the connect rather than staying dead
        assert!(!link.bind_room(&RoomId::from("r1"), "chan").await);
        assert_eq!(probe.count(|c| matches!(c, BridgeCall::Connect)), 2);
    }

    #[tokio::test]
    async fn test_unbind_leaves_channel_exactly_once() {
        let (bridge, probe) = RecordingBridge::new();
        let (tx, _rx) = commands();
        let mut link = BridgeLink::new(Some(Box::new(bridge)), tx);

        let room = RoomId::from("r1");
        assert!(link.bind_room(&room, "chan").await);
        link.unbind_room(&room).await;
        link.unbind_room(&room).await;
        assert_eq!(probe.count(|c| matches!(c, BridgeCall::Leave(_))), 1);
        assert!(!link.is_bound(&room));
    }

    #[tokio::test]
    async fn test_notify_only_when_bound() {
        let (bridge, probe) = RecordingBridge::new();
        let (tx, _rx) = commands();
        let mut link = BridgeLink::new(Some(Box::new(bridge)), tx);

        link.notify(&RoomId::from("r1"), "System", "ghost").await;
        assert_eq!(probe.count(|c| matches!(c, BridgeCall::Send(..))), 0);

        assert!(link.bind_room(&RoomId::from("r1"), "chan").await);
        link.notify(&RoomId::from("r1"), "Alice", "hello").await;
        assert_eq!(
            probe.count(|c| matches!(c, BridgeCall::Send(..))),
            1
        );
    }

    #[tokio::test]
    async fn test_inbound_callback_forwards_into_actor() {
        let (bridge, probe) = RecordingBridge::new();
        let (tx, mut rx) = commands();
        let mut link = BridgeLink::new(Some(Box::new(bridge)), tx);

        let room = RoomId::from("r1");
        assert!(link.bind_room(&room, "chan").await);
        probe.push_inbound(&room, "nick", "hi from outside");

        match rx.try_recv() {
            Ok(ServerCommand::BridgeInbound {
                room_id,
                author,
                text,
            }) => {
                assert_eq!(room_id, room);
                assert_eq!(author, "nick");
                assert_eq!(text, "hi from outside");
            }
            other => panic!("expected BridgeInbound, got {:?}", other),
        }
    }
}
