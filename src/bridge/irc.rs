//! IRC adapter for the chat bridge
//!
//! Line-oriented IRC client over plain TCP implementing [`ChatBridge`]:
//! NICK/USER registration, PING/PONG keepalive, JOIN/PART channel
//! management, and PRIVMSG in both directions. TLS termination is left
//! to the deployment in front of the relay.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bridge::{ChatBridge, InboundCallback};
use crate::error::BridgeError;
use crate::types::RoomId;

/// Buffer of raw outbound IRC lines awaiting the writer task
const RAW_LINE_BUFFER: usize = 256;

/// IRC connection settings
#[derive(Debug, Clone)]
pub struct IrcConfig {
    pub server: String,
    pub port: u16,
    pub nickname: String,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            server: "irc.libera.chat".to_string(),
            port: 6667,
            nickname: "webrtc-bridge".to_string(),
        }
    }
}

/// IRC implementation of the chat bridge contract
pub struct IrcBridge {
    config: IrcConfig,
    raw_tx: Option<mpsc::Sender<String>>,
    connected: Arc<AtomicBool>,
    /// Room → channel mappings
    channels: Arc<Mutex<HashMap<RoomId, String>>>,
    /// Room → inbound message callbacks
    callbacks: Arc<Mutex<HashMap<RoomId, InboundCallback>>>,
}

impl IrcBridge {
    pub fn new(config: IrcConfig) -> Self {
        Self {
            config,
            raw_tx: None,
            connected: Arc::new(AtomicBool::new(false)),
            channels: Arc::new(Mutex::new(HashMap::new())),
            callbacks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn send_raw(&self, line: String) -> Result<(), BridgeError> {
        let tx = self.raw_tx.as_ref().ok_or(BridgeError::NotConnected)?;
        tx.send(line).await.map_err(|_| BridgeError::NotConnected)
    }
}

/// Prefix a channel name with `#` unless it already has one
fn normalize_channel(channel: &str) -> String {
    if channel.starts_with('#') {
        channel.to_string()
    } else {
        format!("#{}", channel)
    }
}

/// Parse `:nick!user@host PRIVMSG #channel :message` into
/// `(nick, channel, message)`.
fn parse_privmsg(line: &str) -> Option<(String, String, String)> {
    let (prefix, rest) = line.split_once(" PRIVMSG ")?;
    let nick = prefix.strip_prefix(':')?.split('!').next()?.to_string();
    let (channel, text) = rest.split_once(" :")?;
    Some((nick, channel.to_string(), text.to_string()))
}

/// Read inbound IRC lines: answer PINGs and dispatch channel messages
/// to the room callbacks.
async fn listen(
    mut reader: Lines<BufReader<OwnedReadHalf>>,
    raw_tx: mpsc::Sender<String>,
    nickname: String,
    connected: Arc<AtomicBool>,
    channels: Arc<Mutex<HashMap<RoomId, String>>>,
    callbacks: Arc<Mutex<HashMap<RoomId, InboundCallback>>>,
) {
    loop {
        if !connected.load(Ordering::Acquire) {
            break;
        }
        let line = match reader.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                warn!("IRC connection closed");
                connected.store(false, Ordering::Release);
                break;
            }
            Err(e) => {
                warn!("IRC read error: {}", e);
                connected.store(false, Ordering::Release);
                break;
            }
        };
        debug!("IRC: {}", line);

        if line.starts_with("PING") {
            let pong = line.replacen("PING", "PONG", 1);
            if raw_tx.send(pong).await.is_err() {
                break;
            }
            continue;
        }

        let Some((nick, channel, text)) = parse_privmsg(&line) else {
            continue;
        };
        // Don't echo our own messages back into the room
        if nick == nickname {
            continue;
        }

        let room = channels
            .lock()
            .iter()
            .find(|(_, mapped)| **mapped == channel)
            .map(|(room, _)| room.clone());
        if let Some(room) = room {
            let callbacks = callbacks.lock();
            if let Some(callback) = callbacks.get(&room) {
                callback(nick, text);
            }
        }
    }
    debug!("IRC listener ended");
}

#[async_trait]
impl ChatBridge for IrcBridge {
    async fn connect(&mut self) -> Result<(), BridgeError> {
        info!(
            "connecting to IRC server {}:{}",
            self.config.server, self.config.port
        );
        let stream =
            TcpStream::connect((self.config.server.as_str(), self.config.port)).await?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half).lines();

        write_half
            .write_all(format!("NICK {}\r\n", self.config.nickname).as_bytes())
            .await?;
        write_half
            .write_all(
                format!("USER {} 0 * :WebRTC Bridge Bot\r\n", self.config.nickname).as_bytes(),
            )
            .await?;

        // Wait for welcome (001) or end of MOTD (376), answering PINGs
        loop {
            let line = reader
                .next_line()
                .await?
                .ok_or(BridgeError::RegistrationClosed)?;
            debug!("IRC: {}", line);
            if line.starts_with("PING") {
                let pong = line.replacen("PING", "PONG", 1);
                write_half.write_all(format!("{}\r\n", pong).as_bytes()).await?;
            }
            if line.contains(" 001 ") || line.contains(" 376 ") {
                break;
            }
        }

        self.connected.store(true, Ordering::Release);
        info!("connected to IRC as {}", self.config.nickname);

        // Writer task: drains raw lines onto the socket
        let (raw_tx, mut raw_rx) = mpsc::channel::<String>(RAW_LINE_BUFFER);
        tokio::spawn(async move {
            while let Some(line) = raw_rx.recv().await {
                if write_half
                    .write_all(format!("{}\r\n", line).as_bytes())
                    .await
                    .is_err()
                {
                    break;
                }
            }
            let _ = write_half.shutdown().await;
            debug!("IRC writer ended");
        });

        tokio::spawn(listen(
            reader,
            raw_tx.clone(),
            self.config.nickname.clone(),
            Arc::clone(&self.connected),
            Arc::clone(&self.channels),
            Arc::clone(&self.callbacks),
        ));

        self.raw_tx = Some(raw_tx);
        Ok(())
    }

    async fn disconnect(&mut self) {
        let _ = self.send_raw("QUIT :WebRTC Bridge disconnecting".to_string()).await;
        self.connected.store(false, Ordering::Release);
        self.raw_tx = None;
        info!("disconnected from IRC");
    }

    async fn join_channel(&mut self, channel: &str, room_id: &RoomId) -> Result<(), BridgeError> {
        let channel = normalize_channel(channel);
        // Map first so inbound traffic right after the JOIN resolves
        self.channels.lock().insert(room_id.clone(), channel.clone());
        if let Err(e) = self.send_raw(format!("JOIN {}", channel)).await {
            self.channels.lock().remove(room_id);
            return Err(e);
        }
        info!("joined IRC channel {} for room {}", channel, room_id);
        Ok(())
    }

    async fn leave_channel(&mut self, room_id: &RoomId) -> Result<(), BridgeError> {
        let channel = self.channels.lock().remove(room_id);
        if let Some(channel) = channel {
            self.send_raw(format!("PART {}", channel)).await?;
            info!("left IRC channel {}", channel);
        }
        Ok(())
    }

    async fn send_message(
        &mut self,
        room_id: &RoomId,
        author: &str,
        text: &str,
    ) -> Result<(), BridgeError> {
        let channel = self.channels.lock().get(room_id).cloned();
        if let Some(channel) = channel {
            self.send_raw(format!("PRIVMSG {} :<{}> {}", channel, author, text))
                .await?;
        }
        Ok(())
    }

    fn on_inbound_message(&mut self, room_id: &RoomId, callback: InboundCallback) {
        self.callbacks.lock().insert(room_id.clone(), callback);
    }
}
