//! Multi-Party WebRTC Signaling Relay - Entry Point
//!
//! Starts the TCP listener and SignalingServer actor, accepting
//! connections. The IRC chat bridge is enabled by setting
//! `RELAY_IRC_SERVER` (with optional `RELAY_IRC_PORT` and
//! `RELAY_IRC_NICK`); without it rooms simply run unbridged.

use std::env;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use signaling_relay::{handle_connection, BridgeLink, ChatBridge, IrcBridge, IrcConfig, SignalingServer};

/// Default server address
const DEFAULT_ADDR: &str = "0.0.0.0:8765";

/// Channel buffer size for server commands
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Build the IRC bridge from environment settings, if configured
fn bridge_from_env() -> Option<Box<dyn ChatBridge>> {
    let server = env::var("RELAY_IRC_SERVER").ok()?;
    let defaults = IrcConfig::default();
    let port = env::var("RELAY_IRC_PORT")
        .ok()
        .and_then(|raw| match raw.parse() {
            Ok(port) => Some(port),
            Err(_) => {
                warn!("Ignoring unparseable RELAY_IRC_PORT: {}", raw);
                None
            }
        })
        .unwrap_or(defaults.port);
    let nickname = env::var("RELAY_IRC_NICK").unwrap_or(defaults.nickname);

    info!("IRC bridge configured for {}:{} as {}", server, port, nickname);
    Some(Box::new(IrcBridge::new(IrcConfig {
        server,
        port,
        nickname,
    })))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=signaling_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("signaling_relay=info")),
        )
        .init();

    // Get bind address from command line or use default
    let addr = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    // Start TCP listener
    let listener = TcpListener::bind(&addr).await?;
    info!("WebRTC signaling relay listening on {}", addr);

    // Create SignalingServer actor channel and start
    let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let bridge = BridgeLink::new(bridge_from_env(), cmd_tx.clone());
    let server = SignalingServer::new(cmd_rx, bridge);
    tokio::spawn(server.run());

    info!("SignalingServer actor started");

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, cmd_tx).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
