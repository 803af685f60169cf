use std::error::Error;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;

use crate::common::TransportCommand;

use super::channel::WeakChannel;
use super::frame::{self, Frame};

const INITIAL_BACKOFF_SECS: u64 = 2;
const MAX_BACKOFF_SECS: u64 = 60;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(45);

enum SessionEnd {
    /// Every channel handle is gone; stop for good.
    Shutdown,
    /// Connection dropped; reconnect after backoff.
    Lost,
}

/// Turn the configured server URL into the Engine.IO WebSocket endpoint.
pub fn endpoint(socket_url: &str) -> String {
    let base = socket_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{base}/socket.io/?EIO=4&transport=websocket")
}

/// Keeps the socket connected until every channel handle is dropped.
///
/// Outbound commands issued while disconnected are discarded; there is no
/// offline queue.
pub async fn run(
    endpoint: String,
    mut commands: mpsc::UnboundedReceiver<TransportCommand>,
    channel: WeakChannel,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    // Malformed URLs are rejected before entering the retry loop.
    endpoint.as_str().into_client_request()?;
    let mut backoff_secs = INITIAL_BACKOFF_SECS;

    loop {
        if discard_pending(&mut commands) {
            return Ok(());
        }

        match connect_async(endpoint.as_str()).await {
            Ok((ws_stream, _response)) => {
                backoff_secs = INITIAL_BACKOFF_SECS;
                log::info!("Socket connected: {endpoint}");
                match drive(ws_stream, &mut commands, &channel).await {
                    SessionEnd::Shutdown => {
                        log::info!("Socket closed: no remaining channel handles");
                        return Ok(());
                    }
                    SessionEnd::Lost => {
                        log::warn!("Socket disconnected, reconnecting in {backoff_secs}s");
                    }
                }
            }
            Err(err) => {
                log::warn!("Socket connection failed (retry in {backoff_secs}s): {err}");
            }
        }

        sleep(Duration::from_secs(backoff_secs)).await;
        backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
    }
}

/// Drop anything queued while offline. Returns true once the sender side is gone.
fn discard_pending(commands: &mut mpsc::UnboundedReceiver<TransportCommand>) -> bool {
    let mut dropped = 0usize;
    loop {
        match commands.try_recv() {
            Ok(_) => dropped += 1,
            Err(mpsc::error::TryRecvError::Empty) => break,
            Err(mpsc::error::TryRecvError::Disconnected) => return true,
        }
    }
    if dropped > 0 {
        log::warn!("Dropped {dropped} outbound event(s) while disconnected");
    }
    false
}

async fn drive(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    commands: &mut mpsc::UnboundedReceiver<TransportCommand>,
    channel: &WeakChannel,
) -> SessionEnd {
    let (mut write, mut read) = ws_stream.split();
    let mut idle_timeout = DEFAULT_IDLE_TIMEOUT;
    let mut last_seen = Instant::now();
    // Commands stay queued until the server acknowledges the namespace connect.
    let mut joined = false;

    loop {
        tokio::select! {
            command = commands.recv(), if joined => {
                let Some(command) = command else {
                    let _ = write.send(WsMessage::Close(None)).await;
                    return SessionEnd::Shutdown;
                };
                match frame::encode(&command) {
                    Ok(text) => {
                        if let Err(err) = write.send(WsMessage::Text(text)).await {
                            log::warn!("Failed to write {}: {err}", command.event_name());
                            return SessionEnd::Lost;
                        }
                    }
                    Err(err) => log::warn!("Failed to encode {}: {err}", command.event_name()),
                }
            }
            message = read.next() => {
                last_seen = Instant::now();
                let text = match message {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(WsMessage::Close(_))) | None => return SessionEnd::Lost,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        log::warn!("Socket read error: {err}");
                        return SessionEnd::Lost;
                    }
                };

                let reply = match frame::decode(&text) {
                    Ok(Frame::Open(info)) => {
                        idle_timeout = info.idle_timeout();
                        Some(frame::CONNECT)
                    }
                    Ok(Frame::Ping) => Some(frame::PONG),
                    Ok(Frame::Connected) => {
                        log::info!("Socket.IO namespace connected");
                        joined = true;
                        None
                    }
                    Ok(Frame::Event(event)) => {
                        let Some(channel) = channel.upgrade() else {
                            return SessionEnd::Shutdown;
                        };
                        channel.dispatch(&event);
                        None
                    }
                    Ok(Frame::ConnectError(reason)) => {
                        log::warn!("Socket.IO connect refused: {reason}");
                        return SessionEnd::Lost;
                    }
                    Ok(Frame::Close) | Ok(Frame::Disconnected) => return SessionEnd::Lost,
                    Ok(Frame::Pong) | Ok(Frame::Noop) => None,
                    Err(err) => {
                        log::debug!("Discarding frame: {err}");
                        None
                    }
                };

                if let Some(reply) = reply {
                    if let Err(err) = write.send(WsMessage::Text(reply.to_string())).await {
                        log::warn!("Failed to answer server: {err}");
                        return SessionEnd::Lost;
                    }
                }
            }
            _ = sleep_until(last_seen + idle_timeout) => {
                log::warn!("Socket silent for {}s", idle_timeout.as_secs());
                return SessionEnd::Lost;
            }
        }
    }
}
