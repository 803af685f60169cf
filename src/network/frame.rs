//! Socket.IO v4 text frames over an Engine.IO v4 WebSocket.
//!
//! Only the subset the chat backend uses is understood: the Engine.IO
//! open/close/ping/pong packets and Socket.IO connect/disconnect/event
//! packets on the default namespace. Binary attachments are not supported.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::common::{ChatEnvelope, InboundEvent, TransportCommand, TypingEnvelope};

/// Socket.IO CONNECT on the default namespace.
pub const CONNECT: &str = "40";
/// Engine.IO PONG.
pub const PONG: &str = "3";

/// Upper bound on the idle timeout a server can ask for.
pub const MAX_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("unknown packet type `{0}`")]
    UnknownPacket(String),
    #[error("malformed event: {0}")]
    MalformedEvent(&'static str),
    #[error("unknown event `{0}`")]
    UnknownEvent(String),
    #[error("invalid payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Handshake data sent by the server in the Engine.IO OPEN packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

impl OpenInfo {
    /// How long the connection may stay silent before it is considered dead.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
            .min(MAX_IDLE_TIMEOUT)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Open(OpenInfo),
    Close,
    Ping,
    Pong,
    Noop,
    Connected,
    Disconnected,
    ConnectError(String),
    Event(InboundEvent),
}

pub fn decode(text: &str) -> Result<Frame, FrameError> {
    let mut chars = text.chars();
    let packet = chars.next().ok_or(FrameError::Empty)?;
    let rest = chars.as_str();

    match packet {
        '0' => Ok(Frame::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Frame::Close),
        '2' => Ok(Frame::Ping),
        '3' => Ok(Frame::Pong),
        '6' => Ok(Frame::Noop),
        '4' => decode_socket_packet(rest),
        other => Err(FrameError::UnknownPacket(other.to_string())),
    }
}

fn decode_socket_packet(text: &str) -> Result<Frame, FrameError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(FrameError::Empty)?;
    let rest = chars.as_str();

    match kind {
        '0' => Ok(Frame::Connected),
        '1' => Ok(Frame::Disconnected),
        '2' => decode_event(rest).map(Frame::Event),
        '4' => {
            let reason = serde_json::from_str::<Value>(rest)
                .ok()
                .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_owned))
                .unwrap_or_else(|| rest.to_string());
            Ok(Frame::ConnectError(reason))
        }
        other => Err(FrameError::UnknownPacket(format!("4{other}"))),
    }
}

fn decode_event(text: &str) -> Result<InboundEvent, FrameError> {
    // Namespaces other than `/` are not used; an optional ack id may precede the array.
    if text.starts_with('/') {
        return Err(FrameError::MalformedEvent("namespaced event"));
    }
    let body = text.trim_start_matches(|c: char| c.is_ascii_digit());

    let mut items: Vec<Value> = serde_json::from_str(body)?;
    if items.len() < 2 {
        return Err(FrameError::MalformedEvent("missing event payload"));
    }
    let payload = items.swap_remove(1);
    let name = items
        .first()
        .and_then(Value::as_str)
        .ok_or(FrameError::MalformedEvent("event name is not a string"))?;

    match name {
        InboundEvent::CHAT_DELIVERED => Ok(InboundEvent::ChatDelivered(
            serde_json::from_value::<ChatEnvelope>(payload)?,
        )),
        InboundEvent::TYPING_NOTICE => Ok(InboundEvent::TypingNotice(
            serde_json::from_value::<TypingEnvelope>(payload)?,
        )),
        other => Err(FrameError::UnknownEvent(other.to_string())),
    }
}

/// Encode an outbound command as a Socket.IO EVENT frame.
pub fn encode(command: &TransportCommand) -> Result<String, FrameError> {
    let payload = match command {
        TransportCommand::SendChat(envelope) => serde_json::to_value(envelope)?,
        TransportCommand::SendTyping(envelope) => serde_json::to_value(envelope)?,
    };
    let body = serde_json::to_string(&(command.event_name(), payload))?;
    Ok(format!("42{body}"))
}
