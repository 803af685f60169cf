use super::envelope::{ChatEnvelope, TypingEnvelope};

/// Lệnh gửi xuống tầng mạng (socket).
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    /// `sendMessage`
    SendChat(ChatEnvelope),
    /// `typing`
    SendTyping(TypingEnvelope),
}

impl TransportCommand {
    pub const SEND_CHAT: &'static str = "sendMessage";
    pub const SEND_TYPING: &'static str = "typing";

    pub fn event_name(&self) -> &'static str {
        match self {
            TransportCommand::SendChat(_) => Self::SEND_CHAT,
            TransportCommand::SendTyping(_) => Self::SEND_TYPING,
        }
    }
}
