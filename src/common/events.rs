use super::envelope::{ChatEnvelope, TypingEnvelope};

/// Sự kiện từ server đẩy xuống qua socket.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// `receiveMessage`
    ChatDelivered(ChatEnvelope),
    /// `typingRecived`
    TypingNotice(TypingEnvelope),
}

impl InboundEvent {
    pub const CHAT_DELIVERED: &'static str = "receiveMessage";
    pub const TYPING_NOTICE: &'static str = "typingRecived";
}
