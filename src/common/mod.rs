pub mod commands;
pub mod envelope;
pub mod events;
pub mod types;

pub use commands::TransportCommand;
pub use envelope::{Addressed, ChatEnvelope, MessageData, TypingEnvelope};
pub use events::InboundEvent;
pub use types::{Direction, Friend, FriendRef, Message, MessageId, Session, User, UserId};
