pub mod controller;
pub mod store;

pub use controller::{ControllerError, ControllerUpdate, ConversationController};
pub use store::{ConversationStore, ConversationView, LoadState, LocalUser, TYPING_WINDOW};
