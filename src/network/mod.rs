pub mod api;
pub mod channel;
pub mod frame;
pub mod socket;

pub use api::{ApiError, HttpApi, MessageApi, SendAck};
pub use channel::{ListenerId, Subscription, TransportChannel, WeakChannel};
