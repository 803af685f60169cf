use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Backend user identifier.
pub type UserId = i64;

/// Message id, unique within one conversation.
pub type MessageId = u64;

/// Chiều của tin nhắn nhìn từ phía người dùng hiện tại.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "sent")]
    Sent,
    /// The backend spells it `recived`; both spellings are accepted on input.
    #[serde(rename = "recived", alias = "received")]
    Received,
}

impl Direction {
    pub fn received() -> Self {
        Direction::Received
    }
}

/// Domain model đại diện một tin nhắn chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    #[serde(deserialize_with = "user_id::deserialize")]
    pub sender_id: UserId,
    #[serde(deserialize_with = "user_id::deserialize")]
    pub receiver_id: UserId,
    #[serde(rename = "type")]
    pub direction: Direction,
    #[serde(default = "Utc::now")]
    pub sent_at: DateTime<Utc>,
}

/// Authenticated identity. Either all three fields exist or there is no session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub username: String,
    pub token: String,
}

/// Một dòng trong danh sách bạn bè.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    #[serde(rename = "id")]
    pub friendship_id: i64,
    #[serde(deserialize_with = "user_id::deserialize")]
    pub friend_id: UserId,
    pub friend_name: String,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A user that is not yet a friend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "user_id::deserialize")]
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// The friend a conversation is opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendRef {
    pub id: UserId,
    pub name: String,
}

impl FriendRef {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl From<&Friend> for FriendRef {
    fn from(friend: &Friend) -> Self {
        Self::new(friend.friend_id, friend.friend_name.clone())
    }
}

/// User ids arrive either as JSON numbers or as numeric strings
/// (the login endpoint returns `"userId": "42"`).
pub mod user_id {
    use serde::{Deserialize, Deserializer, Serializer, de};

    use super::UserId;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    impl Raw {
        fn into_id<E: de::Error>(self) -> Result<UserId, E> {
            match self {
                Raw::Number(id) => Ok(id),
                Raw::Text(text) => text
                    .trim()
                    .parse()
                    .map_err(|_| E::custom(format!("invalid user id `{text}`"))),
            }
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<UserId, D::Error>
    where
        D: Deserializer<'de>,
    {
        Raw::deserialize(deserializer)?.into_id()
    }

    /// Same as [`deserialize`] for fields that may be missing or null.
    pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<UserId>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Raw>::deserialize(deserializer)?
            .map(Raw::into_id)
            .transpose()
    }

    /// Socket envelopes carry the id as a string, the way the web client sends it.
    pub fn serialize<S>(id: &UserId, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&id.to_string())
    }
}
