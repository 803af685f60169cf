use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{Direction, MessageId, UserId, user_id};

/// Chat payload carried inside a [`ChatEnvelope`].
///
/// Only `content` is required on input; everything else is informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    pub content: String,
    #[serde(
        default,
        deserialize_with = "user_id::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub sender_id: Option<UserId>,
    #[serde(
        default,
        deserialize_with = "user_id::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub receiver_id: Option<UserId>,
    #[serde(rename = "type", default = "Direction::received")]
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

/// Friend-addressed chat event, both directions.
///
/// `recipient_username` is the username of the user the event is meant for,
/// `sender_user_id` is the id of the user who produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEnvelope {
    #[serde(rename = "friendName")]
    pub recipient_username: String,
    #[serde(rename = "userId", with = "user_id")]
    pub sender_user_id: UserId,
    #[serde(rename = "messageData")]
    pub payload: MessageData,
}

/// Friend-addressed typing notice, both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingEnvelope {
    #[serde(rename = "friendName")]
    pub recipient_username: String,
    #[serde(rename = "userId", with = "user_id")]
    pub sender_user_id: UserId,
}

/// Routing information shared by both envelope kinds.
pub trait Addressed {
    fn recipient_username(&self) -> &str;
    fn sender_user_id(&self) -> UserId;
}

impl Addressed for ChatEnvelope {
    fn recipient_username(&self) -> &str {
        &self.recipient_username
    }

    fn sender_user_id(&self) -> UserId {
        self.sender_user_id
    }
}

impl Addressed for TypingEnvelope {
    fn recipient_username(&self) -> &str {
        &self.recipient_username
    }

    fn sender_user_id(&self) -> UserId {
        self.sender_user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_envelope_uses_web_client_field_names() {
        let envelope = ChatEnvelope {
            recipient_username: "alice".into(),
            sender_user_id: 12,
            payload: MessageData {
                id: Some(3),
                content: "hi".into(),
                sender_id: Some(12),
                receiver_id: Some(20),
                direction: Direction::Received,
                sent_at: None,
            },
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "friendName": "alice",
                "userId": "12",
                "messageData": {
                    "id": 3,
                    "content": "hi",
                    "senderId": 12,
                    "receiverId": 20,
                    "type": "recived"
                }
            })
        );
    }

    #[test]
    fn inbound_chat_tolerates_sparse_message_data() {
        let value = json!({
            "friendName": "bob",
            "userId": 4,
            "messageData": { "content": "hello", "senderId": "4", "receiverId": 1 }
        });
        let envelope: ChatEnvelope = serde_json::from_value(value).unwrap();
        assert_eq!(envelope.sender_user_id, 4);
        assert_eq!(envelope.payload.content, "hello");
        assert_eq!(envelope.payload.direction, Direction::Received);
    }

    #[test]
    fn chat_without_content_is_rejected() {
        let value = json!({ "friendName": "bob", "userId": 4, "messageData": {} });
        assert!(serde_json::from_value::<ChatEnvelope>(value).is_err());
    }
}
