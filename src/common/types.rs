use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of the conversation wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SenderType {
    User,
    Admin,
}

/// Domain model of one chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Server-assigned id; absent until the server has stored the message.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Temporary id generated when the message was sent from this client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
    pub message: String,
    pub sender_type: SenderType,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl ChatMessage {
    /// Local entry shown before the server confirms it.
    pub fn optimistic(message: impl Into<String>, sender_type: SenderType) -> Self {
        Self {
            id: None,
            client_id: Some(Uuid::new_v4()),
            message: message.into(),
            sender_type,
            timestamp: Utc::now(),
            read: false,
        }
    }
}

/// Response of `GET /chat/user-chats` and `POST /chat/send-message`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatHistory {
    #[serde(rename = "_id")]
    pub chat_id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Body of the `send-message` event and its REST fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub user_id: String,
    pub message: String,
    pub sender_type: SenderType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
}
