use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::messages;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: i32,
    pub sender_id: i32,
    pub receiver_id: i32,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    pub is_read: bool,
}

impl From<messages::Model> for MessageView {
    fn from(m: messages::Model) -> Self {
        Self {
            id: m.id,
            sender_id: m.sender_id,
            receiver_id: m.receiver_id,
            text: m.text,
            sent_at: m.sent_at,
            is_read: m.is_read,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub booking_id: i32,
    pub messages: Vec<MessageView>,
    /// Unread count for the viewer before this open marked them read
    pub unread_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub sent: bool,
    pub notice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatListItem {
    pub booking_id: i32,
    pub other_user_id: Option<i32>,
    pub last_message: Option<MessageView>,
    pub unread_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatListResponse {
    pub chats: Vec<ChatListItem>,
}
