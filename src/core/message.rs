//! Durable chat records owned by the persistence adapter

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Opaque user identifier as resolved by the identity resolver
pub type UserId = String;

/// Conversation identifier; doubles as the room id in the Hub
pub type ChatId = String;

/// A persisted chat message
///
/// Serialized with camelCase keys, which is the shape clients receive inside
/// a `new_message` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Build a fresh unread message stamped with the server clock
    pub fn new(chat_id: impl Into<ChatId>, sender_id: impl Into<UserId>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            chat_id: chat_id.into(),
            sender_id: sender_id.into(),
            content: content.into(),
            is_read: false,
            created_at: Utc::now(),
        }
    }
}

/// Conversation metadata relevant to the real-time core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ChatId,
    pub participants: Vec<UserId>,
    /// Per-participant unread counters keyed by user id
    #[serde(default)]
    pub unread_count: HashMap<UserId, u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty conversation between the given participants
    pub fn new(participants: Vec<UserId>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().simple().to_string(),
            participants,
            unread_count: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Unread count for one participant (zero when never incremented)
    pub fn unread_for(&self, user_id: &str) -> u64 {
        self.unread_count.get(user_id).copied().unwrap_or(0)
    }
}
