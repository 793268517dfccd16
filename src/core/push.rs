//! Push hook for participants without a live connection

use crate::core::message::UserId;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum number of characters of message content shown in a push preview
pub const PREVIEW_CHARS: usize = 100;

/// A notification addressed to a single user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotification {
    pub recipient_id: UserId,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl PushNotification {
    /// Notification for a chat message delivered while the recipient was offline
    ///
    /// `sender_label` goes into the title. The chat core has no user profiles,
    /// so the dispatcher passes the sender's user id; a notifier that knows
    /// display names can rewrite the title before delivery.
    pub fn chat_message(recipient_id: &str, sender_label: &str, chat_id: &str, content: &str) -> Self {
        let mut data = HashMap::new();
        data.insert("type".to_string(), "chat".to_string());
        data.insert("chatId".to_string(), chat_id.to_string());

        Self {
            recipient_id: recipient_id.to_string(),
            title: format!("New message from {}", sender_label),
            body: preview(content),
            data,
        }
    }
}

/// Truncate content to the preview length, on a character boundary
fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &content[..idx]),
        None => content.to_string(),
    }
}

/// External push delivery (FCM, APNs gateway, webhook...)
///
/// Called fire-and-forget from a spawned task. Errors are logged by the
/// caller and never reach the sender.
#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn notify(&self, notification: PushNotification) -> Result<()>;
}
