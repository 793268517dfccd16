//! WebSocket message protocol definitions
//!
//! Defines the JSON envelopes exchanged between chat clients and the server.
//!
//! ## Client → Server Messages
//!
//! ```json
//! {"type": "join_chat", "chatId": "c1"}
//! {"type": "leave_chat", "chatId": "c1"}
//! {"type": "send_message", "chatId": "c1", "content": "hi"}
//! {"type": "typing", "chatId": "c1", "isTyping": true}
//! ```
//!
//! ## Server → Client Messages
//!
//! ```json
//! {"type": "new_message", "message": {"id": "...", "chatId": "c1", "senderId": "u1",
//!                                     "content": "hi", "isRead": false, "createdAt": "..."}}
//! {"type": "user_typing", "userId": "u1", "chatId": "c1", "isTyping": true}
//! ```
//!
//! Decoding never fails loudly: anything that is not one of the four client
//! envelopes (bad JSON, unknown `type`, missing or mistyped fields) decodes to
//! `None` and the frame is dropped.

use crate::core::message::{ChatId, MessageRecord, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A serialized outbound envelope, shared by every recipient of a broadcast
pub type Frame = Arc<str>;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start receiving the conversation's broadcasts
    JoinChat {
        #[serde(rename = "chatId")]
        chat_id: ChatId,
    },
    /// Stop receiving the conversation's broadcasts
    LeaveChat {
        #[serde(rename = "chatId")]
        chat_id: ChatId,
    },
    /// Persist a message and fan it out to the room
    SendMessage {
        #[serde(rename = "chatId")]
        chat_id: ChatId,
        content: String,
    },
    /// Ephemeral typing indicator, never persisted
    Typing {
        #[serde(rename = "chatId")]
        chat_id: ChatId,
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A message was persisted in a room the client has joined
    NewMessage { message: MessageRecord },
    /// Another member started or stopped typing
    UserTyping {
        #[serde(rename = "userId")]
        user_id: UserId,
        #[serde(rename = "chatId")]
        chat_id: ChatId,
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
}

/// Decode an inbound text frame
///
/// Returns `None` for anything that should be silently dropped.
pub fn decode(text: &str) -> Option<ClientMessage> {
    match serde_json::from_str(text) {
        Ok(msg) => Some(msg),
        Err(e) => {
            tracing::trace!(error = %e, "Dropping undecodable frame");
            None
        }
    }
}

/// Serialize an outbound envelope into a shareable frame
pub fn encode(msg: &ServerMessage) -> Result<Frame, serde_json::Error> {
    Ok(Arc::from(serde_json::to_string(msg)?))
}
