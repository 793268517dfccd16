//! Persistence adapter contract for chat messages and unread counters

use crate::core::message::{MessageRecord, UserId};
use anyhow::Result;
use async_trait::async_trait;

/// Storage collaborator used by the message dispatcher
///
/// The real-time core only ever appends messages and bumps counters; reading
/// history and resetting counters belong to the REST layer. Implementations
/// decide their own consistency model.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Persist a new unread message stamped with the server clock
    async fn append_message(
        &self,
        chat_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<MessageRecord>;

    /// Add one to `participant_id`'s unread counter for the conversation
    async fn increment_unread(&self, chat_id: &str, participant_id: &str) -> Result<()>;

    /// List the participants of a conversation
    async fn get_participants(&self, chat_id: &str) -> Result<Vec<UserId>>;

    /// Set the conversation's last-activity timestamp to now
    async fn touch_conversation(&self, chat_id: &str) -> Result<()>;
}
