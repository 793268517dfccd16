//! In-memory implementation of ChatStore for testing and development

use crate::core::message::{Conversation, MessageRecord, UserId};
use crate::core::ChatStore;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct StoreState {
    conversations: HashMap<String, Conversation>,
    messages: Vec<MessageRecord>,
}

/// In-memory chat store
///
/// Useful for testing and development. Uses RwLock for thread-safe access.
#[derive(Clone, Default)]
pub struct InMemoryChatStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryChatStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation between the given participants
    pub fn create_conversation(&self, participants: Vec<UserId>) -> Result<Conversation> {
        let conversation = Conversation::new(participants);
        self.insert_conversation(conversation.clone())?;
        Ok(conversation)
    }

    /// Insert a conversation with a caller-chosen id, replacing any existing one
    pub fn insert_conversation(&self, conversation: Conversation) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        state
            .conversations
            .insert(conversation.id.clone(), conversation);
        Ok(())
    }

    /// Get a conversation by id
    pub fn conversation(&self, chat_id: &str) -> Result<Option<Conversation>> {
        let state = self
            .state
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(state.conversations.get(chat_id).cloned())
    }

    /// Messages of a conversation, oldest first
    pub fn messages(&self, chat_id: &str) -> Result<Vec<MessageRecord>> {
        let state = self
            .state
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let mut messages: Vec<MessageRecord> = state
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    /// Reset one participant's unread counter to zero
    pub fn mark_read(&self, chat_id: &str, user_id: &str) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let conversation = state
            .conversations
            .get_mut(chat_id)
            .ok_or_else(|| anyhow!("Conversation {} not found", chat_id))?;

        conversation.unread_count.insert(user_id.to_string(), 0);
        Ok(())
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn append_message(
        &self,
        chat_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<MessageRecord> {
        let mut state = self
            .state
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        if !state.conversations.contains_key(chat_id) {
            return Err(anyhow!("Conversation {} not found", chat_id));
        }

        let message = MessageRecord::new(chat_id, sender_id, content);
        state.messages.push(message.clone());

        Ok(message)
    }

    async fn increment_unread(&self, chat_id: &str, participant_id: &str) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let conversation = state
            .conversations
            .get_mut(chat_id)
            .ok_or_else(|| anyhow!("Conversation {} not found", chat_id))?;

        *conversation
            .unread_count
            .entry(participant_id.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn get_participants(&self, chat_id: &str) -> Result<Vec<UserId>> {
        let state = self
            .state
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        state
            .conversations
            .get(chat_id)
            .map(|c| c.participants.clone())
            .ok_or_else(|| anyhow!("Conversation {} not found", chat_id))
    }

    async fn touch_conversation(&self, chat_id: &str) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let conversation = state
            .conversations
            .get_mut(chat_id)
            .ok_or_else(|| anyhow!("Conversation {} not found", chat_id))?;

        conversation.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_chat() -> (InMemoryChatStore, Conversation) {
        let store = InMemoryChatStore::new();
        let chat = store
            .create_conversation(vec!["alice".to_string(), "bob".to_string()])
            .unwrap();
        (store, chat)
    }

    #[tokio::test]
    async fn test_append_message() {
        let (store, chat) = store_with_chat();

        let msg = store.append_message(&chat.id, "alice", "hi").await.unwrap();
        assert_eq!(msg.chat_id, chat.id);
        assert_eq!(msg.sender_id, "alice");
        assert_eq!(msg.content, "hi");
        assert!(!msg.is_read);

        let messages = store.messages(&chat.id).unwrap();
        assert_eq!(messages, vec![msg]);
    }

    #[tokio::test]
    async fn test_append_to_unknown_conversation_fails() {
        let store = InMemoryChatStore::new();
        assert!(store.append_message("nope", "alice", "hi").await.is_err());
        assert!(store.messages("nope").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_increment_and_mark_read() {
        let (store, chat) = store_with_chat();

        store.increment_unread(&chat.id, "bob").await.unwrap();
        store.increment_unread(&chat.id, "bob").await.unwrap();

        let conv = store.conversation(&chat.id).unwrap().unwrap();
        assert_eq!(conv.unread_for("bob"), 2);
        assert_eq!(conv.unread_for("alice"), 0);

        store.mark_read(&chat.id, "bob").unwrap();
        let conv = store.conversation(&chat.id).unwrap().unwrap();
        assert_eq!(conv.unread_for("bob"), 0);
    }

    #[tokio::test]
    async fn test_get_participants() {
        let (store, chat) = store_with_chat();

        let participants = store.get_participants(&chat.id).await.unwrap();
        assert_eq!(participants, vec!["alice".to_string(), "bob".to_string()]);
        assert!(store.get_participants("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_touch_conversation_advances_updated_at() {
        let (store, chat) = store_with_chat();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        store.touch_conversation(&chat.id).await.unwrap();
        let conv = store.conversation(&chat.id).unwrap().unwrap();
        assert!(conv.updated_at > chat.updated_at);
    }

    #[tokio::test]
    async fn test_messages_are_scoped_and_ordered() {
        let store = InMemoryChatStore::new();
        let c1 = store.create_conversation(vec!["a".into(), "b".into()]).unwrap();
        let c2 = store.create_conversation(vec!["a".into(), "c".into()]).unwrap();

        store.append_message(&c1.id, "a", "first").await.unwrap();
        store.append_message(&c2.id, "a", "elsewhere").await.unwrap();
        store.append_message(&c1.id, "b", "second").await.unwrap();

        let contents: Vec<String> = store
            .messages(&c1.id)
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["first", "second"]);
    }
}
