//! Shared test harness for chat store backends
//!
//! Provides the `StoreFixture` trait (seeding and read-back hooks that the
//! `ChatStore` contract itself does not expose) and the `chat_store_tests!`
//! conformance suite.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod store_harness;
//! use store_harness::*;
//!
//! chat_store_tests!(InMemoryChatStore::new());
//! ```

#![allow(dead_code)]

#[macro_use]
mod chat_store_tests;

use anyhow::Result;
use async_trait::async_trait;
use rentchat::core::{ChatStore, Conversation, MessageRecord};
use rentchat::storage::InMemoryChatStore;

/// Backend-specific hooks used by the conformance suite
#[async_trait]
pub trait StoreFixture: ChatStore + Clone + 'static {
    /// Insert a conversation as the marketplace API would
    async fn seed(&self, conversation: Conversation) -> Result<()>;

    /// Read a conversation back, including counters and timestamps
    async fn load(&self, chat_id: &str) -> Result<Option<Conversation>>;

    /// All messages persisted for a conversation
    async fn stored_messages(&self, chat_id: &str) -> Result<Vec<MessageRecord>>;
}

#[async_trait]
impl StoreFixture for InMemoryChatStore {
    async fn seed(&self, conversation: Conversation) -> Result<()> {
        self.insert_conversation(conversation)
    }

    async fn load(&self, chat_id: &str) -> Result<Option<Conversation>> {
        self.conversation(chat_id)
    }

    async fn stored_messages(&self, chat_id: &str) -> Result<Vec<MessageRecord>> {
        self.messages(chat_id)
    }
}

#[cfg(feature = "mongodb_backend")]
#[async_trait]
impl StoreFixture for rentchat::storage::MongoChatStore {
    async fn seed(&self, conversation: Conversation) -> Result<()> {
        self.insert_conversation(&conversation).await
    }

    async fn load(&self, chat_id: &str) -> Result<Option<Conversation>> {
        self.conversation(chat_id).await
    }

    async fn stored_messages(&self, chat_id: &str) -> Result<Vec<MessageRecord>> {
        self.messages_for(chat_id).await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Conversation with a fresh id between the given users
pub fn conversation_between(participants: &[&str]) -> Conversation {
    Conversation::new(participants.iter().map(|p| p.to_string()).collect())
}
