//! MongoDB chat store using the official MongoDB async driver.
//!
//! # Feature flag
//!
//! This module is gated behind the `mongodb_backend` feature flag:
//! ```toml
//! [dependencies]
//! rentchat-rs = { version = "0.1", features = ["mongodb_backend"] }
//! ```
//!
//! # Storage model
//!
//! Two collections, matching the marketplace's document layout:
//!
//! - `messages`: one document per message, `_id` plus camelCase fields.
//! - `chats`: one document per conversation with `participants`,
//!   `unreadCount` (a sub-document keyed by user id) and `updatedAt`.
//!
//! Timestamps are stored as RFC 3339 strings, consistent with how records are
//! serialized to clients.

use crate::core::ChatStore;
use crate::core::message::{Conversation, MessageRecord, UserId};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::Database;
use mongodb::bson::{Bson, Document, doc};
use serde::de::DeserializeOwned;

const MESSAGES: &str = "messages";
const CHATS: &str = "chats";

/// Convert a serde_json::Value (expected to be an Object) into a BSON Document,
/// renaming `id` → `_id` for MongoDB convention.
fn json_to_document(json: serde_json::Value) -> Result<Document> {
    let bson_val = mongodb::bson::to_bson(&json)
        .map_err(|e| anyhow!("Failed to convert JSON to BSON: {}", e))?;

    let mut doc = match bson_val {
        Bson::Document(d) => d,
        _ => return Err(anyhow!("Expected BSON document, got non-object")),
    };

    if let Some(id) = doc.remove("id") {
        doc.insert("_id", id);
    }

    Ok(doc)
}

/// Convert a BSON Document back into a model, renaming `_id` → `id`.
fn document_to_model<T: DeserializeOwned>(mut doc: Document) -> Result<T> {
    if let Some(id) = doc.remove("_id") {
        doc.insert("id", id);
    }
    mongodb::bson::from_document(doc).map_err(|e| anyhow!("Failed to convert BSON document: {}", e))
}

/// Chat store backed by MongoDB
#[derive(Clone, Debug)]
pub struct MongoChatStore {
    database: Database,
}

impl MongoChatStore {
    /// Create a new `MongoChatStore` with the given database handle.
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Get a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    fn messages(&self) -> mongodb::Collection<Document> {
        self.database.collection(MESSAGES)
    }

    fn chats(&self) -> mongodb::Collection<Document> {
        self.database.collection(CHATS)
    }

    /// Insert a conversation document (conversations are created by the
    /// marketplace API, this exists for seeding and tests)
    pub async fn insert_conversation(&self, conversation: &Conversation) -> Result<()> {
        let json = serde_json::to_value(conversation)
            .map_err(|e| anyhow!("Failed to serialize conversation: {}", e))?;
        self.chats()
            .insert_one(json_to_document(json)?)
            .await
            .map_err(|e| anyhow!("Failed to insert conversation: {}", e))?;
        Ok(())
    }

    /// Load a conversation by id
    pub async fn conversation(&self, chat_id: &str) -> Result<Option<Conversation>> {
        self.chats()
            .find_one(doc! { "_id": chat_id })
            .await
            .map_err(|e| anyhow!("Failed to load conversation: {}", e))?
            .map(document_to_model)
            .transpose()
    }

    /// All messages of a conversation, oldest first
    pub async fn messages_for(&self, chat_id: &str) -> Result<Vec<MessageRecord>> {
        let docs: Vec<Document> = self
            .messages()
            .find(doc! { "chatId": chat_id })
            .sort(doc! { "createdAt": 1 })
            .await
            .map_err(|e| anyhow!("Failed to query messages: {}", e))?
            .try_collect()
            .await
            .map_err(|e| anyhow!("Failed to read messages: {}", e))?;

        docs.into_iter().map(document_to_model).collect()
    }
}

#[async_trait]
impl ChatStore for MongoChatStore {
    async fn append_message(
        &self,
        chat_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<MessageRecord> {
        let message = MessageRecord::new(chat_id, sender_id, content);
        let json = serde_json::to_value(&message)
            .map_err(|e| anyhow!("Failed to serialize message: {}", e))?;

        self.messages()
            .insert_one(json_to_document(json)?)
            .await
            .map_err(|e| anyhow!("Failed to insert message: {}", e))?;

        Ok(message)
    }

    async fn increment_unread(&self, chat_id: &str, participant_id: &str) -> Result<()> {
        let key = format!("unreadCount.{}", participant_id);
        let result = self
            .chats()
            .update_one(doc! { "_id": chat_id }, doc! { "$inc": { key: 1 } })
            .await
            .map_err(|e| anyhow!("Failed to increment unread count: {}", e))?;

        if result.matched_count == 0 {
            return Err(anyhow!("Conversation {} not found", chat_id));
        }
        Ok(())
    }

    async fn get_participants(&self, chat_id: &str) -> Result<Vec<UserId>> {
        let chat = self
            .chats()
            .find_one(doc! { "_id": chat_id })
            .await
            .map_err(|e| anyhow!("Failed to load conversation: {}", e))?
            .ok_or_else(|| anyhow!("Conversation {} not found", chat_id))?;

        let participants = chat
            .get_array("participants")
            .map_err(|e| anyhow!("Conversation {} has no participants: {}", chat_id, e))?;

        Ok(participants
            .iter()
            .filter_map(|p| p.as_str().map(str::to_string))
            .collect())
    }

    async fn touch_conversation(&self, chat_id: &str) -> Result<()> {
        self.chats()
            .update_one(
                doc! { "_id": chat_id },
                doc! { "$set": { "updatedAt": Utc::now().to_rfc3339() } },
            )
            .await
            .map_err(|e| anyhow!("Failed to touch conversation: {}", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_document_uses_mongo_id() {
        let message = MessageRecord::new("c1", "alice", "hi");
        let doc = json_to_document(serde_json::to_value(&message).unwrap()).unwrap();

        assert_eq!(doc.get_str("_id").unwrap(), message.id);
        assert!(doc.get("id").is_none());
        assert_eq!(doc.get_str("chatId").unwrap(), "c1");
        assert_eq!(doc.get_bool("isRead").unwrap(), false);
    }

    #[test]
    fn test_conversation_document_roundtrip() {
        let mut conv = Conversation::new(vec!["alice".to_string(), "bob".to_string()]);
        conv.unread_count.insert("bob".to_string(), 2);

        let doc = json_to_document(serde_json::to_value(&conv).unwrap()).unwrap();
        assert_eq!(doc.get_str("_id").unwrap(), conv.id);

        let back: Conversation = document_to_model(doc).unwrap();
        assert_eq!(back, conv);
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(json_to_document(serde_json::json!([1, 2])).is_err());
    }
}
