//! Macro-generated test suite for `ChatStore` contract validation.
//!
//! # Generated Tests
//!
//! ## Messages
//! - `test_append_returns_persisted_record`: the returned record is what was stored
//! - `test_append_multiple`: every append is stored once, with distinct ids
//!
//! ## Participants
//! - `test_get_participants`: the seeded participant list comes back
//! - `test_get_participants_unknown_conversation`: unknown id is an error
//!
//! ## Counters and timestamps
//! - `test_increment_unread`: counters are per participant and start at zero
//! - `test_increment_unread_unknown_conversation`: unknown id is an error
//! - `test_touch_advances_updated_at`
//! - `test_concurrent_increments`: parallel increments are not lost

/// Generate a full `ChatStore` conformance test suite.
///
/// `$factory` must be an expression that evaluates to a fresh, empty store
/// implementing `StoreFixture`. It is re-evaluated for each test.
#[macro_export]
macro_rules! chat_store_tests {
    ($factory:expr) => {
        mod chat_store_contract_tests {
            use super::*;
            use chrono::{Duration, Utc};
            use rentchat::core::ChatStore;
            use std::collections::HashSet;

            // ==================================================================
            // Messages
            // ==================================================================

            #[tokio::test]
            async fn test_append_returns_persisted_record() {
                let store = $factory;
                let chat = conversation_between(&["alice", "bob"]);
                store.seed(chat.clone()).await.unwrap();

                let record = store.append_message(&chat.id, "alice", "hi").await.unwrap();
                assert_eq!(record.chat_id, chat.id);
                assert_eq!(record.sender_id, "alice");
                assert_eq!(record.content, "hi");
                assert!(!record.is_read);
                assert!(!record.id.is_empty());

                let stored = store.stored_messages(&chat.id).await.unwrap();
                assert_eq!(stored.len(), 1);
                assert_eq!(stored[0].id, record.id);
                assert_eq!(stored[0].content, "hi");
            }

            #[tokio::test]
            async fn test_append_multiple() {
                let store = $factory;
                let chat = conversation_between(&["alice", "bob"]);
                store.seed(chat.clone()).await.unwrap();

                for content in ["one", "two", "three"] {
                    store.append_message(&chat.id, "bob", content).await.unwrap();
                }

                let stored = store.stored_messages(&chat.id).await.unwrap();
                assert_eq!(stored.len(), 3);
                let ids: HashSet<_> = stored.iter().map(|m| m.id.clone()).collect();
                assert_eq!(ids.len(), 3);
                let contents: HashSet<_> = stored.iter().map(|m| m.content.as_str()).collect();
                assert_eq!(contents, HashSet::from(["one", "two", "three"]));
            }

            // ==================================================================
            // Participants
            // ==================================================================

            #[tokio::test]
            async fn test_get_participants() {
                let store = $factory;
                let chat = conversation_between(&["alice", "bob", "carol"]);
                store.seed(chat.clone()).await.unwrap();

                let participants = store.get_participants(&chat.id).await.unwrap();
                assert_eq!(participants, vec!["alice", "bob", "carol"]);
            }

            #[tokio::test]
            async fn test_get_participants_unknown_conversation() {
                let store = $factory;
                assert!(store.get_participants("missing").await.is_err());
            }

            // ==================================================================
            // Counters and timestamps
            // ==================================================================

            #[tokio::test]
            async fn test_increment_unread() {
                let store = $factory;
                let chat = conversation_between(&["alice", "bob"]);
                store.seed(chat.clone()).await.unwrap();

                store.increment_unread(&chat.id, "bob").await.unwrap();
                store.increment_unread(&chat.id, "bob").await.unwrap();

                let loaded = store.load(&chat.id).await.unwrap().unwrap();
                assert_eq!(loaded.unread_for("bob"), 2);
                assert_eq!(loaded.unread_for("alice"), 0);
            }

            #[tokio::test]
            async fn test_increment_unread_unknown_conversation() {
                let store = $factory;
                assert!(store.increment_unread("missing", "bob").await.is_err());
            }

            #[tokio::test]
            async fn test_touch_advances_updated_at() {
                let store = $factory;
                let mut chat = conversation_between(&["alice", "bob"]);
                chat.updated_at = Utc::now() - Duration::hours(1);
                store.seed(chat.clone()).await.unwrap();

                store.touch_conversation(&chat.id).await.unwrap();

                let loaded = store.load(&chat.id).await.unwrap().unwrap();
                assert!(loaded.updated_at > chat.updated_at);
                assert_eq!(loaded.participants, chat.participants);
            }

            #[tokio::test]
            async fn test_concurrent_increments() {
                let store = $factory;
                let chat = conversation_between(&["alice", "bob"]);
                store.seed(chat.clone()).await.unwrap();

                let mut handles = Vec::new();
                for _ in 0..20 {
                    let store = store.clone();
                    let chat_id = chat.id.clone();
                    handles.push(tokio::spawn(async move {
                        store.increment_unread(&chat_id, "bob").await.unwrap();
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }

                let loaded = store.load(&chat.id).await.unwrap().unwrap();
                assert_eq!(loaded.unread_for("bob"), 20);
            }
        }
    };
}
