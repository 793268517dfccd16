//! # RentChat
//!
//! Real-time chat core for a peer-to-peer rental marketplace.
//!
//! Clients open an authenticated WebSocket, join per-conversation rooms, and
//! exchange messages and typing indicators. Messages are persisted through a
//! [`ChatStore`](core::ChatStore) before they are fanned out, and participants
//! with no live connection can be reached through a
//! [`PushNotifier`](core::PushNotifier).
//!
//! ## Features
//!
//! - **Room fan-out**: one Hub serializes every registry change and broadcast
//! - **Bounded queues**: a slow client is evicted, never waited on
//! - **Keepalive**: ping/pong with idle read deadlines and write timeouts
//! - **Pluggable collaborators**: storage, identity and push are traits
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rentchat::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     ServerBuilder::new()
//!         .with_config(ChatConfig::default().with_env_overrides())
//!         .with_store(InMemoryChatStore::new())
//!         .serve()
//!         .await
//! }
//! ```

pub mod config;
pub mod core;
pub mod push;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        AuthenticatedUser, ChatError, ChatId, ChatStore, Conversation, HandshakeError,
        IdentityResolver, JwtIdentityResolver, MessageRecord, PushNotification, PushNotifier,
        StaticIdentityResolver, UserId,
    };

    // === Configuration ===
    pub use crate::config::ChatConfig;

    // === Server ===
    pub use crate::server::exposure::websocket::protocol::{ClientMessage, ServerMessage};
    pub use crate::server::{Hub, ServerBuilder, ServerHost, WebSocketExposure};

    // === Storage ===
    pub use crate::storage::InMemoryChatStore;

    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::MongoChatStore;

    // === Push ===
    pub use crate::push::LogPushNotifier;

    #[cfg(feature = "push")]
    pub use crate::push::WebhookPushNotifier;

    // === External re-exports ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}
