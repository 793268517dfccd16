//! Domain types and collaborator contracts for the chat core

pub mod auth;
pub mod error;
pub mod message;
pub mod push;
pub mod store;

pub use auth::{AuthenticatedUser, IdentityResolver, JwtIdentityResolver, StaticIdentityResolver};
pub use error::{ChatError, ConfigError, HandshakeError};
pub use message::{ChatId, Conversation, MessageRecord, UserId};
pub use push::{PushNotification, PushNotifier};
pub use store::ChatStore;
