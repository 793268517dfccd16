//! WebSocket exposure for the chat core
//!
//! # Architecture
//!
//! ```text
//! Client ──ws──▶ ws_path ──▶ ws_handler() ──auth──▶ Session ──register──▶ Hub
//!                                                      │
//!                                    read loop ──▶ dispatch ──▶ ChatStore
//!                                                      │
//!                              Hub::broadcast_to_room ─┴─▶ outbound queues ──▶ write loops
//! ```
//!
//! # Protocol
//!
//! Client → Server (JSON):
//! - `{"type": "join_chat", "chatId": "..."}`
//! - `{"type": "leave_chat", "chatId": "..."}`
//! - `{"type": "send_message", "chatId": "...", "content": "..."}`
//! - `{"type": "typing", "chatId": "...", "isTyping": true}`
//!
//! Server → Client (JSON):
//! - `{"type": "new_message", "message": {...}}`
//! - `{"type": "user_typing", "userId": "...", "chatId": "...", "isTyping": true}`

pub mod dispatch;
mod handler;
pub mod hub;
pub mod protocol;
pub mod session;

pub use handler::{HandshakeParams, resolve_identity, ws_handler};

use crate::server::host::ServerHost;
use axum::{Router, routing::get};
use std::sync::Arc;

/// WebSocket API exposure implementation
///
/// Consumes a `ServerHost` and produces an Axum router with the chat upgrade
/// endpoint mounted at `config.ws_path`.
///
/// # Example
///
/// ```rust,ignore
/// use rentchat::server::{ServerBuilder, WebSocketExposure};
/// use rentchat::storage::InMemoryChatStore;
/// use std::sync::Arc;
///
/// let host = Arc::new(
///     ServerBuilder::new()
///         .with_store(InMemoryChatStore::new())
///         .build_host()?
/// );
///
/// let app = WebSocketExposure::build_router(host);
/// ```
pub struct WebSocketExposure;

impl WebSocketExposure {
    /// Build the WebSocket router from a host
    pub fn build_router(host: Arc<ServerHost>) -> Router {
        let path = host.config.ws_path.clone();
        Router::new()
            .route(&path, get(ws_handler))
            .with_state(host)
    }
}
