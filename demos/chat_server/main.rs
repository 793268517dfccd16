//! Demo chat server backed by the in-memory store
//!
//! Seeds one conversation between `alice` and `bob` and prints a token for
//! each, so two `websocat` sessions can talk right away:
//!
//! ```text
//! cargo run --example chat_server
//! websocat "ws://127.0.0.1:8080/ws?token=<alice token>"
//! {"type":"join_chat","chatId":"demo"}
//! {"type":"send_message","chatId":"demo","content":"Is the drill still available?"}
//! ```
//!
//! Set `CHAT_CONFIG` to load a YAML file; `JWT_SECRET`, `CHAT_BIND_ADDR` and
//! `PUSH_WEBHOOK_URL` override it.

use chrono::Duration;
use rentchat::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rentchat=info,tower_http=info")),
        )
        .init();

    let config = match std::env::var("CHAT_CONFIG") {
        Ok(path) => ChatConfig::from_yaml_file(&path)?,
        Err(_) => ChatConfig::default(),
    }
    .with_env_overrides();

    let store = InMemoryChatStore::new();
    let mut conversation = Conversation::new(vec!["alice".to_string(), "bob".to_string()]);
    conversation.id = "demo".to_string();
    store.insert_conversation(conversation)?;

    let issuer = JwtIdentityResolver::new(&config.jwt_secret);
    for user in ["alice", "bob"] {
        let token = issuer.issue(user, Duration::hours(12))?;
        tracing::info!(user_id = user, token = %token, "Demo token");
    }

    ServerBuilder::new()
        .with_config(config)
        .with_store(store)
        .with_push_notifier(LogPushNotifier)
        .serve()
        .await
}
