//! Server host holding the shared chat state
//!
//! The host is transport-agnostic: it owns the Hub and the collaborators, and
//! every exposure (today only WebSocket) reads from it.

use super::exposure::websocket::hub::Hub;
use super::exposure::websocket::session::Keepalive;
use crate::config::ChatConfig;
use crate::core::{ChatStore, IdentityResolver, PushNotifier};
use std::sync::Arc;

/// Host context shared by every connection
///
/// # Example
///
/// ```rust,ignore
/// let host = Arc::new(ServerHost::new(
///     ChatConfig::default(),
///     Arc::new(InMemoryChatStore::new()),
///     Arc::new(JwtIdentityResolver::new("secret")),
/// ));
/// let app = WebSocketExposure::build_router(host);
/// ```
pub struct ServerHost {
    /// Validated runtime configuration
    pub config: Arc<ChatConfig>,

    /// Session and room registry
    pub hub: Arc<Hub>,

    /// Message persistence
    pub store: Arc<dyn ChatStore>,

    /// Credential verification for the upgrade handshake
    pub identity: Arc<dyn IdentityResolver>,

    /// Push delivery for offline participants, when configured
    pub push: Option<Arc<dyn PushNotifier>>,
}

impl ServerHost {
    pub fn new(
        config: ChatConfig,
        store: Arc<dyn ChatStore>,
        identity: Arc<dyn IdentityResolver>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            hub: Arc::new(Hub::new()),
            store,
            identity,
            push: None,
        }
    }

    /// Attach a push notifier
    pub fn with_push_notifier(mut self, notifier: Arc<dyn PushNotifier>) -> Self {
        self.push = Some(notifier);
        self
    }

    /// Liveness timings for every Session
    pub fn keepalive(&self) -> Keepalive {
        Keepalive {
            pong_wait: self.config.pong_wait(),
            ping_period: self.config.ping_period(),
            write_wait: self.config.write_wait(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StaticIdentityResolver;
    use crate::storage::InMemoryChatStore;
    use std::time::Duration;

    #[test]
    fn test_keepalive_follows_config() {
        let config = ChatConfig {
            pong_wait_secs: 30,
            ping_period_secs: 20,
            write_wait_secs: 5,
            ..ChatConfig::default()
        };
        let host = ServerHost::new(
            config,
            Arc::new(InMemoryChatStore::new()),
            Arc::new(StaticIdentityResolver::new()),
        );

        let keepalive = host.keepalive();
        assert_eq!(keepalive.pong_wait, Duration::from_secs(30));
        assert_eq!(keepalive.ping_period, Duration::from_secs(20));
        assert_eq!(keepalive.write_wait, Duration::from_secs(5));
        assert!(host.push.is_none());
    }
}
