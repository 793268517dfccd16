//! ServerBuilder for fluent API to build the chat server

use super::exposure::WebSocketExposure;
use super::host::ServerHost;
use crate::config::ChatConfig;
use crate::core::{ChatError, ChatStore, IdentityResolver, JwtIdentityResolver, PushNotifier};
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builder for the chat server
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_config(ChatConfig::default().with_env_overrides())
///     .with_store(InMemoryChatStore::new())
///     .build()?;
/// ```
pub struct ServerBuilder {
    config: ChatConfig,
    store: Option<Arc<dyn ChatStore>>,
    identity: Option<Arc<dyn IdentityResolver>>,
    push: Option<Arc<dyn PushNotifier>>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder with default configuration
    pub fn new() -> Self {
        Self {
            config: ChatConfig::default(),
            store: None,
            identity: None,
            push: None,
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: ChatConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the chat store (required)
    pub fn with_store(mut self, store: impl ChatStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Set a shared chat store (required)
    pub fn with_shared_store(mut self, store: Arc<dyn ChatStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Override credential verification
    ///
    /// Defaults to HS256 JWT verification with `config.jwt_secret`.
    pub fn with_identity_resolver(mut self, resolver: impl IdentityResolver + 'static) -> Self {
        self.identity = Some(Arc::new(resolver));
        self
    }

    /// Set the push notifier for offline participants
    ///
    /// Without one, the `push` feature falls back to a webhook when
    /// `config.push_webhook_url` is set; otherwise pushes are disabled.
    pub fn with_push_notifier(mut self, notifier: impl PushNotifier + 'static) -> Self {
        self.push = Some(Arc::new(notifier));
        self
    }

    /// Build the transport-agnostic host
    ///
    /// Validates the configuration and fills in default collaborators.
    pub fn build_host(mut self) -> Result<ServerHost> {
        self.config.validate().map_err(ChatError::from)?;

        let store = self
            .store
            .take()
            .ok_or_else(|| anyhow::anyhow!("ChatStore is required. Call .with_store()"))?;

        let identity = self.identity.take().unwrap_or_else(|| {
            Arc::new(JwtIdentityResolver::new(&self.config.jwt_secret)) as Arc<dyn IdentityResolver>
        });

        let push = match self.push.take() {
            Some(push) => Some(push),
            None => default_push_notifier(&self.config)?,
        };

        let mut host = ServerHost::new(self.config, store, identity);
        if let Some(push) = push {
            host = host.with_push_notifier(push);
        }
        Ok(host)
    }

    /// Build the final router
    ///
    /// Mounts the WebSocket endpoint with request tracing and permissive CORS.
    pub fn build(self) -> Result<Router> {
        let host = Arc::new(self.build_host()?);
        Ok(router_for(host))
    }

    /// Serve the application with graceful shutdown
    ///
    /// Binds to `config.bind_addr` and handles SIGTERM and SIGINT (Ctrl+C).
    pub async fn serve(self) -> Result<()> {
        let host = Arc::new(self.build_host()?);
        let addr = host.config.bind_addr.clone();
        let app = router_for(host);
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!("Chat server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn router_for(host: Arc<ServerHost>) -> Router {
    WebSocketExposure::build_router(host).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

#[cfg(feature = "push")]
fn default_push_notifier(config: &ChatConfig) -> Result<Option<Arc<dyn PushNotifier>>> {
    use crate::push::WebhookPushNotifier;

    match &config.push_webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Push notifications enabled");
            Ok(Some(Arc::new(WebhookPushNotifier::new(url.clone())?)))
        }
        None => Ok(None),
    }
}

#[cfg(not(feature = "push"))]
fn default_push_notifier(config: &ChatConfig) -> Result<Option<Arc<dyn PushNotifier>>> {
    if config.push_webhook_url.is_some() {
        tracing::warn!("push_webhook_url is set but the `push` feature is disabled");
    }
    Ok(None)
}

/// Wait for a shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
