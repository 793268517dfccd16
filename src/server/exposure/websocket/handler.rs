//! Connection gateway: authenticate, upgrade, register
//!
//! Identity is resolved before the upgrade is attempted, so an unauthenticated
//! request gets a plain `401` and never becomes a Session. Credentials are
//! looked up in this order:
//!
//! 1. An [`AuthenticatedUser`] extension set by an upstream auth layer
//! 2. `Authorization: Bearer <token>`
//! 3. The `token` query parameter (browsers cannot set headers on upgrades)

use super::dispatch::SessionContext;
use super::session::{self, Session, SessionLifecycle, SessionState};
use crate::core::auth::{AuthenticatedUser, bearer_token};
use crate::core::error::HandshakeError;
use crate::core::message::UserId;
use crate::server::host::ServerHost;
use axum::extract::ws::WebSocket;
use axum::extract::{FromRequestParts, Query, Request, State, WebSocketUpgrade};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;

/// Query parameters accepted on the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeParams {
    pub token: Option<String>,
}

/// Upgrade handler for the chat endpoint
pub async fn ws_handler(State(host): State<Arc<ServerHost>>, request: Request) -> Response {
    let mut lifecycle = SessionLifecycle::new();
    let (mut parts, _body) = request.into_parts();

    let user_id = match resolve_identity(&parts, &host).await {
        Ok(user_id) => user_id,
        Err(e) => {
            lifecycle.transition(SessionState::Rejected);
            tracing::debug!(error = %e, "Rejected WebSocket handshake");
            return e.into_response();
        }
    };
    lifecycle.transition(SessionState::Authenticated);

    let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &host).await {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let failed_user = user_id.clone();
    ws.max_message_size(host.config.max_message_size)
        .on_failed_upgrade(move |e: axum::Error| {
            tracing::warn!(user_id = %failed_user, error = %e, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| accept(socket, host, user_id, lifecycle))
}

/// Establish the user id for an upgrade request
pub async fn resolve_identity(parts: &Parts, host: &ServerHost) -> Result<UserId, HandshakeError> {
    if let Some(AuthenticatedUser(user_id)) = parts.extensions.get::<AuthenticatedUser>() {
        return Ok(user_id.clone());
    }

    let credential = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string)
        .or_else(|| {
            Query::<HandshakeParams>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(params)| params.token)
                .filter(|token| !token.is_empty())
        })
        .ok_or(HandshakeError::MissingCredential)?;

    host.identity.resolve(&credential).await
}

/// Register the upgraded connection and drive it until it closes
async fn accept(
    socket: WebSocket,
    host: Arc<ServerHost>,
    user_id: UserId,
    mut lifecycle: SessionLifecycle,
) {
    let (session, queue) = Session::new(user_id.clone(), host.config.outbound_queue_capacity);
    let ctx = SessionContext {
        session_id: session.id().to_string(),
        user_id,
    };

    if !host.hub.register(session).await {
        tracing::error!(session_id = %ctx.session_id, "Session id already registered");
        lifecycle.transition(SessionState::Closed);
        return;
    }
    lifecycle.transition(SessionState::Active);
    tracing::info!(session_id = %ctx.session_id, user_id = %ctx.user_id, "WebSocket client connected");

    session::run(socket, host, ctx, queue, lifecycle).await;
}
