//! Identity resolution for the upgrade handshake
//!
//! The gateway is the only place a user identity is established. It accepts
//! either an identity already attached to the request by an upstream auth
//! layer ([`AuthenticatedUser`]) or a bearer credential it hands to an
//! [`IdentityResolver`].

use crate::core::error::HandshakeError;
use crate::core::message::UserId;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identity attached to a request by an upstream authentication layer
///
/// Insert it as a request extension; the gateway then skips credential
/// resolution entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

/// Resolves a bearer credential to a verified user identity
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, credential: &str) -> Result<UserId, HandshakeError>;
}

/// JWT claims carried by marketplace access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
}

/// HS256 JWT verification with a shared secret
pub struct JwtIdentityResolver {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
}

impl JwtIdentityResolver {
    /// Create a resolver for tokens signed with `secret`
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Sign a token for `user_id` valid for `ttl`
    ///
    /// Token issuance belongs to the account service; this exists for tests
    /// and the demo server.
    pub fn issue(&self, user_id: &str, ttl: Duration) -> anyhow::Result<String> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user_id.to_string(),
            email: None,
            exp: (now + ttl).timestamp().max(0) as u64,
            iat: Some(now.timestamp().max(0) as u64),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, credential: &str) -> Result<UserId, HandshakeError> {
        let data = decode::<Claims>(credential, &self.decoding_key, &self.validation)
            .map_err(|e| HandshakeError::InvalidCredential(e.to_string()))?;

        let user_id = data.claims.user_id.trim();
        if user_id.is_empty() {
            return Err(HandshakeError::InvalidUserId);
        }
        Ok(user_id.to_string())
    }
}

/// Fixed token table (for development and tests)
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityResolver {
    tokens: HashMap<String, UserId>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as proof of `user_id`
    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<UserId>) -> Self {
        self.tokens.insert(token.into(), user_id.into());
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, credential: &str) -> Result<UserId, HandshakeError> {
        self.tokens
            .get(credential)
            .cloned()
            .ok_or_else(|| HandshakeError::InvalidCredential("unknown token".to_string()))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.split_once(' ')?;
    if scheme != "Bearer" {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
