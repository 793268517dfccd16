//! Typed error handling for the chat core
//!
//! Errors are grouped by how far their effect reaches:
//!
//! - [`HandshakeError`]: the connection attempt is rejected before any
//!   duplex channel exists. No Session is created.
//! - [`ConfigError`]: the server refuses to start.
//! - [`ChatError::Persistence`]: a `send_message` is aborted and never
//!   reaches peers. The connection survives.
//! - [`ChatError::Transport`]: fatal to one Session only.
//!
//! Malformed frames are not errors at all: the codec maps them to a dropped
//! outcome and the read loop keeps going.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// The main error type for the chat core
#[derive(Debug, Error)]
pub enum ChatError {
    /// Authentication failed during the upgrade handshake
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// Configuration could not be loaded or is inconsistent
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The persistence adapter failed while handling a message
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Reading from or writing to the socket failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// An outbound envelope could not be serialized
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors raised while establishing identity on the upgrade request
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandshakeError {
    /// No request identity, bearer header or `token` query parameter
    #[error("Unauthorized")]
    MissingCredential,

    /// The credential was present but could not be verified
    #[error("Invalid token: {0}")]
    InvalidCredential(String),

    /// The credential verified but carries no usable user id
    #[error("Invalid user ID")]
    InvalidUserId,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of range or inconsistent with another value
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The configuration file could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML for `ChatConfig`
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl ChatError {
    /// Wrap any persistence adapter failure
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        ChatError::Persistence(err.to_string())
    }

    /// Wrap any socket failure
    pub fn transport(err: impl std::fmt::Display) -> Self {
        ChatError::Transport(err.to_string())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ChatError::Handshake(_) => StatusCode::UNAUTHORIZED,
            ChatError::Config(_)
            | ChatError::Persistence(_)
            | ChatError::Transport(_)
            | ChatError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ChatError::Handshake(e) => e.error_code(),
            ChatError::Config(_) => "CONFIG_ERROR",
            ChatError::Persistence(_) => "PERSISTENCE_ERROR",
            ChatError::Transport(_) => "TRANSPORT_ERROR",
            ChatError::Encode(_) => "ENCODE_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
        }
    }
}

impl HandshakeError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            HandshakeError::MissingCredential => "UNAUTHORIZED",
            HandshakeError::InvalidCredential(_) => "INVALID_TOKEN",
            HandshakeError::InvalidUserId => "INVALID_USER_ID",
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

impl IntoResponse for HandshakeError {
    fn into_response(self) -> Response {
        ChatError::Handshake(self).into_response()
    }
}
