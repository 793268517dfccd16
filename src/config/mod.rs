//! Configuration loading and management

use crate::core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Signing secret used when neither the file nor `JWT_SECRET` provides one
pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

/// Runtime configuration for the chat server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Listen address for the HTTP server
    pub bind_addr: String,

    /// Route of the WebSocket upgrade endpoint
    pub ws_path: String,

    /// Capacity of each Session's outbound queue
    pub outbound_queue_capacity: usize,

    /// Idle read deadline, refreshed by any inbound frame
    pub pong_wait_secs: u64,

    /// Interval between keepalive pings; must be shorter than `pong_wait_secs`
    pub ping_period_secs: u64,

    /// Deadline for a single frame write
    pub write_wait_secs: u64,

    /// Largest accepted inbound frame, in bytes
    pub max_message_size: usize,

    /// HS256 secret for access token verification
    pub jwt_secret: String,

    /// Webhook receiving push notifications for offline participants
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_webhook_url: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            ws_path: "/ws".to_string(),
            outbound_queue_capacity: 256,
            pong_wait_secs: 60,
            ping_period_secs: 54,
            write_wait_secs: 10,
            max_message_size: 64 * 1024,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            push_webhook_url: None,
        }
    }
}

impl ChatConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    ///
    /// Missing keys fall back to their defaults. The result is validated.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `JWT_SECRET`, `CHAT_BIND_ADDR` and `PUSH_WEBHOOK_URL` from the environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(secret) = non_empty("JWT_SECRET") {
            self.jwt_secret = secret;
        }
        if let Some(addr) = non_empty("CHAT_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(url) = non_empty("PUSH_WEBHOOK_URL") {
            self.push_webhook_url = Some(url);
        }
        self
    }

    /// Check ranges and the keepalive relationship
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "outbound_queue_capacity must be greater than 0".to_string(),
            ));
        }
        if self.pong_wait_secs == 0 || self.ping_period_secs == 0 || self.write_wait_secs == 0 {
            return Err(ConfigError::Invalid(
                "pong_wait_secs, ping_period_secs and write_wait_secs must be greater than 0"
                    .to_string(),
            ));
        }
        // A ping must go out before the peer's read deadline expires
        if self.ping_period_secs >= self.pong_wait_secs {
            return Err(ConfigError::Invalid(format!(
                "ping_period_secs ({}) must be shorter than pong_wait_secs ({})",
                self.ping_period_secs, self.pong_wait_secs
            )));
        }
        if !self.ws_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "ws_path must start with '/', got '{}'",
                self.ws_path
            )));
        }
        Ok(())
    }

    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs)
    }

    pub fn ping_period(&self) -> Duration {
        Duration::from_secs(self.ping_period_secs)
    }

    pub fn write_wait(&self) -> Duration {
        Duration::from_secs(self.write_wait_secs)
    }
}
