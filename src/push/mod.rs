//! Push notifier implementations

#[cfg(feature = "push")]
pub mod webhook;

#[cfg(feature = "push")]
pub use webhook::WebhookPushNotifier;

use crate::core::push::{PushNotification, PushNotifier};
use anyhow::Result;
use async_trait::async_trait;

/// Notifier that only logs (for development)
#[derive(Debug, Clone, Default)]
pub struct LogPushNotifier;

#[async_trait]
impl PushNotifier for LogPushNotifier {
    async fn notify(&self, notification: PushNotification) -> Result<()> {
        tracing::info!(
            recipient_id = %notification.recipient_id,
            title = %notification.title,
            "Push notification"
        );
        Ok(())
    }
}
