//! HTTP webhook push delivery
//!
//! Each notification is POSTed as JSON to a single endpoint, which is expected
//! to fan it out to the recipient's registered devices.

use crate::core::push::{PushNotification, PushNotifier};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::time::Duration;

/// Per-request timeout for the webhook call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Push notifier that POSTs notifications to a webhook
#[derive(Debug, Clone)]
pub struct WebhookPushNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookPushNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PushNotifier for WebhookPushNotifier {
    async fn notify(&self, notification: PushNotification) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&notification)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!(
                "Push webhook returned {} for recipient {}",
                status,
                notification.recipient_id
            ));
        }
        Ok(())
    }
}
