//! Chat webhook delivery.
//!
//! Each channel maps to one incoming-webhook URL. Messages are posted as
//! `{"content": "..."}`, the body accepted by Discord-style webhooks.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{format_message, DeliverySink};
use crate::config::DeliveryConfig;
use crate::feed::FeedItem;
use crate::{NewswireError, Result};

#[derive(Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
}

/// Posts messages to per-channel webhooks.
pub struct WebhookSink {
    client: Client,
    webhooks: BTreeMap<String, String>,
}

impl WebhookSink {
    /// Create a sink from configuration.
    pub fn new(config: &DeliveryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NewswireError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            webhooks: config.webhooks.clone(),
        })
    }

    fn webhook_for(&self, channel: &str) -> Option<&str> {
        self.webhooks.get(channel).map(String::as_str)
    }
}

#[async_trait]
impl DeliverySink for WebhookSink {
    async fn is_reachable(&self, channel: &str) -> bool {
        self.webhook_for(channel).is_some()
    }

    async fn send(&self, channel: &str, item: &FeedItem) -> Result<()> {
        let url = self
            .webhook_for(channel)
            .ok_or_else(|| NewswireError::Delivery(format!("channel {} has no webhook", channel)))?;

        let content = format_message(item);
        let response = self
            .client
            .post(url)
            .json(&WebhookMessage { content: &content })
            .send()
            .await
            .map_err(|e| NewswireError::Delivery(format!("webhook request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewswireError::Delivery(format!(
                "webhook for {} returned {}",
                channel, status
            )));
        }

        debug!(channel = %channel, item = %item.id, "Delivered via webhook");
        Ok(())
    }
}
