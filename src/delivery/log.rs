//! Sink that writes deliveries to the log.

use async_trait::async_trait;
use tracing::info;

use super::{format_message, DeliverySink};
use crate::feed::FeedItem;
use crate::Result;

/// Logs every message instead of sending it. All channels are reachable.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DeliverySink for LogSink {
    async fn is_reachable(&self, _channel: &str) -> bool {
        true
    }

    async fn send(&self, channel: &str, item: &FeedItem) -> Result<()> {
        info!(channel = %channel, item = %item.id, message = %format_message(item), "Delivered");
        Ok(())
    }
}
