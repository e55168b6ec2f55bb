//! Delivery of feed items to channels.

pub mod log;
pub mod webhook;

pub use log::LogSink;
pub use webhook::WebhookSink;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{DeliveryConfig, DeliveryKind};
use crate::feed::FeedItem;
use crate::Result;

/// Maximum characters in one delivered message.
pub const MAX_MESSAGE_CHARS: usize = 2000;

const PREFIX: &str = "📰 **";
const SUFFIX: &str = "**\n";

/// Destination for delivered items.
///
/// `send` returns `Ok(())` only when the transport confirmed the message;
/// any error means the item was not delivered.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Whether the channel can currently receive messages.
    async fn is_reachable(&self, channel: &str) -> bool;

    /// Deliver one item to a channel.
    async fn send(&self, channel: &str, item: &FeedItem) -> Result<()>;
}

/// Build the sink selected by configuration.
pub fn build_sink(config: &DeliveryConfig) -> Result<Arc<dyn DeliverySink>> {
    Ok(match config.kind {
        DeliveryKind::Webhook => Arc::new(WebhookSink::new(config)?),
        DeliveryKind::Log => Arc::new(LogSink::new()),
    })
}

/// Render an item as message text.
///
/// Long titles are cut to fit [`MAX_MESSAGE_CHARS`]; the link is kept whole.
pub fn format_message(item: &FeedItem) -> String {
    let fixed = PREFIX.chars().count() + SUFFIX.chars().count() + item.link.chars().count();
    let budget = MAX_MESSAGE_CHARS.saturating_sub(fixed);

    let title = if item.title.chars().count() > budget {
        let mut cut: String = item.title.chars().take(budget.saturating_sub(1)).collect();
        cut.push('…');
        cut
    } else {
        item.title.clone()
    };

    format!("{PREFIX}{title}{SUFFIX}{}", item.link)
}
