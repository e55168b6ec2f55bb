//! Subscription commands.
//!
//! This is the layer the HTTP command API calls. It validates
//! input against the catalog before anything reaches the registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::catalog::{Catalog, FeedSource};
use crate::store::ChannelId;
use crate::subscription::registry::{AddOutcome, SubscriptionRegistry};
use crate::{NewswireError, Result};

/// Service for subscription commands.
#[derive(Clone)]
pub struct SubscriptionService {
    registry: Arc<SubscriptionRegistry>,
}

impl SubscriptionService {
    /// Create a new service over the registry.
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self { registry }
    }

    /// The fixed catalog.
    pub fn catalog(&self) -> &Catalog {
        self.registry.catalog()
    }

    /// Subscribe a channel to a catalog source given by name or URL.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The channel id is blank
    /// - The source is not in the catalog
    /// - The channel is already subscribed to the source
    /// - The store write fails (nothing is changed in that case)
    pub async fn subscribe(&self, channel: &str, source: &str) -> Result<FeedSource> {
        let channel = validate_channel(channel)?;
        let source = self
            .catalog()
            .resolve(source)
            .cloned()
            .ok_or_else(|| NewswireError::Validation(format!("unknown feed source: {}", source.trim())))?;

        match self.registry.add(channel, &source.locator).await? {
            AddOutcome::Added => {
                info!(channel = %channel, source = %source.name, "Channel subscribed");
                Ok(source)
            }
            AddOutcome::AlreadyExists => Err(NewswireError::AlreadyExists(format!(
                "subscription to {}",
                source.name
            ))),
        }
    }

    /// Unsubscribe a channel from the given sources (names or URLs).
    ///
    /// Keys that are not in the catalog are treated as raw locators, so
    /// sources that left the catalog can still be removed. Returns the
    /// number of subscriptions removed.
    pub async fn unsubscribe(&self, channel: &str, sources: &[String]) -> Result<usize> {
        let channel = validate_channel(channel)?;
        let locators: Vec<String> = sources
            .iter()
            .map(|key| {
                self.catalog()
                    .resolve(key)
                    .map(|s| s.locator.clone())
                    .unwrap_or_else(|| key.trim().to_string())
            })
            .collect();

        let removed = self.registry.remove(channel, &locators).await?;
        if removed > 0 {
            info!(channel = %channel, removed, "Channel unsubscribed");
        }
        Ok(removed)
    }

    /// Sources a channel is subscribed to, in subscription order.
    pub async fn list(&self, channel: &str) -> Result<Vec<FeedSource>> {
        let channel = validate_channel(channel)?;
        Ok(self.registry.list(channel).await)
    }

    /// Subscription count per channel.
    pub async fn status(&self) -> BTreeMap<ChannelId, usize> {
        self.registry.subscription_counts().await
    }
}

fn validate_channel(channel: &str) -> Result<&str> {
    let channel = channel.trim();
    if channel.is_empty() {
        return Err(NewswireError::Validation(
            "channel id must not be empty".to_string(),
        ));
    }
    Ok(channel)
}
