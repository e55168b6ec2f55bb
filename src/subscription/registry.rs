//! In-memory subscription registry backed by the store.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::catalog::{Catalog, FeedSource};
use crate::store::{ChannelId, Store, SubscriptionMap};
use crate::Result;

/// Result of adding a source to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The source was appended and persisted.
    Added,
    /// The channel already had the source; nothing changed.
    AlreadyExists,
}

/// Channel -> ordered feed locators.
///
/// All access goes through one async lock. Mutations write the full table
/// to the store while still holding the lock, and are reverted in memory
/// if that write fails.
pub struct SubscriptionRegistry {
    catalog: Arc<Catalog>,
    store: Arc<dyn Store>,
    subscriptions: Mutex<SubscriptionMap>,
}

impl SubscriptionRegistry {
    /// Create a registry with initial contents.
    ///
    /// Duplicate locators within a channel are collapsed, keeping the first.
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn Store>, initial: SubscriptionMap) -> Self {
        let subscriptions = initial
            .into_iter()
            .map(|(channel, locators)| {
                let mut seen = HashSet::new();
                let unique: Vec<String> = locators
                    .into_iter()
                    .filter(|l| seen.insert(l.clone()))
                    .collect();
                (channel, unique)
            })
            .collect();

        Self {
            catalog,
            store,
            subscriptions: Mutex::new(subscriptions),
        }
    }

    /// Load the registry from the store.
    pub async fn load(catalog: Arc<Catalog>, store: Arc<dyn Store>) -> Result<Self> {
        let initial = store.load_subscriptions().await?;
        for (channel, locators) in &initial {
            for locator in locators.iter().filter(|l| !catalog.contains(l)) {
                warn!(channel = %channel, source = %locator, "Subscribed source is not in the catalog");
            }
        }
        Ok(Self::new(catalog, store, initial))
    }

    /// The catalog used for display names.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Subscribe a channel to a locator.
    pub async fn add(&self, channel: &str, locator: &str) -> Result<AddOutcome> {
        let mut subs = self.subscriptions.lock().await;

        let existed = subs.contains_key(channel);
        let locators = subs.entry(channel.to_string()).or_default();
        if locators.iter().any(|l| l == locator) {
            return Ok(AddOutcome::AlreadyExists);
        }
        locators.push(locator.to_string());

        if let Err(e) = self.store.save_subscriptions(&subs).await {
            if let Some(locators) = subs.get_mut(channel) {
                locators.pop();
                if !existed && locators.is_empty() {
                    subs.remove(channel);
                }
            }
            return Err(e);
        }

        debug!(channel = %channel, source = %locator, "Subscription added");
        Ok(AddOutcome::Added)
    }

    /// Remove every given locator from a channel. Returns how many were removed.
    pub async fn remove<I, S>(&self, channel: &str, locators: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets: HashSet<String> = locators
            .into_iter()
            .map(|l| l.as_ref().to_string())
            .collect();

        let mut subs = self.subscriptions.lock().await;
        let Some(current) = subs.get(channel) else {
            return Ok(0);
        };

        let before = current.clone();
        let kept: Vec<String> = before
            .iter()
            .filter(|l| !targets.contains(*l))
            .cloned()
            .collect();
        let removed = before.len() - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        if kept.is_empty() {
            subs.remove(channel);
        } else {
            subs.insert(channel.to_string(), kept);
        }

        if let Err(e) = self.store.save_subscriptions(&subs).await {
            subs.insert(channel.to_string(), before);
            return Err(e);
        }

        debug!(channel = %channel, removed, "Subscriptions removed");
        Ok(removed)
    }

    /// Sources for a channel in subscription order. Unknown channels yield nothing.
    pub async fn list(&self, channel: &str) -> Vec<FeedSource> {
        self.locators(channel)
            .await
            .iter()
            .map(|l| self.catalog.source_for(l))
            .collect()
    }

    /// Raw locators for a channel in subscription order.
    pub async fn locators(&self, channel: &str) -> Vec<String> {
        self.subscriptions
            .lock()
            .await
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of channels that have at least one subscription.
    pub async fn all_channels(&self) -> Vec<ChannelId> {
        self.subscriptions
            .lock()
            .await
            .iter()
            .filter(|(_, locators)| !locators.is_empty())
            .map(|(channel, _)| channel.clone())
            .collect()
    }

    /// Subscription count per non-empty channel.
    pub async fn subscription_counts(&self) -> BTreeMap<ChannelId, usize> {
        self.subscriptions
            .lock()
            .await
            .iter()
            .filter(|(_, locators)| !locators.is_empty())
            .map(|(channel, locators)| (channel.clone(), locators.len()))
            .collect()
    }

    /// Write the current table to the store.
    pub async fn checkpoint(&self) -> Result<()> {
        let subs = self.subscriptions.lock().await;
        self.store.save_subscriptions(&subs).await
    }
}
