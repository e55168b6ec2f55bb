//! In-process store. Nothing survives a restart.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{LedgerMap, Store, SubscriptionMap};
use crate::Result;

/// Store that keeps both tables in memory.
#[derive(Default)]
pub struct MemoryStore {
    subscriptions: RwLock<SubscriptionMap>,
    ledger: RwLock<LedgerMap>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with preloaded tables.
    pub fn with_tables(subscriptions: SubscriptionMap, ledger: LedgerMap) -> Self {
        Self {
            subscriptions: RwLock::new(subscriptions),
            ledger: RwLock::new(ledger),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn load_subscriptions(&self) -> Result<SubscriptionMap> {
        Ok(self.subscriptions.read().await.clone())
    }

    async fn save_subscriptions(&self, subscriptions: &SubscriptionMap) -> Result<()> {
        *self.subscriptions.write().await = subscriptions.clone();
        Ok(())
    }

    async fn load_ledger(&self) -> Result<LedgerMap> {
        Ok(self.ledger.read().await.clone())
    }

    async fn save_ledger(&self, ledger: &LedgerMap) -> Result<()> {
        *self.ledger.write().await = ledger.clone();
        Ok(())
    }
}
