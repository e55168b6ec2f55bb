//! Durable storage for subscriptions and the sent-item ledger.
//!
//! Every backend persists two tables keyed by channel id:
//! - subscriptions: channel id -> ordered feed locators
//! - ledger: channel id -> delivered item ids (oldest first)
//!
//! Each save call replaces the whole table and is atomic: a later load
//! observes either the previous contents or the new ones, never a mix.

mod json;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use json::JsonFileStore;
pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{StorageBackend, StorageConfig};
use crate::Result;

/// Opaque chat channel identifier.
pub type ChannelId = String;

/// Persisted subscriptions table.
pub type SubscriptionMap = BTreeMap<ChannelId, Vec<String>>;

/// Persisted ledger table. Item ids are ordered oldest first.
pub type LedgerMap = BTreeMap<ChannelId, Vec<String>>;

/// Storage backend for subscriptions and the ledger.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Load the subscriptions table. A fresh store yields an empty map.
    async fn load_subscriptions(&self) -> Result<SubscriptionMap>;

    /// Replace the subscriptions table.
    async fn save_subscriptions(&self, subscriptions: &SubscriptionMap) -> Result<()>;

    /// Load the ledger table. A fresh store yields an empty map.
    async fn load_ledger(&self) -> Result<LedgerMap>;

    /// Replace the ledger table.
    async fn save_ledger(&self, ledger: &LedgerMap) -> Result<()>;
}

/// Open the backend selected in the storage configuration.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn Store>> {
    match config.backend {
        StorageBackend::Json => Ok(Arc::new(JsonFileStore::open(&config.data_dir).await?)),
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "sqlite")]
        StorageBackend::Sqlite => Ok(Arc::new(SqliteStore::open(&config.sqlite_path).await?)),
        #[cfg(not(feature = "sqlite"))]
        StorageBackend::Sqlite => Err(crate::NewswireError::Config(
            "sqlite backend requires the `sqlite` feature".to_string(),
        )),
    }
}
