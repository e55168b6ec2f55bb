//! Dedup ledger: which item ids were already delivered to which channel.
//!
//! Marking an id as seen only touches memory. The scheduler persists the
//! whole ledger at its per-channel checkpoints via [`DedupLedger::checkpoint`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::store::{ChannelId, LedgerMap, Store};
use crate::Result;

/// Delivered ids for one channel, remembering insertion order for the cap.
#[derive(Debug, Default)]
struct DeliveryRecord {
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl DeliveryRecord {
    fn insert(&mut self, item_id: &str, cap: Option<usize>) -> bool {
        if !self.seen.insert(item_id.to_string()) {
            return false;
        }
        self.order.push_back(item_id.to_string());
        if let Some(cap) = cap {
            while self.order.len() > cap {
                if let Some(oldest) = self.order.pop_front() {
                    self.seen.remove(&oldest);
                }
            }
        }
        true
    }
}

/// Per-channel set of delivered item ids.
pub struct DedupLedger {
    store: Arc<dyn Store>,
    records: RwLock<HashMap<ChannelId, DeliveryRecord>>,
    cap: Option<usize>,
    persist_lock: Mutex<()>,
}

impl DedupLedger {
    /// Create a ledger from a snapshot.
    ///
    /// `cap` keeps only the N most recently marked ids per channel; `None`
    /// never forgets an id.
    pub fn new(store: Arc<dyn Store>, snapshot: LedgerMap, cap: Option<usize>) -> Self {
        let mut records = HashMap::new();
        for (channel, ids) in snapshot {
            let mut record = DeliveryRecord::default();
            for id in &ids {
                record.insert(id, cap);
            }
            records.insert(channel, record);
        }

        Self {
            store,
            records: RwLock::new(records),
            cap,
            persist_lock: Mutex::new(()),
        }
    }

    /// Load the ledger from the store.
    pub async fn load(store: Arc<dyn Store>, cap: Option<usize>) -> Result<Self> {
        let snapshot = store.load_ledger().await?;
        Ok(Self::new(store, snapshot, cap))
    }

    /// Whether the item was already delivered to the channel.
    pub async fn has_seen(&self, channel: &str, item_id: &str) -> bool {
        self.records
            .read()
            .await
            .get(channel)
            .is_some_and(|r| r.seen.contains(item_id))
    }

    /// Record the item as delivered. Returns false if it was already recorded.
    pub async fn mark_seen(&self, channel: &str, item_id: &str) -> bool {
        self.records
            .write()
            .await
            .entry(channel.to_string())
            .or_default()
            .insert(item_id, self.cap)
    }

    /// Number of ids recorded for a channel.
    pub async fn seen_count(&self, channel: &str) -> usize {
        self.records
            .read()
            .await
            .get(channel)
            .map_or(0, |r| r.order.len())
    }

    /// Serializable copy of the ledger, ids ordered oldest first.
    pub async fn snapshot(&self) -> LedgerMap {
        self.records
            .read()
            .await
            .iter()
            .map(|(channel, record)| (channel.clone(), record.order.iter().cloned().collect()))
            .collect()
    }

    /// Write the current ledger to the store.
    ///
    /// Concurrent checkpoints are serialized and each takes its snapshot
    /// after acquiring the lock, so the last write always carries every mark
    /// made before it started.
    pub async fn checkpoint(&self) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.snapshot().await;
        self.store.save_ledger(&snapshot).await
    }
}
