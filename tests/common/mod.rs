//! Test helpers for integration tests.
//!
//! Scripted fetchers, recording sinks and a store whose writes can be made
//! to fail, plus builders wiring them into a scheduler.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use newswire::config::{CatalogEntry, Config, SchedulerConfig};
use newswire::store::{LedgerMap, SubscriptionMap};
use newswire::{
    Catalog, DedupLedger, DeliverySink, FeedFetcher, FeedItem, FeedSource, MemoryStore,
    NewswireError, PollScheduler, Result, SchedulerState, Store, SubscriptionRegistry,
};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub const S1: &str = "https://one.example.com/rss";
pub const S2: &str = "https://two.example.com/rss";
pub const S3: &str = "https://three.example.com/rss";

/// Catalog with the three test sources.
pub fn test_catalog() -> Arc<Catalog> {
    Arc::new(Catalog::new(vec![
        FeedSource::new("One", S1),
        FeedSource::new("Two", S2),
        FeedSource::new("Three", S3),
    ]))
}

/// Configuration using the test catalog and a quiet web server.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.catalog = vec![
        CatalogEntry {
            name: "One".to_string(),
            url: S1.to_string(),
        },
        CatalogEntry {
            name: "Two".to_string(),
            url: S2.to_string(),
        },
        CatalogEntry {
            name: "Three".to_string(),
            url: S3.to_string(),
        },
    ];
    config.web.host = "127.0.0.1".to_string();
    config.web.port = 0;
    config.scheduler.run_on_startup = false;
    config
}

/// Item `u{n}` whose id is its link.
pub fn item(n: usize) -> FeedItem {
    FeedItem::from_link(format!("https://example.com/u{n}"), format!("Item {n}"))
}

/// Ids of items `u{n}` for the given numbers.
pub fn ids(ns: &[usize]) -> Vec<String> {
    ns.iter().map(|n| item(*n).id).collect()
}

/// Build a subscriptions table from `(channel, locators)` pairs.
pub fn subscriptions(entries: &[(&str, &[&str])]) -> SubscriptionMap {
    entries
        .iter()
        .map(|(channel, locators)| {
            (
                channel.to_string(),
                locators.iter().map(|l| l.to_string()).collect(),
            )
        })
        .collect()
}

// ============================================================================
// Fetchers
// ============================================================================

#[derive(Clone)]
enum Script {
    Items(Vec<FeedItem>),
    Fail,
    Panic,
}

/// Fetcher returning preset results per locator. Unknown locators fail.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_items(&self, locator: &str, items: Vec<FeedItem>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(locator.to_string(), Script::Items(items));
    }

    pub fn set_failing(&self, locator: &str) {
        self.scripts
            .lock()
            .unwrap()
            .insert(locator.to_string(), Script::Fail);
    }

    pub fn set_panicking(&self, locator: &str) {
        self.scripts
            .lock()
            .unwrap()
            .insert(locator.to_string(), Script::Panic);
    }

    /// Locators fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedFetcher for ScriptedFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<FeedItem>> {
        self.calls.lock().unwrap().push(locator.to_string());
        let script = self.scripts.lock().unwrap().get(locator).cloned();
        match script {
            Some(Script::Items(items)) => Ok(items),
            Some(Script::Panic) => panic!("fetcher blew up on {locator}"),
            Some(Script::Fail) | None => Err(NewswireError::Fetch(format!("no feed at {locator}"))),
        }
    }
}

/// Fetcher that blocks until released, to hold a cycle open.
#[derive(Default)]
pub struct BlockingFetcher {
    pub entered: Notify,
    pub release: Notify,
    items: Vec<FeedItem>,
}

impl BlockingFetcher {
    pub fn new(items: Vec<FeedItem>) -> Arc<Self> {
        Arc::new(Self {
            items,
            ..Default::default()
        })
    }
}

#[async_trait]
impl FeedFetcher for BlockingFetcher {
    async fn fetch(&self, _locator: &str) -> Result<Vec<FeedItem>> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.items.clone())
    }
}

/// Fetcher that records the peak number of concurrent fetches.
pub struct CountingFetcher {
    active: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
}

impl CountingFetcher {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedFetcher for CountingFetcher {
    async fn fetch(&self, _locator: &str) -> Result<Vec<FeedItem>> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![item(1)])
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Sink recording every confirmed delivery.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(String, String)>>,
    failing_items: Mutex<HashSet<String>>,
    unreachable: Mutex<HashSet<String>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make sends of this item id fail until cleared.
    pub fn fail_item(&self, item_id: &str) {
        self.failing_items
            .lock()
            .unwrap()
            .insert(item_id.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing_items.lock().unwrap().clear();
    }

    pub fn set_unreachable(&self, channel: &str) {
        self.unreachable
            .lock()
            .unwrap()
            .insert(channel.to_string());
    }

    /// Every delivery so far as `(channel, item id)`.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Item ids delivered to one channel, in delivery order.
    pub fn sent_to(&self, channel: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, id)| id.clone())
            .collect()
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn is_reachable(&self, channel: &str) -> bool {
        !self.unreachable.lock().unwrap().contains(channel)
    }

    async fn send(&self, channel: &str, item: &FeedItem) -> Result<()> {
        if self.failing_items.lock().unwrap().contains(&item.id) {
            return Err(NewswireError::Delivery(format!("rejected {}", item.id)));
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel.to_string(), item.id.clone()));
        Ok(())
    }
}

// ============================================================================
// Store
// ============================================================================

/// In-memory store whose saves can be switched to fail.
pub struct FlakyStore {
    inner: MemoryStore,
    fail_saves: AtomicBool,
}

impl FlakyStore {
    pub fn new(subscriptions: SubscriptionMap) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::with_tables(subscriptions, LedgerMap::new()),
            fail_saves: AtomicBool::new(false),
        })
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(NewswireError::Storage("disk unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FlakyStore {
    fn backend_name(&self) -> &'static str {
        "flaky"
    }

    async fn load_subscriptions(&self) -> Result<SubscriptionMap> {
        self.inner.load_subscriptions().await
    }

    async fn save_subscriptions(&self, subscriptions: &SubscriptionMap) -> Result<()> {
        self.check()?;
        self.inner.save_subscriptions(subscriptions).await
    }

    async fn load_ledger(&self) -> Result<LedgerMap> {
        self.inner.load_ledger().await
    }

    async fn save_ledger(&self, ledger: &LedgerMap) -> Result<()> {
        self.check()?;
        self.inner.save_ledger(ledger).await
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Scheduler plus the components it drives.
pub struct Harness {
    pub registry: Arc<SubscriptionRegistry>,
    pub ledger: Arc<DedupLedger>,
    pub scheduler: Arc<PollScheduler>,
}

/// Load a registry and ledger from `store` and wire a scheduler around them.
pub async fn harness(
    store: Arc<dyn Store>,
    fetcher: Arc<dyn FeedFetcher>,
    sink: Arc<dyn DeliverySink>,
    max_concurrent_channels: usize,
) -> Harness {
    capped_harness(store, fetcher, sink, max_concurrent_channels, None).await
}

/// Like [`harness`], with the ledger keeping at most `ledger_cap` ids per channel.
pub async fn capped_harness(
    store: Arc<dyn Store>,
    fetcher: Arc<dyn FeedFetcher>,
    sink: Arc<dyn DeliverySink>,
    max_concurrent_channels: usize,
    ledger_cap: Option<usize>,
) -> Harness {
    let registry = Arc::new(
        SubscriptionRegistry::load(test_catalog(), store.clone())
            .await
            .expect("Failed to load registry"),
    );
    let ledger = Arc::new(
        DedupLedger::load(store, ledger_cap)
            .await
            .expect("Failed to load ledger"),
    );
    let config = SchedulerConfig {
        poll_interval_secs: 3600,
        max_concurrent_channels,
        run_on_startup: false,
    };
    let scheduler = Arc::new(PollScheduler::new(
        registry.clone(),
        ledger.clone(),
        fetcher,
        sink,
        &config,
    ));
    Harness {
        registry,
        ledger,
        scheduler,
    }
}

/// Wait until the scheduler reports the given state.
pub async fn wait_for_state(scheduler: &PollScheduler, state: SchedulerState) {
    tokio::time::timeout(DEFAULT_TIMEOUT, async {
        while scheduler.state() != state {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Timed out waiting for scheduler state");
}

/// Count per channel, for comparing against `/status`.
pub fn counts(entries: &[(&str, usize)]) -> BTreeMap<String, usize> {
    entries.iter().map(|(c, n)| (c.to_string(), *n)).collect()
}
