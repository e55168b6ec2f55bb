//! Poll scheduler.
//!
//! A single recurring task runs poll cycles. Each cycle walks every
//! subscribed channel, fetches its sources, delivers unseen items, and
//! checkpoints the registry and ledger once the channel is done.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex, OwnedMutexGuard, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::delivery::DeliverySink;
use crate::feed::{FeedFetcher, ITEMS_PER_FETCH};
use crate::ledger::DedupLedger;
use crate::store::ChannelId;
use crate::subscription::SubscriptionRegistry;

/// Lifecycle of the scheduler. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Outcome of processing one channel in a cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub channel: ChannelId,
    /// False when the channel was skipped as unreachable.
    pub reachable: bool,
    pub sources_polled: usize,
    pub fetch_failures: usize,
    pub delivered: usize,
    pub delivery_failures: usize,
    /// Whether both the registry and the ledger were written afterwards.
    pub checkpointed: bool,
}

impl ChannelReport {
    fn new(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            reachable: true,
            sources_polled: 0,
            fetch_failures: 0,
            delivered: 0,
            delivery_failures: 0,
            checkpointed: false,
        }
    }
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub channels: Vec<ChannelReport>,
    /// Channels whose task aborted unexpectedly.
    pub failed_channels: Vec<ChannelId>,
}

impl CycleReport {
    /// Items delivered across all channels.
    pub fn delivered(&self) -> usize {
        self.channels.iter().map(|c| c.delivered).sum()
    }

    /// Report for one channel, if it was processed.
    pub fn channel(&self, channel: &str) -> Option<&ChannelReport> {
        self.channels.iter().find(|c| c.channel == channel)
    }
}

/// Drives poll cycles on a fixed period.
///
/// Cycles never overlap: a tick or manual trigger that arrives while a
/// cycle runs is dropped, not queued.
pub struct PollScheduler {
    registry: Arc<SubscriptionRegistry>,
    ledger: Arc<DedupLedger>,
    fetcher: Arc<dyn FeedFetcher>,
    sink: Arc<dyn DeliverySink>,
    period: Duration,
    max_concurrent: usize,
    run_on_startup: bool,
    cycle_slot: Arc<Mutex<()>>,
    state: watch::Sender<SchedulerState>,
    last_report: RwLock<Option<CycleReport>>,
}

impl PollScheduler {
    /// Create a scheduler in the `Idle` state.
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        ledger: Arc<DedupLedger>,
        fetcher: Arc<dyn FeedFetcher>,
        sink: Arc<dyn DeliverySink>,
        config: &SchedulerConfig,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            registry,
            ledger,
            fetcher,
            sink,
            period: Duration::from_secs(config.poll_interval_secs),
            max_concurrent: config.max_concurrent_channels.max(1),
            run_on_startup: config.run_on_startup,
            cycle_slot: Arc::new(Mutex::new(())),
            state,
            last_report: RwLock::new(None),
        }
    }

    /// Time between cycles.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Report of the most recently finished cycle.
    pub async fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().await.clone()
    }

    /// Stop scheduling cycles. A cycle already running finishes normally.
    pub fn stop(&self) {
        self.state.send_replace(SchedulerState::Stopped);
        info!("Poll scheduler stopped");
    }

    /// Stop scheduling cycles and wait for one already running to finish,
    /// including a cycle started by [`PollScheduler::trigger`].
    pub async fn shutdown(&self) {
        self.stop();
        let _slot = self.cycle_slot.lock().await;
        debug!("No poll cycle in flight");
    }

    /// Spawn the recurring loop.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.run().await })
    }

    /// Run the recurring loop until [`PollScheduler::stop`] is called.
    pub async fn run(self: Arc<Self>) {
        info!(
            "Poll scheduler started (interval: {} seconds)",
            self.period.as_secs()
        );

        let mut timer = if self.run_on_startup {
            interval(self.period)
        } else {
            interval_at(Instant::now() + self.period, self.period)
        };
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut state_rx = self.state.subscribe();
        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.run_cycle().await;
                }
                // The borrowed state is dropped inside the block so the loop stays `Send`.
                _ = async {
                    let _ = state_rx.wait_for(|s| *s == SchedulerState::Stopped).await;
                } => break,
            }
        }

        debug!("Poll scheduler loop exited");
    }

    /// Run one cycle now and wait for it.
    ///
    /// Returns `None` without doing anything if a cycle is already running
    /// or the scheduler is stopped.
    pub async fn run_cycle(self: &Arc<Self>) -> Option<CycleReport> {
        let slot = self.try_begin()?;
        Some(Arc::clone(self).execute_cycle(slot).await)
    }

    /// Start one cycle in the background.
    ///
    /// Returns false if a cycle is already running or the scheduler is stopped.
    pub fn trigger(self: &Arc<Self>) -> bool {
        let Some(slot) = self.try_begin() else {
            return false;
        };
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.execute_cycle(slot).await;
        });
        true
    }

    /// Claim the cycle slot and move `Idle -> Running`.
    fn try_begin(&self) -> Option<OwnedMutexGuard<()>> {
        let Ok(slot) = Arc::clone(&self.cycle_slot).try_lock_owned() else {
            debug!("Poll cycle already running; skipping");
            return None;
        };

        let started = self.state.send_if_modified(|state| {
            if *state == SchedulerState::Idle {
                *state = SchedulerState::Running;
                true
            } else {
                false
            }
        });

        started.then_some(slot)
    }

    async fn execute_cycle(self: Arc<Self>, _slot: OwnedMutexGuard<()>) -> CycleReport {
        let started_at = Utc::now();
        let channels = self.registry.all_channels().await;
        info!("Poll cycle started: {} channel(s)", channels.len());

        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = Vec::with_capacity(channels.len());
        for channel in channels {
            let scheduler = Arc::clone(&self);
            let permits = Arc::clone(&permits);
            let task_channel = channel.clone();
            let handle = tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                scheduler.process_channel(&task_channel).await
            });
            tasks.push((channel, handle));
        }

        let mut channel_reports = Vec::with_capacity(tasks.len());
        let mut failed_channels = Vec::new();
        for (channel, handle) in tasks {
            match handle.await {
                Ok(report) => channel_reports.push(report),
                Err(e) => {
                    error!(channel = %channel, "Channel task aborted: {}", e);
                    failed_channels.push(channel);
                }
            }
        }

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            channels: channel_reports,
            failed_channels,
        };
        info!(
            "Poll cycle finished: {} item(s) delivered across {} channel(s)",
            report.delivered(),
            report.channels.len()
        );

        *self.last_report.write().await = Some(report.clone());
        self.state.send_if_modified(|state| {
            if *state == SchedulerState::Running {
                *state = SchedulerState::Idle;
                true
            } else {
                false
            }
        });

        report
    }

    async fn process_channel(&self, channel: &str) -> ChannelReport {
        let mut report = ChannelReport::new(channel);

        if !self.sink.is_reachable(channel).await {
            warn!(channel = %channel, "Channel unreachable; skipping");
            report.reachable = false;
            return report;
        }

        for locator in self.registry.locators(channel).await {
            let items = match self.fetcher.fetch(&locator).await {
                Ok(items) => items,
                Err(e) => {
                    if e.is_transient() {
                        warn!(channel = %channel, source = %locator, "Failed to fetch feed: {}", e);
                    } else {
                        error!(channel = %channel, source = %locator, "Failed to fetch feed: {}", e);
                    }
                    report.fetch_failures += 1;
                    continue;
                }
            };
            report.sources_polled += 1;

            for item in items.into_iter().take(ITEMS_PER_FETCH) {
                if self.ledger.has_seen(channel, &item.id).await {
                    continue;
                }
                match self.sink.send(channel, &item).await {
                    Ok(()) => {
                        self.ledger.mark_seen(channel, &item.id).await;
                        report.delivered += 1;
                    }
                    Err(e) => {
                        if e.is_transient() {
                            warn!(channel = %channel, item = %item.id, "Delivery failed: {}", e);
                        } else {
                            error!(channel = %channel, item = %item.id, "Delivery failed: {}", e);
                        }
                        report.delivery_failures += 1;
                    }
                }
            }
        }

        report.checkpointed = self.checkpoint(channel).await;
        if report.delivered > 0 {
            info!(channel = %channel, "Delivered {} new item(s)", report.delivered);
        }
        report
    }

    async fn checkpoint(&self, channel: &str) -> bool {
        let mut ok = true;
        if let Err(e) = self.registry.checkpoint().await {
            error!(channel = %channel, "Failed to persist subscriptions: {}", e);
            ok = false;
        }
        if let Err(e) = self.ledger.checkpoint().await {
            error!(channel = %channel, "Failed to persist delivery ledger: {}", e);
            ok = false;
        }
        ok
    }
}
