//! Poll Cycle Tests
//!
//! Integration tests for the scheduler driving fetch, dedup and delivery.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use newswire::store::SubscriptionMap;
use newswire::{MemoryStore, SchedulerState, Store, ITEMS_PER_FETCH};

fn memory_store(subs: SubscriptionMap) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_tables(subs, Default::default()))
}

#[tokio::test]
async fn test_first_cycle_delivers_first_three_then_nothing() {
    let store = memory_store(subscriptions(&[("C", &[S1])]));
    let fetcher = ScriptedFetcher::new();
    fetcher.set_items(S1, vec![item(1), item(2), item(3), item(4)]);
    let sink = RecordingSink::new();
    let h = harness(store, fetcher.clone(), sink.clone(), 4).await;

    let report = h.scheduler.run_cycle().await.expect("cycle should run");
    assert_eq!(sink.sent_to("C"), ids(&[1, 2, 3]));
    assert_eq!(report.delivered(), 3);

    let report = h.scheduler.run_cycle().await.expect("cycle should run");
    assert_eq!(report.delivered(), 0);
    assert_eq!(sink.sent_to("C"), ids(&[1, 2, 3]));
    assert!(!h.ledger.has_seen("C", &item(4).id).await);
}

#[tokio::test]
async fn test_capped_ledger_cycles_are_idempotent() {
    let store = memory_store(subscriptions(&[("C", &[S1, S2])]));
    let fetcher = ScriptedFetcher::new();
    fetcher.set_items(S1, vec![item(1), item(2), item(3), item(4)]);
    fetcher.set_items(S2, vec![item(11), item(12), item(13)]);
    let sink = RecordingSink::new();
    let cap = Some(2 * ITEMS_PER_FETCH);
    let h = capped_harness(store, fetcher, sink.clone(), 4, cap).await;

    for _ in 0..3 {
        h.scheduler.run_cycle().await.expect("cycle should run");
    }

    assert_eq!(sink.sent_to("C"), ids(&[1, 2, 3, 11, 12, 13]));
    assert_eq!(h.ledger.seen_count("C").await, 2 * ITEMS_PER_FETCH);
}

#[tokio::test]
async fn test_shutdown_waits_for_triggered_cycle() {
    let store = memory_store(subscriptions(&[("C", &[S1])]));
    let fetcher = BlockingFetcher::new(vec![item(1)]);
    let sink = RecordingSink::new();
    let h = harness(store, fetcher.clone(), sink.clone(), 4).await;

    assert!(h.scheduler.trigger());
    tokio::time::timeout(DEFAULT_TIMEOUT, fetcher.entered.notified())
        .await
        .expect("cycle should start fetching");

    let scheduler = Arc::clone(&h.scheduler);
    let shutdown = tokio::spawn(async move { scheduler.shutdown().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!shutdown.is_finished());
    assert_eq!(h.scheduler.state(), SchedulerState::Stopped);

    fetcher.release.notify_one();
    tokio::time::timeout(DEFAULT_TIMEOUT, shutdown)
        .await
        .expect("shutdown should finish once the cycle ends")
        .expect("shutdown should not panic");

    assert_eq!(sink.sent_to("C"), ids(&[1]));
    assert!(h.scheduler.last_report().await.is_some());
}

#[tokio::test]
async fn test_new_item_at_head_is_delivered_once() {
    let store = memory_store(subscriptions(&[("C", &[S1])]));
    let fetcher = ScriptedFetcher::new();
    fetcher.set_items(S1, vec![item(1), item(2), item(3)]);
    let sink = RecordingSink::new();
    let h = harness(store, fetcher.clone(), sink.clone(), 4).await;

    h.scheduler.run_cycle().await;
    fetcher.set_items(S1, vec![item(5), item(1), item(2), item(3)]);
    h.scheduler.run_cycle().await;
    h.scheduler.run_cycle().await;

    assert_eq!(sink.sent_to("C"), ids(&[1, 2, 3, 5]));
}

#[tokio::test]
async fn test_same_item_in_two_sources_is_sent_once() {
    let store = memory_store(subscriptions(&[("C", &[S1, S2])]));
    let fetcher = ScriptedFetcher::new();
    fetcher.set_items(S1, vec![item(1)]);
    fetcher.set_items(S2, vec![item(1), item(2)]);
    let sink = RecordingSink::new();
    let h = harness(store, fetcher, sink.clone(), 4).await;

    h.scheduler.run_cycle().await;

    assert_eq!(sink.sent_to("C"), ids(&[1, 2]));
}

#[tokio::test]
async fn test_channels_dedup_independently() {
    let store = memory_store(subscriptions(&[("A", &[S1]), ("B", &[S1])]));
    let fetcher = ScriptedFetcher::new();
    fetcher.set_items(S1, vec![item(1), item(2)]);
    let sink = RecordingSink::new();
    let h = harness(store, fetcher, sink.clone(), 4).await;

    h.scheduler.run_cycle().await;

    assert_eq!(sink.sent_to("A"), ids(&[1, 2]));
    assert_eq!(sink.sent_to("B"), ids(&[1, 2]));
}

#[tokio::test]
async fn test_failed_delivery_is_retried_next_cycle() {
    let store = memory_store(subscriptions(&[("C", &[S1])]));
    let fetcher = ScriptedFetcher::new();
    fetcher.set_items(S1, vec![item(1), item(2), item(3)]);
    let sink = RecordingSink::new();
    sink.fail_item(&item(2).id);
    let h = harness(store, fetcher, sink.clone(), 4).await;

    let report = h.scheduler.run_cycle().await.expect("cycle should run");
    let channel = report.channel("C").expect("channel report");
    assert_eq!(channel.delivered, 2);
    assert_eq!(channel.delivery_failures, 1);
    assert_eq!(sink.sent_to("C"), ids(&[1, 3]));
    assert!(!h.ledger.has_seen("C", &item(2).id).await);

    sink.clear_failures();
    h.scheduler.run_cycle().await;

    assert_eq!(sink.sent_to("C"), ids(&[1, 3, 2]));
    assert!(h.ledger.has_seen("C", &item(2).id).await);
}

#[tokio::test]
async fn test_fetch_failure_is_isolated_to_its_source() {
    let store = memory_store(subscriptions(&[("C", &[S1, S2]), ("D", &[S2])]));
    let fetcher = ScriptedFetcher::new();
    fetcher.set_failing(S1);
    fetcher.set_items(S2, vec![item(7)]);
    let sink = RecordingSink::new();
    let h = harness(store, fetcher, sink.clone(), 4).await;

    let report = h.scheduler.run_cycle().await.expect("cycle should run");

    let c = report.channel("C").expect("channel report");
    assert_eq!(c.fetch_failures, 1);
    assert_eq!(c.sources_polled, 1);
    assert_eq!(sink.sent_to("C"), ids(&[7]));
    assert_eq!(sink.sent_to("D"), ids(&[7]));
}

#[tokio::test]
async fn test_panicking_channel_does_not_abort_cycle() {
    let store = memory_store(subscriptions(&[("A", &[S3]), ("B", &[S1])]));
    let fetcher = ScriptedFetcher::new();
    fetcher.set_panicking(S3);
    fetcher.set_items(S1, vec![item(1)]);
    let sink = RecordingSink::new();
    let h = harness(store, fetcher, sink.clone(), 4).await;

    let report = h.scheduler.run_cycle().await.expect("cycle should run");

    assert_eq!(report.failed_channels, vec!["A".to_string()]);
    assert_eq!(sink.sent_to("B"), ids(&[1]));
    assert_eq!(h.scheduler.state(), SchedulerState::Idle);

    // The scheduler keeps working afterwards.
    assert!(h.scheduler.run_cycle().await.is_some());
}

#[tokio::test]
async fn test_unreachable_channel_is_skipped() {
    let store = memory_store(subscriptions(&[("gone", &[S1]), ("live", &[S2])]));
    let fetcher = ScriptedFetcher::new();
    fetcher.set_items(S1, vec![item(1)]);
    fetcher.set_items(S2, vec![item(2)]);
    let sink = RecordingSink::new();
    sink.set_unreachable("gone");
    let h = harness(store, fetcher.clone(), sink.clone(), 4).await;

    let report = h.scheduler.run_cycle().await.expect("cycle should run");

    assert!(!report.channel("gone").expect("channel report").reachable);
    assert!(!fetcher.calls().contains(&S1.to_string()));
    assert!(sink.sent_to("gone").is_empty());
    assert_eq!(sink.sent_to("live"), ids(&[2]));
    // Skipping does not drop the subscription.
    assert_eq!(h.registry.locators("gone").await, vec![S1.to_string()]);
}

#[tokio::test]
async fn test_checkpoint_persists_ledger() {
    let store = memory_store(subscriptions(&[("C", &[S1])]));
    let fetcher = ScriptedFetcher::new();
    fetcher.set_items(S1, vec![item(1), item(2)]);
    let h = harness(store.clone(), fetcher, RecordingSink::new(), 4).await;

    let report = h.scheduler.run_cycle().await.expect("cycle should run");
    assert!(report.channel("C").expect("channel report").checkpointed);

    let saved = store.load_ledger().await.unwrap();
    assert_eq!(saved["C"], ids(&[1, 2]));
}

#[tokio::test]
async fn test_unsaved_sends_replay_after_restart() {
    let store = FlakyStore::new(subscriptions(&[("C", &[S1])]));
    let fetcher = ScriptedFetcher::new();
    fetcher.set_items(S1, vec![item(1), item(2), item(3)]);

    // Sends succeed but the checkpoint cannot be written.
    store.set_fail_saves(true);
    let first = RecordingSink::new();
    let h = harness(store.clone(), fetcher.clone(), first.clone(), 4).await;
    let report = h.scheduler.run_cycle().await.expect("cycle should run");
    assert_eq!(first.sent_to("C"), ids(&[1, 2, 3]));
    assert!(!report.channel("C").expect("channel report").checkpointed);

    // A restart reloads the last checkpoint, so the items go out again.
    store.set_fail_saves(false);
    let second = RecordingSink::new();
    let restarted = harness(store.clone(), fetcher, second.clone(), 4).await;
    restarted.scheduler.run_cycle().await;
    assert_eq!(second.sent_to("C"), ids(&[1, 2, 3]));
}

#[tokio::test]
async fn test_trigger_while_running_is_dropped() {
    let store = memory_store(subscriptions(&[("C", &[S1])]));
    let fetcher = BlockingFetcher::new(vec![item(1)]);
    let sink = RecordingSink::new();
    let h = harness(store, fetcher.clone(), sink.clone(), 4).await;

    assert!(h.scheduler.trigger());
    tokio::time::timeout(DEFAULT_TIMEOUT, fetcher.entered.notified())
        .await
        .expect("cycle should start fetching");
    assert_eq!(h.scheduler.state(), SchedulerState::Running);

    assert!(!h.scheduler.trigger());
    assert!(h.scheduler.run_cycle().await.is_none());

    fetcher.release.notify_one();
    wait_for_state(&h.scheduler, SchedulerState::Idle).await;

    assert_eq!(sink.sent_to("C"), ids(&[1]));
    let last = h.scheduler.last_report().await.expect("last report");
    assert_eq!(last.delivered(), 1);
}

#[tokio::test]
async fn test_channel_concurrency_is_bounded() {
    let subs: SubscriptionMap = (0..6)
        .map(|i| (format!("C{i}"), vec![S1.to_string()]))
        .collect();
    let store = memory_store(subs);
    let fetcher = CountingFetcher::new(Duration::from_millis(50));
    let sink = RecordingSink::new();
    let h = harness(store, fetcher.clone(), sink.clone(), 2).await;

    let report = h.scheduler.run_cycle().await.expect("cycle should run");

    assert_eq!(report.channels.len(), 6);
    assert_eq!(sink.sent().len(), 6);
    assert!(fetcher.peak() <= 2, "peak concurrency was {}", fetcher.peak());
}

#[tokio::test]
async fn test_stopped_scheduler_refuses_cycles() {
    let store = memory_store(subscriptions(&[("C", &[S1])]));
    let fetcher = ScriptedFetcher::new();
    fetcher.set_items(S1, vec![item(1)]);
    let sink = RecordingSink::new();
    let h = harness(store, fetcher, sink.clone(), 4).await;

    let handle = h.scheduler.start();
    h.scheduler.stop();
    tokio::time::timeout(DEFAULT_TIMEOUT, handle)
        .await
        .expect("loop should exit")
        .expect("loop should not panic");

    assert_eq!(h.scheduler.state(), SchedulerState::Stopped);
    assert!(!h.scheduler.trigger());
    assert!(sink.sent().is_empty());
}

#[tokio::test]
async fn test_run_on_startup_polls_immediately() {
    let store = memory_store(subscriptions(&[("C", &[S1])]));
    let fetcher = ScriptedFetcher::new();
    fetcher.set_items(S1, vec![item(1)]);
    let sink = RecordingSink::new();

    let registry = Arc::new(
        newswire::SubscriptionRegistry::load(test_catalog(), store.clone())
            .await
            .unwrap(),
    );
    let ledger = Arc::new(newswire::DedupLedger::load(store, None).await.unwrap());
    let config = newswire::config::SchedulerConfig {
        poll_interval_secs: 3600,
        max_concurrent_channels: 1,
        run_on_startup: true,
    };
    let scheduler = Arc::new(newswire::PollScheduler::new(
        registry,
        ledger,
        fetcher,
        sink.clone(),
        &config,
    ));

    let handle = scheduler.start();
    tokio::time::timeout(DEFAULT_TIMEOUT, async {
        while scheduler.last_report().await.is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("startup cycle should run");

    scheduler.stop();
    handle.await.unwrap();
    assert_eq!(sink.sent_to("C"), ids(&[1]));
}
