//! newswire - feed distribution service
//!
//! Polls a fixed catalog of news feeds on a schedule and delivers items a
//! chat channel has not seen yet to every channel subscribed to the feed.

pub mod app;
pub mod catalog;
pub mod config;
pub mod delivery;
pub mod error;
pub mod feed;
pub mod ledger;
pub mod logging;
pub mod scheduler;
pub mod store;
pub mod subscription;
pub mod web;

pub use app::Application;
pub use catalog::{Catalog, FeedSource};
pub use config::Config;
pub use delivery::{format_message, DeliverySink, LogSink, WebhookSink};
pub use error::{NewswireError, Result};
pub use feed::{FeedFetcher, FeedItem, HttpFeedFetcher, ITEMS_PER_FETCH};
pub use ledger::DedupLedger;
pub use scheduler::{ChannelReport, CycleReport, PollScheduler, SchedulerState};
pub use store::{ChannelId, JsonFileStore, MemoryStore, Store};
pub use subscription::{AddOutcome, SubscriptionRegistry, SubscriptionService};
