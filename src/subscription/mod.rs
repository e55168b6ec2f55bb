//! Channel subscriptions.

pub mod registry;
pub mod service;

pub use registry::{AddOutcome, SubscriptionRegistry};
pub use service::SubscriptionService;
