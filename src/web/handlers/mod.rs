//! API handlers for the newswire web API.

pub mod scheduler;
pub mod status;
pub mod subscriptions;

pub use scheduler::*;
pub use status::*;
pub use subscriptions::*;

use std::sync::Arc;

use crate::scheduler::PollScheduler;
use crate::subscription::SubscriptionService;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Command interface over the subscription registry.
    pub service: SubscriptionService,
    /// Poll scheduler, for manual triggers and status.
    pub scheduler: Arc<PollScheduler>,
}

impl AppState {
    pub fn new(service: SubscriptionService, scheduler: Arc<PollScheduler>) -> Self {
        Self { service, scheduler }
    }
}
