//! Response DTOs for Web API.

use serde::Serialize;

use crate::catalog::FeedSource;
use crate::scheduler::{CycleReport, SchedulerState};

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Catalog source as exposed over the API.
#[derive(Debug, Serialize)]
pub struct SourceResponse {
    pub name: String,
    pub url: String,
}

impl From<FeedSource> for SourceResponse {
    fn from(source: FeedSource) -> Self {
        Self {
            name: source.name,
            url: source.locator,
        }
    }
}

/// Result of an unsubscribe request.
#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    /// Number of subscriptions removed.
    pub removed: usize,
}

/// Result of a manual poll trigger.
#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub started: bool,
}

/// Scheduler status.
#[derive(Debug, Serialize)]
pub struct SchedulerStatusResponse {
    pub state: SchedulerState,
    pub interval_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cycle: Option<CycleReport>,
}
