//! Feed fetching.

pub mod fetcher;
pub mod types;

pub use fetcher::HttpFeedFetcher;
pub use types::{FeedItem, ITEMS_PER_FETCH, UNTITLED};

use async_trait::async_trait;

use crate::Result;

/// Retrieves a feed and turns it into items.
///
/// Every failure is reported as [`crate::NewswireError::Fetch`]; callers treat
/// it as transient and isolated to that one source.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch the feed at `locator`, returning items in feed order.
    async fn fetch(&self, locator: &str) -> Result<Vec<FeedItem>>;
}
