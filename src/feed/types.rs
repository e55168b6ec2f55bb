//! Feed types for newswire.

/// Number of leading items considered from each fetch.
///
/// Bounds per-cycle work and keeps a first-ever fetch from flooding a
/// channel with the whole backlog.
pub const ITEMS_PER_FETCH: usize = 3;

/// Title used when an entry has none.
pub const UNTITLED: &str = "Untitled";

/// One entry produced by fetching a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    /// Stable identifier used for deduplication (the permalink when present).
    pub id: String,
    /// Display title.
    pub title: String,
    /// Link shown to the user.
    pub link: String,
}

impl FeedItem {
    /// Create a new item.
    pub fn new(id: impl Into<String>, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            link: link.into(),
        }
    }

    /// Create an item whose identifier is its link.
    pub fn from_link(link: impl Into<String>, title: impl Into<String>) -> Self {
        let link = link.into();
        Self {
            id: link.clone(),
            title: title.into(),
            link,
        }
    }
}
