//! Request DTOs for Web API.

use serde::Deserialize;

/// Subscribe request.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    /// Catalog source, by display name or URL.
    pub source: String,
}

/// Unsubscribe request.
#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    /// Sources to remove, by display name or URL.
    pub sources: Vec<String>,
}
