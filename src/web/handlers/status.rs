//! Liveness and status handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, Json};

use crate::store::ChannelId;
use crate::web::dto::{ApiResponse, SourceResponse};
use crate::web::handlers::AppState;

/// Banner returned by `GET /`.
pub const ROOT_BANNER: &str = "newswire is running";

/// GET / - Liveness banner.
pub async fn root() -> &'static str {
    ROOT_BANNER
}

/// GET /status - Subscription count per channel.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<BTreeMap<ChannelId, usize>> {
    Json(state.service.status().await)
}

/// GET /api/catalog - Sources channels can subscribe to.
pub async fn list_catalog(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<SourceResponse>>> {
    let sources = state
        .service
        .catalog()
        .sources()
        .iter()
        .cloned()
        .map(SourceResponse::from)
        .collect();
    Json(ApiResponse::new(sources))
}
