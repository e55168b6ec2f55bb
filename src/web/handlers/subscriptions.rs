//! Subscription command handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::web::dto::{
    ApiResponse, RemovedResponse, SourceResponse, SubscribeRequest, UnsubscribeRequest,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// GET /api/channels/:channel/subscriptions - List a channel's sources.
pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
) -> Result<Json<ApiResponse<Vec<SourceResponse>>>, ApiError> {
    let sources = state.service.list(&channel).await?;
    Ok(Json(ApiResponse::new(
        sources.into_iter().map(SourceResponse::from).collect(),
    )))
}

/// POST /api/channels/:channel/subscriptions - Subscribe to a catalog source.
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
    Json(req): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SourceResponse>>), ApiError> {
    let source = state.service.subscribe(&channel, &req.source).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(SourceResponse::from(source))),
    ))
}

/// DELETE /api/channels/:channel/subscriptions - Remove sources.
pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
    Json(req): Json<UnsubscribeRequest>,
) -> Result<Json<ApiResponse<RemovedResponse>>, ApiError> {
    if req.sources.is_empty() {
        return Err(ApiError::bad_request("No sources given"));
    }
    let removed = state.service.unsubscribe(&channel, &req.sources).await?;
    Ok(Json(ApiResponse::new(RemovedResponse { removed })))
}
