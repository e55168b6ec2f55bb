//! Scheduler handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use crate::scheduler::SchedulerState;
use crate::web::dto::{ApiResponse, PollResponse, SchedulerStatusResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// POST /api/poll - Start a poll cycle now.
pub async fn trigger_poll(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<ApiResponse<PollResponse>>), ApiError> {
    if state.scheduler.trigger() {
        return Ok((
            StatusCode::ACCEPTED,
            Json(ApiResponse::new(PollResponse { started: true })),
        ));
    }

    match state.scheduler.state() {
        SchedulerState::Stopped => Err(ApiError::conflict("Scheduler is stopped")),
        _ => Err(ApiError::conflict("A poll cycle is already running")),
    }
}

/// GET /api/scheduler - Scheduler state and last cycle report.
pub async fn scheduler_status(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<SchedulerStatusResponse>> {
    let scheduler = &state.scheduler;
    Json(ApiResponse::new(SchedulerStatusResponse {
        state: scheduler.state(),
        interval_secs: scheduler.period().as_secs(),
        last_cycle: scheduler.last_report().await,
    }))
}
