//! Router configuration for Web API.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    list_catalog, list_subscriptions, root, scheduler_status, status, subscribe, trigger_poll,
    unsubscribe, AppState,
};

/// Create the main router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let channel_routes = Router::new().route(
        "/:channel/subscriptions",
        get(list_subscriptions).post(subscribe).delete(unsubscribe),
    );

    let api_routes = Router::new()
        .route("/catalog", get(list_catalog))
        .nest("/channels", channel_routes)
        .route("/poll", post(trigger_poll))
        .route("/scheduler", get(scheduler_status));

    Router::new()
        .route("/", get(root))
        .route("/status", get(status))
        .nest("/api", api_routes)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// The full application: main routes plus health check.
pub fn create_app(app_state: Arc<AppState>) -> Router {
    create_router(app_state).merge(create_health_router())
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
