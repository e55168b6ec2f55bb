//! Web API module for newswire.
//!
//! Serves liveness and status endpoints plus a JSON command interface for
//! managing subscriptions and triggering polls.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::{create_app, create_router};
pub use server::WebServer;
