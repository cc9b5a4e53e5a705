pub mod health;
pub mod trace;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::client::TracedExecutor;

/// Builds the API router.
pub fn router(executor: Arc<TracedExecutor>) -> Router {
    Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/trace", post(trace::trace_request))
        .with_state(executor)
}
