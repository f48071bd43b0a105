//! HTTP server for the control plane.
//!
//! Provides endpoints for:
//! - Component status and action execution (`/v1/components`)
//! - Action history (`/v1/actions`)
//! - Runner tasks, output and cancellation (`/v1/tasks`)
//! - Health check (`/health`)
//! - Prometheus metrics (`/metrics`)

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

mod handlers;
pub mod responses;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS layer for the browser console
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Components
        .route("/v1/components", get(handlers::list_components))
        .route("/v1/components/:component", get(handlers::get_component))
        .route(
            "/v1/components/:component/actions/:action",
            post(handlers::execute_action),
        )
        // Actions
        .route("/v1/actions", get(handlers::list_actions))
        .route("/v1/actions/:action_id", get(handlers::get_action))
        // Tasks
        .route("/v1/tasks", get(handlers::list_tasks))
        .route("/v1/tasks/:task_id", get(handlers::get_task))
        .route("/v1/tasks/:task_id/output", get(handlers::get_task_output))
        .route("/v1/tasks/:task_id/cancel", post(handlers::cancel_task))
        // Observability routes
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(cors)
        .with_state(state)
}
