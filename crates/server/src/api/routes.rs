use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{failures, handlers, jobs, middleware::metrics_middleware, tickets, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Profiles
        .route("/profiles", get(handlers::list_profiles))
        .route(
            "/profiles/{name}/failures",
            get(failures::list_failures).delete(failures::clear_failures),
        )
        .route("/profiles/{name}/tickets", get(tickets::list_tickets))
        // Jobs
        .route("/jobs/{session_id}", get(jobs::list_session_jobs))
        .layer(middleware::from_fn(metrics_middleware))
        .with_state(Arc::clone(&state));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
