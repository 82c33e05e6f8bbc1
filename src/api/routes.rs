//! API route definitions

use super::handlers::{self, TrackerState};
use super::{event_handlers, file_handlers, stage_handlers};
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: TrackerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state.upload_limits.request_body_limit();

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // ====================================================================
        // Trackers
        // ====================================================================
        .route(
            "/api/visa-tracker",
            axum::routing::post(handlers::create_tracker),
        )
        .route(
            "/api/visa-tracker/{client_id}",
            get(handlers::get_tracker).patch(handlers::set_overall_status),
        )
        .route("/api/visa-trackers", get(handlers::list_trackers))
        .route(
            "/api/visa-trackers/branch/{branch_id}",
            get(handlers::list_branch_trackers),
        )
        .route(
            "/api/visa-trackers/events",
            get(event_handlers::tracker_events),
        )
        // ====================================================================
        // Stages
        // ====================================================================
        .route(
            "/api/visa-tracker/{client_id}/{stage}",
            get(stage_handlers::get_stage)
                .post(stage_handlers::upsert_stage)
                .put(stage_handlers::upsert_stage),
        )
        .route(
            "/api/visa-agreements/{client_id}",
            get(stage_handlers::get_agreement).post(stage_handlers::upsert_agreement),
        )
        // ====================================================================
        // Files
        // ====================================================================
        .route("/api/files/{file_id}", get(file_handlers::download_file))
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
