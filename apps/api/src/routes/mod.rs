pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::models::resume::MAX_ATTACHMENT_BYTES;
use crate::state::AppState;
use crate::workflow::handlers;

/// Room for multipart framing around a maximum-size upload.
const UPLOAD_BODY_LIMIT: usize = MAX_ATTACHMENT_BYTES + 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Session lifecycle
        .route("/api/v1/sessions", post(handlers::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::handle_get_session).delete(handlers::handle_delete_session),
        )
        // Inputs
        .route(
            "/api/v1/sessions/:id/resume/text",
            put(handlers::handle_set_resume_text),
        )
        .route(
            "/api/v1/sessions/:id/resume/file",
            post(handlers::handle_upload_resume).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/v1/sessions/:id/job", put(handlers::handle_set_job_text))
        // Navigation and discovery
        .route(
            "/api/v1/sessions/:id/discover",
            post(handlers::handle_open_discovery),
        )
        .route("/api/v1/sessions/:id/input", post(handlers::handle_show_input))
        .route("/api/v1/sessions/:id/search", post(handlers::handle_search))
        .route(
            "/api/v1/sessions/:id/postings/:index/select",
            post(handlers::handle_select_posting),
        )
        // Analysis
        .route("/api/v1/sessions/:id/analyze", post(handlers::handle_analyze))
        .route("/api/v1/sessions/:id/reset", post(handlers::handle_reset))
        .route(
            "/api/v1/sessions/:id/selection",
            put(handlers::handle_select_bullet),
        )
        .with_state(state)
}
