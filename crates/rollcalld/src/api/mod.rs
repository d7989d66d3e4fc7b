pub mod pages;
pub mod routes;

use crate::service::AttendanceService;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Webcam frames arrive base64-encoded in JSON; allow a few megabytes.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Build the HTTP router.
pub fn router(service: AttendanceService) -> Router {
    Router::new()
        // Pages
        .route("/", get(pages::index))
        .route("/register", get(pages::register))
        // JSON endpoints
        .route("/register_face", post(routes::register_face))
        .route("/process_image", post(routes::process_image))
        .route("/detect_face", post(routes::detect_face))
        .route("/healthz", get(routes::healthz))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
