//! Router assembly: HTTP endpoints, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers), adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/api/v1/health", get(http::http_health))
        // Students & gamification
        .route(
            "/api/v1/students/:id/progress",
            get(http::http_get_progress).post(http::http_post_progress),
        )
        .route("/api/v1/students/:id/progress/:subject", get(http::http_get_subject_progress))
        .route("/api/v1/students/:id/achievements", get(http::http_get_student_achievements))
        .route(
            "/api/v1/students/:id/achievements/check",
            post(http::http_post_check_achievements),
        )
        .route("/api/v1/students/:id/streak", get(http::http_get_streak))
        .route("/api/v1/students/:id/points", get(http::http_get_points))
        .route("/api/v1/students/:id/activities", get(http::http_get_activities))
        .route("/api/v1/leaderboard", get(http::http_get_leaderboard))
        .route("/api/v1/achievements", get(http::http_get_achievements))
        .route("/api/v1/score", post(http::http_post_score))
        // Problem of the day
        .route("/api/v1/problems/today", get(http::http_get_problem_today))
        .route("/api/v1/problems/stats", get(http::http_get_problem_stats))
        .route("/api/v1/problems/:id/submit", post(http::http_post_submit))
        .route("/api/v1/problems/:id/hint", get(http::http_get_problem_hint))
        // Tutor chat
        .route("/api/v1/tutor/chat/start", post(http::http_post_chat_start))
        .route("/api/v1/tutor/chat/:id/message", post(http::http_post_chat_message))
        .route("/api/v1/tutor/chat/:id/history", get(http::http_get_chat_history))
        .route("/api/v1/tutor/chat/:id/summary", get(http::http_get_chat_summary))
        .route("/api/v1/tutor/performance", get(http::http_get_tutor_performance))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
