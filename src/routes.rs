// src/routes.rs

use std::sync::Arc;

use axum::{
    Json, Router,
    http::{Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde_json::json;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, matching, profile},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Rate-limit rejections carry the same `success: false` body as every
/// other error response.
fn rate_limit_error(err: GovernorError) -> Response {
    let (status, message) = match err {
        GovernorError::TooManyRequests { .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests, please try again later".to_string(),
        ),
        GovernorError::UnableToExtractKey => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        ),
        GovernorError::Other { code, msg, .. } => (
            code,
            msg.unwrap_or_else(|| "Internal Server Error".to_string()),
        ),
    };
    (status, Json(json!({ "success": false, "error": message }))).into_response()
}

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, profile, match).
/// * Applies global middleware (Trace, CORS) and per-group auth/rate limits.
/// * Injects global state (pool, config, cache, calendar client).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(10)
        .burst_size(50)
        .finish()
        .unwrap();
    let governor_conf = Arc::new(governor_conf);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(GovernorLayer::new(governor_conf).error_handler(rate_limit_error));

    let profile_routes = Router::new()
        .route("/me", get(profile::get_me))
        .route("/admin/stats", get(profile::admin_stats))
        .route("/update", post(profile::update_profile))
        .route("/calendar/sync", post(profile::sync_calendar))
        .route("/calendar/book-session", post(profile::book_session))
        .route("/badges", post(profile::award_badges))
        .route("/rate-session", post(profile::rate_session))
        .route("/{uid}", delete(profile::delete_profile))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        // Public profile lookup stays outside the auth layer.
        .merge(Router::new().route("/{uid}", get(profile::get_user_profile)));

    let match_routes = Router::new()
        .route("/", get(matching::get_matches))
        .route("/redesigned", get(matching::get_redesigned_matches))
        .route("/deny", post(matching::deny_mentor))
        .route("/refresh", post(matching::refresh_matches))
        .route("/stats", get(matching::get_match_stats))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .merge(Router::new().route("/skills/popular", get(matching::popular_skills)));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/profile", profile_routes)
        .nest("/api/match", match_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
