// src/handlers/matching.rs

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::matching::{DenyRequest, MatchEntry, Pagination, PaginationParams},
    services,
    utils::jwt::Claims,
};

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 50;

fn page_bounds(params: &PaginationParams) -> (i64, i64) {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);
    (limit, offset)
}

/// Get matched users for the current user (legacy policy, cached with a
/// one-hour staleness window).
pub async fn get_matches(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, AppError> {
    let (limit, offset) = page_bounds(&params);

    let learner = services::matching::find_user(&pool, &claims.sub)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let rows = services::matching::get_matches(&pool, &learner).await?;
    let total = rows.len() as i64;

    let matches: Vec<MatchEntry> = rows
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .map(MatchEntry::from)
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": {
            "matches": matches,
            "pagination": Pagination {
                limit,
                offset,
                total,
                has_more: offset + limit < total,
            },
        },
    })))
}

/// Ranked mentor candidates under the redesigned policy, with the
/// per-field score breakdown.
pub async fn get_redesigned_matches(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, AppError> {
    let (limit, offset) = page_bounds(&params);

    let learner = services::matching::find_user(&pool, &claims.sub)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let scored = services::matching::compute_redesigned(&pool, &learner).await?;
    let total = scored.len() as i64;

    let matches: Vec<_> = scored
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": {
            "matches": matches,
            "pagination": Pagination {
                limit,
                offset,
                total,
                has_more: offset + limit < total,
            },
        },
    })))
}

/// Permanently exclude a mentor from this learner's future matches.
pub async fn deny_mentor(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<DenyRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    services::matching::deny_mentor(&pool, &claims.sub, &payload.mentor_uid).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Mentor denied",
    })))
}

/// Force refresh: clears cached matches so the next request recomputes.
pub async fn refresh_matches(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    services::matching::clear_cached(&pool, &claims.sub).await?;

    tracing::info!("Cleared cached matches for user: {}", claims.sub);

    Ok(Json(json!({
        "success": true,
        "message": "Matches refreshed successfully. New matches will be computed on next request.",
    })))
}

/// Match statistics over the learner's cached list, for analytics views.
pub async fn get_match_stats(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let learner = services::matching::find_user(&pool, &claims.sub)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let stats = services::matching::match_stats(&pool, &learner).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "stats": stats },
    })))
}

/// Popular skills for suggestions (public).
pub async fn popular_skills(
    State(pool): State<PgPool>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let skills = services::popularity::top_skills(&pool, limit).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "skills": skills },
    })))
}
