// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    cache::Cache,
    error::AppError,
    models::user::{RegisterRequest, User, UserResponse, is_assignable_role},
    services::{self, events::DomainEvent},
    utils::jwt::Claims,
};

fn trimmed_skills(skills: &[String]) -> Vec<String> {
    skills
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Registers a new user.
///
/// Identity (uid, email) comes from the verified token; the body only
/// carries profile fields. Returns 201 Created and the user object.
pub async fn register(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let role = payload.role.unwrap_or_else(|| "student".to_string());
    if !is_assignable_role(&role) {
        return Err(AppError::BadRequest(format!(
            "Role '{}' cannot be self-assigned",
            role
        )));
    }

    let skills_offered = trimmed_skills(&payload.skills_offered);
    let skills_wanted = trimmed_skills(&payload.skills_wanted);
    let availability = payload.availability.unwrap_or_default();

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users
            (uid, name, email, avatar_url, role, skills_offered,
             skills_wanted, availability_days, availability_times)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING uid, name, email, avatar_url, role, skills_offered,
                  skills_wanted, availability_days, availability_times,
                  badge_score, badge_count, total_badge_points,
                  calendar_connected, calendar_synced, calendar_busy_times,
                  available_slots, created_at, updated_at
        "#,
    )
    .bind(&claims.sub)
    .bind(payload.name.trim())
    .bind(claims.email.to_lowercase())
    .bind(&payload.avatar_url)
    .bind(&role)
    .bind(&skills_offered)
    .bind(&skills_wanted)
    .bind(&availability.days)
    .bind(&availability.times)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        // Postgres error code for unique violation is 23505
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict("User already registered".to_string())
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    services::events::dispatch(
        &pool,
        &cache,
        DomainEvent::ProfileSkillsChanged {
            uid: user.uid.clone(),
            previous_offered: vec![],
            current_offered: user.skills_offered.clone(),
        },
    )
    .await;

    tracing::info!("User registered: {}", user.uid);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User registered successfully",
            "data": { "user": UserResponse::from(user) },
        })),
    ))
}

/// Verifies the identity token and returns the user record, or signals
/// that registration has not been completed yet.
pub async fn login(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = services::matching::find_user(&pool, &claims.sub).await?;

    let Some(user) = user else {
        // Verified identity without a profile: the client must register.
        return Ok(Json(json!({
            "success": true,
            "message": "User needs to complete registration",
            "data": {
                "needsRegistration": true,
                "uid": claims.sub,
                "email": claims.email,
            },
        })));
    };

    tracing::info!("User logged in: {}", user.uid);

    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "data": {
            "user": {
                "uid": user.uid,
                "name": user.name,
                "email": user.email,
                "role": user.role,
                "avatar_url": user.avatar_url,
                "badge_score": user.badge_score,
                "badge_count": user.badge_count,
            },
        },
    })))
}
