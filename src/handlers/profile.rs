// src/handlers/profile.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::PgPool;
use sqlx::types::Json as SqlJson;
use validator::Validate;

use crate::{
    cache::{self, Cache, PROFILE_TTL_SECS},
    error::AppError,
    models::{
        session::{BookSessionRequest, RateSessionRequest, is_valid_session_type},
        user::{
            AwardBadgesRequest, CalendarSyncRequest, PublicProfile, UpdateProfileRequest, User,
            UserResponse,
        },
    },
    services::{
        self,
        availability::{self, HORIZON_DAYS, WORKING_HOURS, ManualPreference},
        booking::NewSession,
        calendar::{CalendarApi, EventRequest},
        events::DomainEvent,
    },
    utils::jwt::Claims,
};

/// Get current user's profile, served through the best-effort profile
/// cache.
pub async fn get_me(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let key = cache::profile_key(&claims.sub);
    if let Some(cached) = cache.get_json::<UserResponse>(&key).await {
        return Ok(Json(json!({ "success": true, "data": { "user": cached } })));
    }

    let user = services::matching::find_user(&pool, &claims.sub)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let response = UserResponse::from(user);
    cache.set_json(&key, &response, PROFILE_TTL_SECS).await;

    Ok(Json(json!({ "success": true, "data": { "user": response } })))
}

/// Get another user's public profile.
pub async fn get_user_profile(
    State(pool): State<PgPool>,
    Path(uid): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = services::matching::find_user(&pool, &uid)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "data": { "user": PublicProfile::from(user) },
    })))
}

/// Partial profile update. Only the provided fields change (field-level
/// COALESCE update, never a full-document overwrite), and a
/// ProfileSkillsChanged event keeps the downstream stores in step.
pub async fn update_profile(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    if payload.is_empty() {
        return Err(AppError::BadRequest(
            "At least one field must be provided for update".to_string(),
        ));
    }

    let current = services::matching::find_user(&pool, &claims.sub)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let skills_offered = payload
        .skills_offered
        .as_deref()
        .map(|skills| {
            skills
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        });
    let skills_wanted = payload.skills_wanted.as_deref().map(|skills| {
        skills
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
    });
    let (days, times) = match payload.availability {
        Some(availability) => (Some(availability.days), Some(availability.times)),
        None => (None, None),
    };

    let updated = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET name = COALESCE($2, name),
            avatar_url = COALESCE($3, avatar_url),
            skills_offered = COALESCE($4, skills_offered),
            skills_wanted = COALESCE($5, skills_wanted),
            availability_days = COALESCE($6, availability_days),
            availability_times = COALESCE($7, availability_times),
            updated_at = NOW()
        WHERE uid = $1
        RETURNING uid, name, email, avatar_url, role, skills_offered,
                  skills_wanted, availability_days, availability_times,
                  badge_score, badge_count, total_badge_points,
                  calendar_connected, calendar_synced, calendar_busy_times,
                  available_slots, created_at, updated_at
        "#,
    )
    .bind(&claims.sub)
    .bind(payload.name.as_deref().map(str::trim))
    .bind(&payload.avatar_url)
    .bind(&skills_offered)
    .bind(&skills_wanted)
    .bind(&days)
    .bind(&times)
    .fetch_one(&pool)
    .await?;

    services::events::dispatch(
        &pool,
        &cache,
        DomainEvent::ProfileSkillsChanged {
            uid: updated.uid.clone(),
            previous_offered: current.skills_offered,
            current_offered: updated.skills_offered.clone(),
        },
    )
    .await;

    tracing::info!("Profile updated: {}", updated.uid);

    Ok(Json(json!({
        "success": true,
        "message": "Profile updated successfully",
        "data": { "user": UserResponse::from(updated) },
    })))
}

/// Delete a profile: own profile, or any profile for admins. Denials and
/// cached matches cascade; popularity counters are adjusted through the
/// same event as any other skill removal.
pub async fn delete_profile(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Extension(claims): Extension<Claims>,
    Path(uid): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if uid != claims.sub {
        let requester = services::matching::find_user(&pool, &claims.sub)
            .await?
            .ok_or(AppError::NotFound("User not found".to_string()))?;
        if requester.role != "admin" {
            return Err(AppError::Forbidden(
                "You can only delete your own profile".to_string(),
            ));
        }
    }

    let target = services::matching::find_user(&pool, &uid)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    sqlx::query("DELETE FROM users WHERE uid = $1")
        .bind(&uid)
        .execute(&pool)
        .await?;

    services::events::dispatch(
        &pool,
        &cache,
        DomainEvent::ProfileSkillsChanged {
            uid: uid.clone(),
            previous_offered: target.skills_offered,
            current_offered: vec![],
        },
    )
    .await;

    tracing::info!("Profile deleted: {}", uid);

    Ok(Json(json!({
        "success": true,
        "message": "Profile deleted successfully",
    })))
}

/// Sync external calendar availability: fetch busy intervals, merge them
/// with manual preferences and booked sessions, and store the resolved
/// slots. A calendar outage degrades to "no busy-time data" rather than
/// blocking every slot.
pub async fn sync_calendar(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    State(calendar): State<Arc<dyn CalendarApi>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CalendarSyncRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = services::matching::find_user(&pool, &claims.sub)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let now = Utc::now();
    let busy = match calendar
        .free_busy(&payload.access_token, now, now + Duration::days(HORIZON_DAYS))
        .await
    {
        Ok(busy) => busy,
        Err(e) => {
            tracing::warn!("Calendar free/busy unavailable for {}: {}", user.uid, e);
            vec![]
        }
    };

    let booked = services::booking::booked_intervals(&pool, &user.uid).await?;
    let manual = ManualPreference {
        days: user.availability_days.clone(),
        times: user.availability_times.clone(),
    };
    let slots =
        availability::resolve_slots(now, &manual, &busy, &booked, WORKING_HOURS, HORIZON_DAYS);

    sqlx::query(
        r#"
        UPDATE users
        SET calendar_connected = TRUE, calendar_synced = TRUE,
            calendar_busy_times = $2, available_slots = $3, updated_at = NOW()
        WHERE uid = $1
        "#,
    )
    .bind(&user.uid)
    .bind(SqlJson(&busy))
    .bind(&slots)
    .execute(&pool)
    .await?;

    // Availability feeds match scores, so cached matches are stale now.
    services::events::dispatch(
        &pool,
        &cache,
        DomainEvent::ProfileSkillsChanged {
            uid: user.uid.clone(),
            previous_offered: user.skills_offered.clone(),
            current_offered: user.skills_offered.clone(),
        },
    )
    .await;

    tracing::info!(
        "Calendar synced for {}: {} slots, {} busy intervals",
        user.uid,
        slots.len(),
        busy.len()
    );

    Ok(Json(json!({
        "success": true,
        "data": {
            "available_slots": slots
                .iter()
                .map(|slot| availability::format_slot(*slot))
                .collect::<Vec<_>>(),
            "busy_times_count": busy.len(),
        },
    })))
}

/// Book a confirmed session and best-effort create the matching external
/// calendar event. The session is committed first; calendar failure is
/// surfaced in the response, never rolled back.
pub async fn book_session(
    State(pool): State<PgPool>,
    State(calendar): State<Arc<dyn CalendarApi>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<BookSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let session_type = payload
        .session_type
        .unwrap_or_else(|| "learning".to_string());
    if !is_valid_session_type(&session_type) {
        return Err(AppError::BadRequest(format!(
            "Invalid session type '{}'",
            session_type
        )));
    }

    let start_time = parse_instant(&payload.start_time, "startTime")?;
    let end_time = parse_instant(&payload.end_time, "endTime")?;

    services::matching::find_user(&pool, &payload.participant_uid)
        .await?
        .ok_or(AppError::NotFound("Participant not found".to_string()))?;

    let session_id = services::booking::book_session(
        &pool,
        &NewSession {
            organizer_uid: claims.sub.clone(),
            participant_uid: payload.participant_uid.clone(),
            start_time,
            end_time,
            skill_topic: payload.skill_topic.clone(),
            session_type,
        },
    )
    .await?;

    let event = EventRequest {
        summary: payload.summary.clone(),
        description: format!("SkillSwap session: {}", payload.skill_topic),
        start: start_time,
        end: end_time,
        attendee_email: payload.attendee_email.clone(),
    };

    match calendar.create_event(&payload.access_token, &event).await {
        Ok(created) => {
            services::booking::attach_calendar_event(
                &pool,
                session_id,
                &created.id,
                created.html_link.as_deref(),
            )
            .await?;

            Ok(Json(json!({
                "success": true,
                "data": {
                    "sessionId": session_id,
                    "eventId": created.id,
                    "eventLink": created.html_link,
                },
            })))
        }
        Err(e) => {
            // Partial success: the session stands, the caller is told the
            // calendar attachment failed.
            tracing::warn!(
                "Calendar event creation failed for session {}: {}",
                session_id,
                e
            );
            Ok(Json(json!({
                "success": true,
                "data": {
                    "sessionId": session_id,
                    "calendarError": "Failed to create calendar event",
                },
            })))
        }
    }
}

/// Platform-wide statistics for admin dashboards.
pub async fn admin_stats(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let requester = services::matching::find_user(&pool, &claims.sub)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;
    if requester.role != "admin" {
        return Err(AppError::Forbidden(
            "Access denied. Admin role required.".to_string(),
        ));
    }

    let total_users =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await?;

    let roles = sqlx::query_as::<_, (String, i64)>(
        "SELECT role, COUNT(*) FROM users GROUP BY role",
    )
    .fetch_all(&pool)
    .await?;
    let users_by_role: serde_json::Map<String, serde_json::Value> = roles
        .into_iter()
        .map(|(role, count)| (role, json!(count)))
        .collect();

    let total_unique_skills = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(DISTINCT LOWER(skill))
        FROM (
            SELECT UNNEST(skills_offered) AS skill FROM users
            UNION ALL
            SELECT UNNEST(skills_wanted) FROM users
        ) all_skills
        "#,
    )
    .fetch_one(&pool)
    .await?;

    let popular_skills = services::popularity::top_skills(&pool, 10).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "stats": {
                "total_users": total_users,
                "users_by_role": users_by_role,
                "popular_skills": popular_skills,
                "total_unique_skills": total_unique_skills,
            },
        },
    })))
}

/// Award achievement badges to the current user. Badge count is separate
/// from the rating-derived badge score; it only feeds the legacy match
/// bonus and profile display.
pub async fn award_badges(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AwardBadgesRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    let increment = payload.increment.unwrap_or(1);

    let new_badge_count = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE users
        SET badge_count = badge_count + $2, updated_at = NOW()
        WHERE uid = $1
        RETURNING badge_count
        "#,
    )
    .bind(&claims.sub)
    .bind(increment)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    cache.delete(&cache::profile_key(&claims.sub)).await;

    tracing::info!("Badge count updated for {}: +{}", claims.sub, increment);

    Ok(Json(json!({
        "success": true,
        "message": "Badge count updated successfully",
        "data": { "new_badge_count": new_badge_count },
    })))
}

/// Rate a completed session. The rating row and the mentor's reputation
/// update are one transaction.
pub async fn rate_session(
    State(pool): State<PgPool>,
    State(cache): State<Cache>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<RateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let reputation = services::booking::rate_session(
        &pool,
        payload.session_id,
        &claims.sub,
        &payload.mentor_uid,
        payload.rating,
    )
    .await?;

    // The mentor's cached profile now carries an outdated badge score.
    cache.delete(&cache::profile_key(&payload.mentor_uid)).await;

    Ok(Json(json!({
        "success": true,
        "data": {
            "mentorUid": payload.mentor_uid,
            "reputation": reputation,
        },
    })))
}

fn parse_instant(raw: &str, field: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::BadRequest(format!("{} must be a valid RFC 3339 timestamp", field)))
}
