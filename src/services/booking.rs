// src/services/booking.rs

//! Session booking and rating.
//!
//! A confirmed session is the mechanism by which a slot stops being
//! available: the Availability Resolver consults `booked_intervals` for
//! both participants, so no external calendar round-trip is needed to
//! close the double-booking window for one user.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::session::Reputation;
use crate::services::availability::Interval;
use crate::services::scoring::round2;

#[derive(Debug, Clone)]
pub struct NewSession {
    pub organizer_uid: String,
    pub participant_uid: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub skill_topic: String,
    pub session_type: String,
}

/// Intervals of all confirmed sessions the user participates in.
pub async fn booked_intervals(pool: &PgPool, uid: &str) -> Result<Vec<Interval>, AppError> {
    let rows = sqlx::query_as::<_, (DateTime<Utc>, DateTime<Utc>)>(
        r#"
        SELECT start_time, end_time
        FROM sessions
        WHERE participants @> ARRAY[$1]::TEXT[] AND status = 'confirmed'
        "#,
    )
    .bind(uid)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(start, end)| Interval { start, end })
        .collect())
}

/// Books a confirmed session between two users and returns its id.
///
/// The interval becomes busy time for both participants immediately.
/// Cross-pair collisions (two different pairs booking the same mentor at
/// the same instant) are not guarded.
pub async fn book_session(pool: &PgPool, session: &NewSession) -> Result<Uuid, AppError> {
    if session.start_time >= session.end_time {
        return Err(AppError::BadRequest(
            "startTime must be before endTime".to_string(),
        ));
    }

    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO sessions
            (id, organizer_uid, participant_uid, participants,
             start_time, end_time, skill_topic, session_type, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'confirmed')
        "#,
    )
    .bind(id)
    .bind(&session.organizer_uid)
    .bind(&session.participant_uid)
    .bind(vec![
        session.organizer_uid.clone(),
        session.participant_uid.clone(),
    ])
    .bind(session.start_time)
    .bind(session.end_time)
    .bind(&session.skill_topic)
    .bind(&session.session_type)
    .execute(pool)
    .await?;

    tracing::info!("Session booked: {}", id);
    Ok(id)
}

/// Records the external calendar event created for a session. Called on
/// the partial-success path; failure to attach never unwinds the booking.
pub async fn attach_calendar_event(
    pool: &PgPool,
    session_id: Uuid,
    event_id: &str,
    event_link: Option<&str>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE sessions
        SET calendar_event_id = $2, calendar_event_link = $3, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(session_id)
    .bind(event_id)
    .bind(event_link)
    .execute(pool)
    .await?;
    Ok(())
}

/// Applies a 1-5 rating to the mentor inside a single transaction: the
/// rating row and the running-average update commit together or not at
/// all. The mentor row is locked so concurrent ratings cannot lose
/// updates.
pub async fn rate_session(
    pool: &PgPool,
    session_id: Uuid,
    rater_uid: &str,
    mentor_uid: &str,
    rating: i32,
) -> Result<Reputation, AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::BadRequest(
            "Rating must be between 1 and 5".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let current = sqlx::query_as::<_, (i64, i64)>(
        "SELECT badge_count, total_badge_points FROM users WHERE uid = $1 FOR UPDATE",
    )
    .bind(mentor_uid)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Mentor not found".to_string()))?;

    let badge_count = current.0 + 1;
    let total_badge_points = current.1 + rating as i64;
    let badge_score = round2(total_badge_points as f64 / badge_count as f64);

    sqlx::query(
        r#"
        UPDATE users
        SET badge_score = $2, badge_count = $3, total_badge_points = $4,
            updated_at = NOW()
        WHERE uid = $1
        "#,
    )
    .bind(mentor_uid)
    .bind(badge_score)
    .bind(badge_count)
    .bind(total_badge_points)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO session_ratings (session_id, rater_uid, mentor_uid, rating)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(session_id)
    .bind(rater_uid)
    .bind(mentor_uid)
    .bind(rating)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        "Session rated {}/5 for mentor {}, new average: {}",
        rating,
        mentor_uid,
        badge_score
    );

    Ok(Reputation {
        badge_score,
        badge_count,
        total_badge_points,
    })
}
