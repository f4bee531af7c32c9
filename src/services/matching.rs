// src/services/matching.rs

//! Match computation pipelines plus the cached-match and denial stores.
//!
//! Cached match lists are performance state with a staleness window;
//! denials are correctness state. Cache failures degrade to recomputation,
//! denial-store failures propagate.

use std::cmp::Ordering;

use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::matching::{CachedMatchRow, MatchStats, RedesignedMatch};
use crate::models::user::User;
use crate::services::{availability, scoring};

/// Cached entries older than this are recomputed.
pub const CACHE_STALENESS_SECS: i64 = 3600;

const USER_COLUMNS: &str = r#"
    uid, name, email, avatar_url, role, skills_offered, skills_wanted,
    availability_days, availability_times, badge_score, badge_count,
    total_badge_points, calendar_connected, calendar_synced,
    calendar_busy_times, available_slots, created_at, updated_at
"#;

pub async fn find_user(pool: &PgPool, uid: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE uid = $1",
        USER_COLUMNS
    ))
    .bind(uid)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

async fn all_other_users(pool: &PgPool, uid: &str) -> Result<Vec<User>, AppError> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE uid <> $1",
        USER_COLUMNS
    ))
    .bind(uid)
    .fetch_all(pool)
    .await?;
    Ok(users)
}

/// Mentors this learner has rejected. Consulted before every scoring run;
/// errors here propagate because a denied mentor reappearing is a
/// correctness bug, not a performance one.
pub async fn denied_mentors(pool: &PgPool, learner_uid: &str) -> Result<Vec<String>, AppError> {
    let uids = sqlx::query_scalar::<_, String>(
        "SELECT mentor_uid FROM denials WHERE learner_uid = $1",
    )
    .bind(learner_uid)
    .fetch_all(pool)
    .await?;
    Ok(uids)
}

/// Idempotently records a denial and evicts the mentor from the learner's
/// cached list so the exclusion is visible even within a fresh cache
/// window.
pub async fn deny_mentor(
    pool: &PgPool,
    learner_uid: &str,
    mentor_uid: &str,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO denials (learner_uid, mentor_uid)
        VALUES ($1, $2)
        ON CONFLICT (learner_uid, mentor_uid) DO NOTHING
        "#,
    )
    .bind(learner_uid)
    .bind(mentor_uid)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM cached_matches WHERE learner_uid = $1 AND mentor_uid = $2")
        .bind(learner_uid)
        .bind(mentor_uid)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!("Stored denial: {} rejected {}", learner_uid, mentor_uid);
    Ok(())
}

pub async fn load_cached(
    pool: &PgPool,
    learner_uid: &str,
) -> Result<Vec<CachedMatchRow>, AppError> {
    let rows = sqlx::query_as::<_, CachedMatchRow>(
        r#"
        SELECT mentor_uid, name, avatar_url, role, skills_offered,
               skills_wanted, availability_days, availability_times,
               badge_count, score, skills_they_can_teach, skills_i_can_teach,
               cached_at
        FROM cached_matches
        WHERE learner_uid = $1
        ORDER BY score DESC, mentor_uid ASC
        "#,
    )
    .bind(learner_uid)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

fn cache_is_fresh(rows: &[CachedMatchRow]) -> bool {
    rows.iter()
        .map(|row| row.cached_at)
        .max()
        .is_some_and(|newest| Utc::now() - newest < Duration::seconds(CACHE_STALENESS_SECS))
}

/// Replaces the learner's cached set wholesale. The delete and inserts
/// share one transaction, so a concurrent reader sees the old full set or
/// the new full set, never a mix.
async fn replace_cached(
    pool: &PgPool,
    learner_uid: &str,
    rows: &[CachedMatchRow],
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM cached_matches WHERE learner_uid = $1")
        .bind(learner_uid)
        .execute(&mut *tx)
        .await?;

    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO cached_matches
                (learner_uid, mentor_uid, name, avatar_url, role,
                 skills_offered, skills_wanted, availability_days,
                 availability_times, badge_count, score,
                 skills_they_can_teach, skills_i_can_teach, cached_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(learner_uid)
        .bind(&row.mentor_uid)
        .bind(&row.name)
        .bind(&row.avatar_url)
        .bind(&row.role)
        .bind(&row.skills_offered)
        .bind(&row.skills_wanted)
        .bind(&row.availability_days)
        .bind(&row.availability_times)
        .bind(row.badge_count)
        .bind(row.score)
        .bind(&row.skills_they_can_teach)
        .bind(&row.skills_i_can_teach)
        .bind(row.cached_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Match statistics over whatever is currently cached for the learner.
/// An empty (or expired-and-cleared) cache yields all-zero score stats.
pub async fn match_stats(pool: &PgPool, learner: &User) -> Result<MatchStats, AppError> {
    let (total, average, highest) = sqlx::query_as::<_, (i64, Option<f64>, Option<i64>)>(
        r#"
        SELECT COUNT(*), CAST(AVG(score) AS DOUBLE PRECISION), MAX(score)
        FROM cached_matches
        WHERE learner_uid = $1
        "#,
    )
    .bind(&learner.uid)
    .fetch_one(pool)
    .await?;

    Ok(MatchStats {
        total_matches: total,
        average_match_score: average.map(|avg| avg.round() as i64).unwrap_or(0),
        highest_match_score: highest.unwrap_or(0),
        skills_offered_count: learner.skills_offered.len() as i64,
        skills_wanted_count: learner.skills_wanted.len() as i64,
    })
}

/// Unconditionally clears the learner's cached matches; the next
/// `get_matches` call recomputes.
pub async fn clear_cached(pool: &PgPool, learner_uid: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM cached_matches WHERE learner_uid = $1")
        .bind(learner_uid)
        .execute(pool)
        .await?;
    Ok(())
}

/// Scores all candidates for the learner under the legacy policy.
async fn compute_legacy(pool: &PgPool, learner: &User) -> Result<Vec<CachedMatchRow>, AppError> {
    let denied = denied_mentors(pool, &learner.uid).await?;
    let candidates = all_other_users(pool, &learner.uid).await?;
    let now = Utc::now();

    let mut rows: Vec<CachedMatchRow> = candidates
        .into_iter()
        .filter(|candidate| !denied.contains(&candidate.uid))
        .filter_map(|candidate| {
            let scored = scoring::legacy_score(learner, &candidate);
            if scored.score <= 0 {
                return None;
            }
            Some(CachedMatchRow {
                mentor_uid: candidate.uid,
                name: candidate.name,
                avatar_url: candidate.avatar_url,
                role: candidate.role,
                skills_offered: candidate.skills_offered,
                skills_wanted: candidate.skills_wanted,
                availability_days: candidate.availability_days,
                availability_times: candidate.availability_times,
                badge_count: candidate.badge_count,
                score: scored.score,
                skills_they_can_teach: scored.skills_they_can_teach,
                skills_i_can_teach: scored.skills_i_can_teach,
                cached_at: now,
            })
        })
        .collect();

    rows.sort_by(|a, b| b.score.cmp(&a.score).then(a.mentor_uid.cmp(&b.mentor_uid)));
    Ok(rows)
}

/// Returns the learner's match list, serving cached entries while the
/// newest is under the staleness window and otherwise recomputing and
/// replacing the snapshot.
pub async fn get_matches(pool: &PgPool, learner: &User) -> Result<Vec<CachedMatchRow>, AppError> {
    let cached = load_cached(pool, &learner.uid).await?;
    if !cached.is_empty() && cache_is_fresh(&cached) {
        tracing::info!("Using cached matches for user: {}", learner.uid);
        return Ok(cached);
    }

    tracing::info!("Computing matches for user: {}", learner.uid);
    let fresh = compute_legacy(pool, learner).await?;
    replace_cached(pool, &learner.uid, &fresh).await?;
    Ok(fresh)
}

/// Scores all mentor candidates under the redesigned policy. Not cached;
/// denials are excluded before scoring and zero-total candidates dropped.
pub async fn compute_redesigned(
    pool: &PgPool,
    learner: &User,
) -> Result<Vec<RedesignedMatch>, AppError> {
    let denied = denied_mentors(pool, &learner.uid).await?;
    let candidates = all_other_users(pool, &learner.uid).await?;

    let mut matches: Vec<RedesignedMatch> = candidates
        .into_iter()
        .filter(|mentor| !denied.contains(&mentor.uid))
        .filter(|mentor| !mentor.skills_offered.is_empty())
        .filter_map(|mentor| {
            let scored = scoring::redesigned_score(learner, &mentor);
            if scored.total <= 0.0 {
                return None;
            }
            let availability_view = if mentor.calendar_synced {
                json!(
                    mentor
                        .available_slots
                        .iter()
                        .map(|slot| availability::format_slot(*slot))
                        .collect::<Vec<_>>()
                )
            } else {
                json!(mentor.availability())
            };
            Some(RedesignedMatch {
                uid: mentor.uid,
                name: mentor.name,
                avatar_url: mentor.avatar_url,
                skills_offered: mentor.skills_offered,
                badge_score: mentor.badge_score,
                availability: availability_view,
                calendar_synced: mentor.calendar_synced,
                match_score: scored.total,
                skill_match_points: scored.skill_points,
                availability_points: scored.availability_points,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.match_score
            .partial_cmp(&a.match_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.uid.cmp(&b.uid))
    });

    tracing::info!(
        "Computed {} redesigned matches for user: {}",
        matches.len(),
        learner.uid
    );
    Ok(matches)
}
