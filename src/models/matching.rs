// src/models/matching.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::user::Availability;

/// Row of the 'cached_matches' table: a snapshot of one scored candidate
/// stored under the learner.
#[derive(Debug, Clone, FromRow)]
pub struct CachedMatchRow {
    pub mentor_uid: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub role: String,
    pub skills_offered: Vec<String>,
    pub skills_wanted: Vec<String>,
    pub availability_days: Vec<String>,
    pub availability_times: Vec<String>,
    pub badge_count: i64,
    pub score: i64,
    pub skills_they_can_teach: Vec<String>,
    pub skills_i_can_teach: Vec<String>,
    pub cached_at: DateTime<Utc>,
}

/// Wire shape of one legacy match candidate.
#[derive(Debug, Serialize)]
pub struct MatchEntry {
    pub uid: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub role: String,
    pub skills_offered: Vec<String>,
    pub skills_wanted: Vec<String>,
    pub availability: Availability,
    pub badge_count: i64,
    pub score: i64,
    pub skills_they_can_teach: Vec<String>,
    pub skills_i_can_teach: Vec<String>,
}

impl From<CachedMatchRow> for MatchEntry {
    fn from(row: CachedMatchRow) -> Self {
        Self {
            uid: row.mentor_uid,
            name: row.name,
            avatar_url: row.avatar_url,
            role: row.role,
            skills_offered: row.skills_offered,
            skills_wanted: row.skills_wanted,
            availability: Availability {
                days: row.availability_days,
                times: row.availability_times,
            },
            badge_count: row.badge_count,
            score: row.score,
            skills_they_can_teach: row.skills_they_can_teach,
            skills_i_can_teach: row.skills_i_can_teach,
        }
    }
}

/// Wire shape of one redesigned (mentor-search) candidate, including the
/// per-field contribution breakdown.
#[derive(Debug, Serialize)]
pub struct RedesignedMatch {
    pub uid: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub skills_offered: Vec<String>,
    pub badge_score: f64,
    /// Resolved slots (formatted) when the mentor's calendar is synced,
    /// otherwise the manual preference.
    pub availability: serde_json::Value,
    pub calendar_synced: bool,
    pub match_score: f64,
    pub skill_match_points: f64,
    pub availability_points: f64,
}

#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
    pub has_more: bool,
}

/// Body of POST /api/match/deny.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DenyRequest {
    #[validate(length(min = 1, message = "mentorUid is required."))]
    pub mentor_uid: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct PopularSkill {
    pub name: String,
    pub popularity: i64,
}

/// Aggregates over the learner's currently cached match list, plus skill
/// counts from the profile. Reads the snapshot as-is, without forcing a
/// recompute.
#[derive(Debug, Serialize)]
pub struct MatchStats {
    pub total_matches: i64,
    /// Mean cached score, rounded to the nearest integer; 0 when the
    /// cache is empty.
    pub average_match_score: i64,
    pub highest_match_score: i64,
    pub skills_offered_count: i64,
    pub skills_wanted_count: i64,
}
