// src/models/session.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents the 'sessions' table. Once a session is confirmed its
/// interval is authoritative busy time for both participants.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub organizer_uid: String,
    pub participant_uid: String,
    pub participants: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub skill_topic: String,
    /// 'learning' or 'teaching', from the organizer's perspective.
    pub session_type: String,
    /// 'confirmed', 'cancelled' or 'completed'. Only 'confirmed' is ever
    /// written by the current flows.
    pub status: String,
    pub calendar_event_id: Option<String>,
    pub calendar_event_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn is_valid_session_type(session_type: &str) -> bool {
    matches!(session_type, "learning" | "teaching")
}

/// Body of POST /api/profile/calendar/book-session.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookSessionRequest {
    #[validate(length(min = 1, message = "accessToken is required."))]
    pub access_token: String,
    #[validate(length(min = 1, max = 200))]
    pub summary: String,
    /// RFC 3339 instants; parsed and range-checked before anything is
    /// written.
    pub start_time: String,
    pub end_time: String,
    #[validate(email)]
    pub attendee_email: String,
    #[validate(length(min = 1))]
    pub participant_uid: String,
    #[validate(length(min = 1, max = 100))]
    pub skill_topic: String,
    pub session_type: Option<String>,
}

/// Body of POST /api/profile/rate-session.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RateSessionRequest {
    pub session_id: Uuid,
    #[validate(length(min = 1))]
    pub mentor_uid: String,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5."))]
    pub rating: i32,
}

/// Mentor reputation snapshot returned after a rating is applied.
#[derive(Debug, Serialize)]
pub struct Reputation {
    pub badge_score: f64,
    pub badge_count: i64,
    pub total_badge_points: i64,
}
