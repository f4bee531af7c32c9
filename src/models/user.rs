// src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use validator::Validate;

use crate::services::availability::{self, Interval};

/// Manual weekday/time preference, as opposed to calendar-derived data.
/// Empty `days` means "no day restriction"; empty `times` means "any
/// working hour".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Availability {
    #[serde(default)]
    pub days: Vec<String>,
    #[serde(default)]
    pub times: Vec<String>,
}

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    /// Stable id issued by the identity provider.
    pub uid: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,

    /// User role: 'student', 'mentor' or 'admin'.
    pub role: String,

    /// Skill identity is case-insensitive; display casing is preserved.
    pub skills_offered: Vec<String>,
    pub skills_wanted: Vec<String>,

    pub availability_days: Vec<String>,
    pub availability_times: Vec<String>,

    /// Running average session rating in [0, 5]. Invariant:
    /// badge_score == round(total_badge_points / badge_count, 2)
    /// whenever badge_count > 0, else 0.
    pub badge_score: f64,
    pub badge_count: i64,
    pub total_badge_points: i64,

    pub calendar_connected: bool,
    pub calendar_synced: bool,
    /// Busy intervals reported by the external calendar on last sync.
    pub calendar_busy_times: Json<Vec<Interval>>,
    /// Resolved one-hour slot starts, recomputed on sync. Stored as
    /// instants; formatting happens at the presentation boundary.
    pub available_slots: Vec<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn availability(&self) -> Availability {
        Availability {
            days: self.availability_days.clone(),
            times: self.availability_times.clone(),
        }
    }
}

pub fn is_assignable_role(role: &str) -> bool {
    matches!(role, "student" | "mentor")
}

/// Full user document returned to the owner.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub role: String,
    pub skills_offered: Vec<String>,
    pub skills_wanted: Vec<String>,
    pub availability: Availability,
    pub badge_score: f64,
    pub badge_count: i64,
    pub total_badge_points: i64,
    pub calendar_connected: bool,
    pub calendar_synced: bool,
    pub available_slots: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            available_slots: user
                .available_slots
                .iter()
                .map(|slot| availability::format_slot(*slot))
                .collect(),
            availability: user.availability(),
            uid: user.uid,
            name: user.name,
            email: user.email,
            avatar_url: user.avatar_url,
            role: user.role,
            skills_offered: user.skills_offered,
            skills_wanted: user.skills_wanted,
            badge_score: user.badge_score,
            badge_count: user.badge_count,
            total_badge_points: user.total_badge_points,
            calendar_connected: user.calendar_connected,
            calendar_synced: user.calendar_synced,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Public subset of a profile, visible without authentication.
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub uid: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub role: String,
    pub skills_offered: Vec<String>,
    pub badge_score: f64,
    pub badge_count: i64,
    pub availability: Availability,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            availability: user.availability(),
            uid: user.uid,
            name: user.name,
            avatar_url: user.avatar_url,
            role: user.role,
            skills_offered: user.skills_offered,
            badge_score: user.badge_score,
            badge_count: user.badge_count,
        }
    }
}

/// DTO for registration. Identity (uid, email) comes from the verified
/// token, never from the body.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name length must be between 1 and 100 characters."
    ))]
    pub name: String,
    pub role: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub skills_offered: Vec<String>,
    #[serde(default)]
    pub skills_wanted: Vec<String>,
    pub availability: Option<Availability>,
}

/// DTO for partial profile updates. At least one field must be present.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub skills_offered: Option<Vec<String>>,
    pub skills_wanted: Option<Vec<String>>,
    pub availability: Option<Availability>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.avatar_url.is_none()
            && self.skills_offered.is_none()
            && self.skills_wanted.is_none()
            && self.availability.is_none()
    }
}

/// Body of POST /api/profile/badges. The achievement system awards one
/// badge at a time by default.
#[derive(Debug, Deserialize, Validate)]
pub struct AwardBadgesRequest {
    #[validate(range(min = 1, max = 100, message = "increment must be between 1 and 100."))]
    pub increment: Option<i64>,
}

/// Body of POST /api/profile/calendar/sync.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSyncRequest {
    #[validate(length(min = 1, message = "accessToken is required."))]
    pub access_token: String,
}
