// src/services/calendar.rs

//! External calendar collaborator, specified at its interface boundary:
//! given an access token it reports busy intervals for a window and can
//! create an event with an attendee. The trait exists so tests and other
//! deployments can inject a double instead of the Google-backed client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::services::availability::Interval;

/// Calls that hang block availability sync, so they are bounded.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const REFERENCE_TZ_NAME: &str = "Asia/Kolkata";

#[derive(Debug, Clone)]
pub struct EventRequest {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub attendee_email: String,
}

#[derive(Debug, Clone)]
pub struct CreatedEvent {
    pub id: String,
    pub html_link: Option<String>,
}

#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Busy intervals for the user's primary calendar in `[from, to)`.
    async fn free_busy(
        &self,
        access_token: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Interval>, AppError>;

    /// Creates an event with one attendee, returning its id and link.
    async fn create_event(
        &self,
        access_token: &str,
        event: &EventRequest,
    ) -> Result<CreatedEvent, AppError>;
}

/// Google Calendar REST client.
pub struct GoogleCalendar {
    http: reqwest::Client,
    base: String,
}

impl GoogleCalendar {
    pub fn new(base: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FreeBusyQuery {
    time_min: DateTime<Utc>,
    time_max: DateTime<Utc>,
    time_zone: &'static str,
    items: Vec<FreeBusyItem>,
}

#[derive(Serialize)]
struct FreeBusyItem {
    id: &'static str,
}

#[derive(Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: HashMap<String, CalendarBusy>,
}

#[derive(Deserialize, Default)]
struct CalendarBusy {
    #[serde(default)]
    busy: Vec<Interval>,
}

#[derive(Serialize)]
struct EventBody<'a> {
    summary: &'a str,
    description: &'a str,
    start: EventTime,
    end: EventTime,
    attendees: Vec<Attendee<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: DateTime<Utc>,
    time_zone: &'static str,
}

#[derive(Serialize)]
struct Attendee<'a> {
    email: &'a str,
}

#[derive(Deserialize)]
struct EventResponse {
    id: String,
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
}

#[async_trait]
impl CalendarApi for GoogleCalendar {
    async fn free_busy(
        &self,
        access_token: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Interval>, AppError> {
        let url = format!("{}/calendar/v3/freeBusy", self.base);
        let body = FreeBusyQuery {
            time_min: from,
            time_max: to,
            time_zone: REFERENCE_TZ_NAME,
            items: vec![FreeBusyItem { id: "primary" }],
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::InternalServerError(format!("Calendar freeBusy: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::InternalServerError(format!(
                "Calendar freeBusy returned {}",
                response.status()
            )));
        }

        let parsed: FreeBusyResponse = response
            .json()
            .await
            .map_err(|e| AppError::InternalServerError(format!("Calendar freeBusy: {}", e)))?;

        let busy = parsed
            .calendars
            .get("primary")
            .map(|c| c.busy.clone())
            .unwrap_or_default();

        tracing::info!("Retrieved {} busy intervals from calendar", busy.len());
        Ok(busy)
    }

    async fn create_event(
        &self,
        access_token: &str,
        event: &EventRequest,
    ) -> Result<CreatedEvent, AppError> {
        let url = format!("{}/calendar/v3/calendars/primary/events", self.base);
        let body = EventBody {
            summary: &event.summary,
            description: &event.description,
            start: EventTime {
                date_time: event.start,
                time_zone: REFERENCE_TZ_NAME,
            },
            end: EventTime {
                date_time: event.end,
                time_zone: REFERENCE_TZ_NAME,
            },
            attendees: vec![Attendee {
                email: &event.attendee_email,
            }],
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::InternalServerError(format!("Calendar event: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::InternalServerError(format!(
                "Calendar event insert returned {}",
                response.status()
            )));
        }

        let parsed: EventResponse = response
            .json()
            .await
            .map_err(|e| AppError::InternalServerError(format!("Calendar event: {}", e)))?;

        tracing::info!("Created calendar event: {}", parsed.id);
        Ok(CreatedEvent {
            id: parsed.id,
            html_link: parsed.html_link,
        })
    }
}
