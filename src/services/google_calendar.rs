// SPDX-License-Identifier: MIT

//! Google Calendar API adapter.
//!
//! Performs exactly four remote operations (insert, update, delete, list)
//! against one calendar id, and owns the local↔remote event mapping. No
//! retries here; retry policy belongs to callers.

use crate::error::{AppError, RemoteApiCause, RemoteOperation};
use crate::models::CalendarEvent;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Base URL for Google Calendar API v3.
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Reminder lead time applied when the caller does not specify one.
const DEFAULT_REMINDER_MINUTES: u32 = 30;

/// Page size used when the caller does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Google Calendar API client.
#[derive(Clone)]
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    base_url: String,
}

impl GoogleCalendarClient {
    /// Create a new calendar client.
    pub fn new(timeout: std::time::Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client");

        Self {
            http,
            base_url: CALENDAR_API_BASE.to_string(),
        }
    }

    /// Point the client at an alternate API base (tests).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    /// Create an event on the remote calendar.
    pub async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        payload: &RemoteEventPayload,
    ) -> Result<RemoteEvent, AppError> {
        let op = RemoteOperation::Insert;
        let response = self
            .http
            .post(self.events_url(calendar_id))
            .bearer_auth(access_token)
            .query(&[("sendUpdates", "all")])
            .json(payload)
            .send()
            .await
            .map_err(|e| transport_error(op, e))?;

        parse_json(op, response).await
    }

    /// Overwrite an existing remote event.
    pub async fn update_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        remote_event_id: &str,
        payload: &RemoteEventPayload,
    ) -> Result<RemoteEvent, AppError> {
        let op = RemoteOperation::Update;
        let url = format!(
            "{}/{}",
            self.events_url(calendar_id),
            urlencoding::encode(remote_event_id)
        );

        let response = self
            .http
            .put(&url)
            .bearer_auth(access_token)
            .query(&[("sendUpdates", "all")])
            .json(payload)
            .send()
            .await
            .map_err(|e| transport_error(op, e))?;

        parse_json(op, response).await
    }

    /// Delete a remote event. A vanished remote event surfaces as a
    /// `NotFound` cause, which callers may treat as already-deleted.
    pub async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        remote_event_id: &str,
    ) -> Result<(), AppError> {
        let op = RemoteOperation::Delete;
        let url = format!(
            "{}/{}",
            self.events_url(calendar_id),
            urlencoding::encode(remote_event_id)
        );

        let response = self
            .http
            .delete(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport_error(op, e))?;

        if response.status().is_success() {
            return Ok(());
        }
        Err(status_error(op, response).await)
    }

    /// Fetch one page of remote events.
    ///
    /// An absent time bound means unbounded on that side. The caller follows
    /// `next_page_token` to exhaustion; the fetch is restartable from any
    /// token.
    pub async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        time_min: Option<DateTime<Utc>>,
        time_max: Option<DateTime<Utc>>,
        page_token: Option<&str>,
        page_size: Option<u32>,
    ) -> Result<RemoteEventPage, AppError> {
        let op = RemoteOperation::List;

        let mut request = self
            .http
            .get(self.events_url(calendar_id))
            .bearer_auth(access_token)
            .query(&[(
                "maxResults",
                page_size.unwrap_or(DEFAULT_PAGE_SIZE).to_string(),
            )]);

        if let Some(min) = time_min {
            request = request.query(&[("timeMin", min.to_rfc3339())]);
        }
        if let Some(max) = time_max {
            request = request.query(&[("timeMax", max.to_rfc3339())]);
        }
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request.send().await.map_err(|e| transport_error(op, e))?;

        parse_json(op, response).await
    }
}

/// Map a reqwest error to the adapter taxonomy. Timeouts must surface as a
/// typed cause, never hang or get swallowed.
fn transport_error(operation: RemoteOperation, e: reqwest::Error) -> AppError {
    let cause = if e.is_timeout() {
        RemoteApiCause::Timeout
    } else {
        RemoteApiCause::Transport(e.to_string())
    };
    AppError::remote(operation, cause)
}

/// Classify a non-success response.
async fn status_error(operation: RemoteOperation, response: reqwest::Response) -> AppError {
    let status = response.status();
    let cause = match status.as_u16() {
        // 410 Gone is what Google returns for recently deleted events.
        404 | 410 => RemoteApiCause::NotFound,
        401 | 403 => RemoteApiCause::Unauthorized,
        429 => {
            tracing::warn!("Google Calendar rate limit hit (429)");
            RemoteApiCause::RateLimited
        }
        _ => RemoteApiCause::Api {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        },
    };
    AppError::remote(operation, cause)
}

async fn parse_json<T: for<'de> Deserialize<'de>>(
    operation: RemoteOperation,
    response: reqwest::Response,
) -> Result<T, AppError> {
    if !response.status().is_success() {
        return Err(status_error(operation, response).await);
    }

    response.json().await.map_err(|e| {
        AppError::remote(
            operation,
            RemoteApiCause::Transport(format!("JSON parse error: {}", e)),
        )
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types and local↔remote mapping
// ─────────────────────────────────────────────────────────────────────────────

/// Outgoing event representation for insert/update.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEventPayload {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: RemoteEventTime,
    pub end: RemoteEventTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub reminders: RemoteReminders,
}

impl RemoteEventPayload {
    /// Map a local event to its remote representation.
    ///
    /// title→summary, start/end instants→start.dateTime/end.dateTime, and an
    /// email reminder override at `reminder_lead_time` (default 30) minutes.
    pub fn from_event(event: &CalendarEvent, reminder_lead_time: Option<u32>) -> Self {
        Self {
            summary: event.title.clone(),
            description: event.description.clone(),
            start: RemoteEventTime::instant(event.start_time),
            end: RemoteEventTime::instant(event.end_time),
            location: event.location.clone(),
            reminders: RemoteReminders {
                use_default: false,
                overrides: vec![RemoteReminderOverride {
                    method: "email".to_string(),
                    minutes: reminder_lead_time.unwrap_or(DEFAULT_REMINDER_MINUTES),
                }],
            },
        }
    }
}

/// Event time on the wire. Timed events carry `dateTime`; all-day events
/// carry `date` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl RemoteEventTime {
    fn instant(at: DateTime<Utc>) -> Self {
        Self {
            date_time: Some(at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            date: None,
        }
    }

    fn parse_instant(&self) -> Option<DateTime<Utc>> {
        let raw = self.date_time.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Reminder settings pushed with every insert/update.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteReminders {
    pub use_default: bool,
    pub overrides: Vec<RemoteReminderOverride>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoteReminderOverride {
    pub method: String,
    pub minutes: u32,
}

/// Remote event as returned by the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEvent {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub start: Option<RemoteEventTime>,
    pub end: Option<RemoteEventTime>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Local-schema fields recovered from a remote event.
#[derive(Debug, Clone)]
pub struct LocalEventFields {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: Option<String>,
}

impl RemoteEvent {
    /// Map back to the local schema.
    ///
    /// Returns `None` for events the local schema cannot represent: cancelled
    /// events and all-day events (no `dateTime` on start/end).
    pub fn to_local_fields(&self) -> Option<LocalEventFields> {
        if self.status.as_deref() == Some("cancelled") {
            return None;
        }

        let start_time = self.start.as_ref()?.parse_instant()?;
        let end_time = self.end.as_ref()?.parse_instant()?;

        Some(LocalEventFields {
            title: self.summary.clone().unwrap_or_default(),
            description: self.description.clone(),
            start_time,
            end_time,
            location: self.location.clone(),
        })
    }
}

/// One page of remote events plus an optional continuation token.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEventPage {
    #[serde(default)]
    pub items: Vec<RemoteEvent>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}
