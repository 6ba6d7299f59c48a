// SPDX-License-Identifier: MIT

//! Calendar event model for storage and API.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Locally stored calendar event.
///
/// Created locally first, always; the Google counterpart is created as a
/// best-effort follow-up. `remote_event_id` and `synced` are back-filled
/// together once the remote create succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Event ID (also used as document ID)
    pub event_id: String,
    /// Owning user ID
    pub user_id: String,
    /// Event title
    pub title: String,
    /// Free-form description
    pub description: Option<String>,
    /// Start instant (UTC)
    pub start_time: DateTime<Utc>,
    /// End instant (UTC)
    pub end_time: DateTime<Utc>,
    /// Free-form location
    pub location: Option<String>,
    /// ID assigned by Google Calendar once synced; unique across all events
    pub remote_event_id: Option<String>,
    /// Whether a remote counterpart is confirmed to exist
    #[serde(default)]
    pub synced: bool,
    /// When this record was created (ISO 8601)
    pub created_at: String,
    /// Last local mutation (ISO 8601)
    pub updated_at: String,
}

impl CalendarEvent {
    /// Build a fresh local-only record from validated input.
    pub fn from_new(event_id: String, new: &NewEvent, now: &str) -> Self {
        Self {
            event_id,
            user_id: new.user_id.clone(),
            title: new.title.clone(),
            description: new.description.clone(),
            start_time: new.start_time,
            end_time: new.end_time,
            location: new.location.clone(),
            remote_event_id: None,
            synced: false,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }

    /// Record a confirmed remote counterpart. Sets both fields together so
    /// the `synced ⇒ remote_event_id` invariant holds in every stored state.
    pub fn mark_synced(&mut self, remote_event_id: String, now: &str) {
        self.remote_event_id = Some(remote_event_id);
        self.synced = true;
        self.updated_at = now.to_string();
    }

    /// Apply a partial update. Absent fields are left unchanged.
    pub fn apply_patch(&mut self, patch: &EventPatch, now: &str) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(start_time) = patch.start_time {
            self.start_time = start_time;
        }
        if let Some(end_time) = patch.end_time {
            self.end_time = end_time;
        }
        if let Some(location) = &patch.location {
            self.location = Some(location.clone());
        }
        self.updated_at = now.to_string();
    }

    /// Field-level checks shared by the create and update paths.
    pub fn validate(&self) -> Result<(), AppError> {
        validate_fields(&self.title, &self.user_id, self.start_time, self.end_time)
    }
}

/// Input for creating an event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: Option<String>,
    /// Minutes before the event for the email reminder on the Google side
    pub reminder_lead_time: Option<u32>,
}

impl NewEvent {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_fields(&self.title, &self.user_id, self.start_time, self.end_time)
    }
}

/// Partial update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    /// Lead time to use when pushing the update to Google
    pub reminder_lead_time: Option<u32>,
}

fn validate_fields(
    title: &str,
    user_id: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".to_string()));
    }
    if user_id.is_empty() {
        return Err(AppError::Validation("owning user is required".to_string()));
    }
    if end_time < start_time {
        return Err(AppError::Validation(
            "end time must not be before start time".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_new_event() -> NewEvent {
        NewEvent {
            user_id: "user-1".to_string(),
            title: "Standup".to_string(),
            description: Some("daily".to_string()),
            start_time: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 1, 1, 9, 15, 0).unwrap(),
            location: Some("Room 1".to_string()),
            reminder_lead_time: Some(15),
        }
    }

    #[test]
    fn valid_event_passes() {
        assert!(sample_new_event().validate().is_ok());
    }

    #[test]
    fn empty_title_rejected() {
        let mut event = sample_new_event();
        event.title = "   ".to_string();
        assert!(matches!(event.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn end_before_start_rejected() {
        let mut event = sample_new_event();
        event.end_time = event.start_time - chrono::Duration::minutes(1);
        assert!(matches!(event.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn zero_length_event_allowed() {
        let mut event = sample_new_event();
        event.end_time = event.start_time;
        assert!(event.validate().is_ok());
    }

    #[test]
    fn mark_synced_sets_both_fields() {
        let new = sample_new_event();
        let mut event = CalendarEvent::from_new("ev-1".to_string(), &new, "2024-01-01T00:00:00Z");
        assert!(!event.synced);
        assert!(event.remote_event_id.is_none());

        event.mark_synced("remote-1".to_string(), "2024-01-01T00:01:00Z");
        assert!(event.synced);
        assert_eq!(event.remote_event_id.as_deref(), Some("remote-1"));
    }

    #[test]
    fn patch_leaves_absent_fields_unchanged() {
        let new = sample_new_event();
        let mut event = CalendarEvent::from_new("ev-1".to_string(), &new, "2024-01-01T00:00:00Z");

        let patch = EventPatch {
            title: Some("Retro".to_string()),
            ..Default::default()
        };
        event.apply_patch(&patch, "2024-01-02T00:00:00Z");

        assert_eq!(event.title, "Retro");
        assert_eq!(event.description.as_deref(), Some("daily"));
        assert_eq!(event.location.as_deref(), Some("Room 1"));
        assert_eq!(event.updated_at, "2024-01-02T00:00:00Z");
    }
}
