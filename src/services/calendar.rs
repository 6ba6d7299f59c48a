// SPDX-License-Identifier: MIT

//! Calendar synchronization engine.
//!
//! The only component that touches both the local event store and the remote
//! calendar. Consistency policy for every mutating operation:
//!
//! - the local write happens strictly before the remote call (local is the
//!   source of truth for durability, remote is a best-effort follow-up);
//! - a failed remote call is surfaced to the caller and never rolls back the
//!   committed local write;
//! - `sync_events` is an additive remote→local pass only; the remote-id claim
//!   is its idempotence guard.

use crate::db::firestore::RemoteEventRef;
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{CalendarEvent, EventPatch, NewEvent};
use crate::services::google_auth::AuthService;
use crate::services::google_calendar::{GoogleCalendarClient, RemoteEventPayload};
use chrono::Utc;
use serde::Serialize;

/// Result of a reconciliation pass. A summary, not the inserted records, so
/// the response stays bounded no matter how large the remote calendar is.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    /// Remote events imported into the local store
    pub inserted_count: u32,
    /// Remote events the local schema cannot represent (all-day, cancelled)
    pub skipped_count: u32,
}

/// Synchronization engine over the local store and the remote adapter.
#[derive(Clone)]
pub struct CalendarService {
    db: FirestoreDb,
    remote: GoogleCalendarClient,
    auth: AuthService,
    calendar_id: String,
}

impl CalendarService {
    pub fn new(
        db: FirestoreDb,
        remote: GoogleCalendarClient,
        auth: AuthService,
        calendar_id: String,
    ) -> Self {
        Self {
            db,
            remote,
            auth,
            calendar_id,
        }
    }

    /// Create an event locally, then create its remote counterpart.
    ///
    /// The credential gate runs before the local insert: a user who never
    /// connected a Google account gets `CredentialsUnavailable` and no local
    /// record. After the local insert the remote create is best-effort; on
    /// remote failure the local record stays, unsynced, and the failure is
    /// returned.
    pub async fn add_event(&self, new: NewEvent) -> Result<CalendarEvent, AppError> {
        new.validate()?;

        if self.db.get_user(&new.user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("user {}", new.user_id)));
        }

        let access_token = self.auth.valid_access_token(&new.user_id).await?;

        let now = Utc::now().to_rfc3339();
        let mut event = CalendarEvent::from_new(uuid::Uuid::new_v4().to_string(), &new, &now);
        self.db.insert_event(&event).await?;

        let payload = RemoteEventPayload::from_event(&event, new.reminder_lead_time);
        let remote = match self
            .remote
            .insert_event(&access_token, &self.calendar_id, &payload)
            .await
        {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!(
                    event_id = %event.event_id,
                    error = %e,
                    "Remote create failed; event kept locally unsynced"
                );
                return Err(e);
            }
        };

        if !self
            .db
            .claim_remote_id(&RemoteEventRef {
                remote_event_id: remote.id.clone(),
                event_id: event.event_id.clone(),
                user_id: event.user_id.clone(),
            })
            .await?
        {
            return Err(AppError::Database(format!(
                "remote event id {} already claimed",
                remote.id
            )));
        }

        event.mark_synced(remote.id, &Utc::now().to_rfc3339());
        self.db.set_event(&event).await?;

        tracing::info!(event_id = %event.event_id, "Event created and synced");
        Ok(event)
    }

    /// Apply a partial update locally, then push it to the remote calendar.
    ///
    /// A never-synced record skips the remote step entirely: it stays
    /// local-only until a reconciliation-style recovery. On a synced record a
    /// remote failure leaves the local update applied (the two sides have
    /// diverged); a remote not-found means the remote event was deleted out
    /// of band and the local record is stale.
    pub async fn update_event(
        &self,
        event_id: &str,
        patch: EventPatch,
    ) -> Result<CalendarEvent, AppError> {
        let mut event = self
            .db
            .get_event(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("event {}", event_id)))?;

        event.apply_patch(&patch, &Utc::now().to_rfc3339());
        event.validate()?;

        self.db.set_event(&event).await?;

        let remote_event_id = match &event.remote_event_id {
            Some(id) => id.clone(),
            None => {
                tracing::debug!(event_id, "Event never synced; skipping remote update");
                return Ok(event);
            }
        };

        let access_token = self.auth.valid_access_token(&event.user_id).await?;
        let payload = RemoteEventPayload::from_event(&event, patch.reminder_lead_time);

        self.remote
            .update_event(&access_token, &self.calendar_id, &remote_event_id, &payload)
            .await?;

        Ok(event)
    }

    /// Delete an event locally, then delete its remote counterpart.
    ///
    /// The remote id is captured before the local delete. A remote not-found
    /// is non-fatal (the event is already gone on both sides); any other
    /// remote failure is surfaced while the local delete stands; the event
    /// may linger on the remote calendar until a later cleanup.
    pub async fn delete_event(&self, event_id: &str) -> Result<CalendarEvent, AppError> {
        let event = self
            .db
            .get_event(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("event {}", event_id)))?;

        let remote_event_id = event.remote_event_id.clone();

        self.db.delete_event(event_id).await?;
        if let Some(remote_id) = &remote_event_id {
            self.db.delete_remote_ref(remote_id).await?;
        }

        if let Some(remote_id) = remote_event_id {
            let access_token = self.auth.valid_access_token(&event.user_id).await?;
            match self
                .remote
                .delete_event(&access_token, &self.calendar_id, &remote_id)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_remote_not_found() => {
                    tracing::warn!(event_id, remote_id = %remote_id, "Remote event already gone");
                }
                Err(e) => {
                    tracing::warn!(
                        event_id,
                        error = %e,
                        "Remote delete failed; event removed locally only"
                    );
                    return Err(e);
                }
            }
        }

        Ok(event)
    }

    /// Fetch a single event.
    pub async fn get_event(&self, event_id: &str) -> Result<CalendarEvent, AppError> {
        self.db
            .get_event(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("event {}", event_id)))
    }

    /// All events owned by a user (local store only).
    pub async fn list_events(&self, user_id: &str) -> Result<Vec<CalendarEvent>, AppError> {
        self.db.get_events_for_user(user_id).await
    }

    /// Reconciliation pass, remote→local only.
    ///
    /// Lists every remote event (paginating to exhaustion) and imports the
    /// ones whose id has no local claim yet, marked synced. Additive: never
    /// deletes local records whose remote counterpart vanished, never pushes
    /// local-only records to the remote side. Re-running with no remote-side
    /// changes inserts nothing; a losing concurrent claim skips cleanly.
    pub async fn sync_events(&self, user_id: &str) -> Result<SyncSummary, AppError> {
        if self.db.get_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("user {}", user_id)));
        }

        let access_token = self.auth.valid_access_token(user_id).await?;

        let mut inserted_count = 0u32;
        let mut skipped_count = 0u32;
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .remote
                .list_events(
                    &access_token,
                    &self.calendar_id,
                    None,
                    None,
                    page_token.as_deref(),
                    None,
                )
                .await?;

            for remote in &page.items {
                if self.db.get_remote_ref(&remote.id).await?.is_some() {
                    continue;
                }

                let fields = match remote.to_local_fields() {
                    Some(fields) => fields,
                    None => {
                        skipped_count += 1;
                        continue;
                    }
                };

                let event_id = uuid::Uuid::new_v4().to_string();
                let claimed = self
                    .db
                    .claim_remote_id(&RemoteEventRef {
                        remote_event_id: remote.id.clone(),
                        event_id: event_id.clone(),
                        user_id: user_id.to_string(),
                    })
                    .await?;
                if !claimed {
                    // Another pass imported this event between our lookup and
                    // the claim; their record wins.
                    continue;
                }

                let now = Utc::now().to_rfc3339();
                let event = CalendarEvent {
                    event_id,
                    user_id: user_id.to_string(),
                    title: fields.title,
                    description: fields.description,
                    start_time: fields.start_time,
                    end_time: fields.end_time,
                    location: fields.location,
                    remote_event_id: Some(remote.id.clone()),
                    synced: true,
                    created_at: now.clone(),
                    updated_at: now,
                };
                self.db.insert_event(&event).await?;
                inserted_count += 1;
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::info!(user_id, inserted_count, skipped_count, "Reconciliation pass complete");

        Ok(SyncSummary {
            inserted_count,
            skipped_count,
        })
    }
}
