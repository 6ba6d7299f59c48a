// SPDX-License-Identifier: MIT

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::{require_role, AuthUser};
use crate::models::{CalendarEvent, EventPatch, NewEvent, Role};
use crate::services::SyncSummary;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// API routes (require authentication via session token).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/auth/refresh-token", post(refresh_token))
        .route("/api/events", post(create_event).get(list_events))
        .route("/api/events/sync", post(sync_events))
        .route(
            "/api/events/{event_id}",
            get(get_event).put(update_event).delete(delete_event),
        )
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub role: Role,
    /// Whether a Google credential is on file
    pub google_connected: bool,
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let profile = state
        .db
        .get_user(&user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", user.user_id)))?;

    let google_connected = state.db.get_credential(&user.user_id).await?.is_some();

    Ok(Json(MeResponse {
        user_id: profile.user_id,
        email: profile.email,
        name: profile.name,
        picture: profile.picture,
        role: profile.role,
        google_connected,
    }))
}

// ─── Credential Refresh ──────────────────────────────────────

/// Renewed credential metadata. The raw tokens never leave the service.
#[derive(Serialize)]
pub struct RefreshTokenResponse {
    pub scope: String,
    pub token_type: String,
    pub expiry: String,
}

/// Force-renew the caller's Google credential.
async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<RefreshTokenResponse>> {
    let credential = state.auth_service.refresh_credential(&user.user_id).await?;

    Ok(Json(RefreshTokenResponse {
        scope: credential.scope,
        token_type: credential.token_type,
        expiry: credential.expiry,
    }))
}

// ─── Events ──────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct CreateEventRequest {
    #[validate(length(min = 1))]
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: Option<String>,
    /// Minutes before the event for the email reminder
    pub reminder_lead_time: Option<u32>,
}

/// Create an event locally and on the user's Google Calendar.
async fn create_event(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateEventRequest>,
) -> Result<Json<CalendarEvent>> {
    require_role(&user, Role::User)?;
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let event = state
        .calendar_service
        .add_event(NewEvent {
            user_id: user.user_id,
            title: body.title,
            description: body.description,
            start_time: body.start_time,
            end_time: body.end_time,
            location: body.location,
            reminder_lead_time: body.reminder_lead_time,
        })
        .await?;

    Ok(Json(event))
}

#[derive(Deserialize)]
struct ListEventsQuery {
    /// Admins may list another user's events
    user_id: Option<String>,
}

/// List events. Non-admins always get their own.
async fn list_events(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<Vec<CalendarEvent>>> {
    require_role(&user, Role::User)?;
    let target = resolve_target_user(&user, query.user_id)?;

    let events = state.calendar_service.list_events(&target).await?;
    Ok(Json(events))
}

/// Get a single event (own events only, unless admin).
async fn get_event(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<String>,
) -> Result<Json<CalendarEvent>> {
    require_role(&user, Role::User)?;

    let event = state.calendar_service.get_event(&event_id).await?;
    check_ownership(&user, &event)?;

    Ok(Json(event))
}

#[derive(Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub reminder_lead_time: Option<u32>,
}

/// Update an event locally and push the change to Google if it is synced.
async fn update_event(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<String>,
    Json(body): Json<UpdateEventRequest>,
) -> Result<Json<CalendarEvent>> {
    require_role(&user, Role::User)?;

    // Ownership check before mutating anything
    let existing = state.calendar_service.get_event(&event_id).await?;
    check_ownership(&user, &existing)?;

    let event = state
        .calendar_service
        .update_event(
            &event_id,
            EventPatch {
                title: body.title,
                description: body.description,
                start_time: body.start_time,
                end_time: body.end_time,
                location: body.location,
                reminder_lead_time: body.reminder_lead_time,
            },
        )
        .await?;

    Ok(Json(event))
}

/// Delete an event locally and from Google if it is synced.
async fn delete_event(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<String>,
) -> Result<Json<CalendarEvent>> {
    require_role(&user, Role::User)?;

    let existing = state.calendar_service.get_event(&event_id).await?;
    check_ownership(&user, &existing)?;

    let event = state.calendar_service.delete_event(&event_id).await?;
    Ok(Json(event))
}

#[derive(Deserialize)]
struct SyncQuery {
    /// Admins may reconcile another user's calendar
    user_id: Option<String>,
}

/// Run the remote→local reconciliation pass for a user's calendar.
async fn sync_events(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<SyncQuery>,
) -> Result<Json<SyncSummary>> {
    require_role(&user, Role::User)?;
    let target = resolve_target_user(&user, query.user_id)?;

    let summary = state.calendar_service.sync_events(&target).await?;
    Ok(Json(summary))
}

// ─── Helpers ─────────────────────────────────────────────────

/// Acting on another user's data requires admin.
fn resolve_target_user(user: &AuthUser, requested: Option<String>) -> Result<String> {
    match requested {
        Some(target) if target != user.user_id => {
            require_role(user, Role::Admin)?;
            Ok(target)
        }
        _ => Ok(user.user_id.clone()),
    }
}

fn check_ownership(user: &AuthUser, event: &CalendarEvent) -> Result<()> {
    if event.user_id == user.user_id || user.role == Role::Admin {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_user(role: Role) -> AuthUser {
        AuthUser {
            user_id: "user-1".to_string(),
            role,
        }
    }

    #[test]
    fn target_user_defaults_to_self() {
        let user = auth_user(Role::User);
        assert_eq!(resolve_target_user(&user, None).unwrap(), "user-1");
        assert_eq!(
            resolve_target_user(&user, Some("user-1".to_string())).unwrap(),
            "user-1"
        );
    }

    #[test]
    fn non_admin_cannot_target_other_users() {
        let user = auth_user(Role::User);
        assert!(matches!(
            resolve_target_user(&user, Some("user-2".to_string())),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn admin_may_target_other_users() {
        let admin = auth_user(Role::Admin);
        assert_eq!(
            resolve_target_user(&admin, Some("user-2".to_string())).unwrap(),
            "user-2"
        );
    }
}
