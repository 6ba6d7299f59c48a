// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile storage, unique lowercased email)
//! - Credentials (per-user Google OAuth tokens)
//! - Events (local calendar event records)
//! - Remote refs (uniqueness claims on Google event ids)

use crate::db::collections;
use crate::error::AppError;
use crate::models::{CalendarEvent, StoredCredential, User};
use serde::{Deserialize, Serialize};

/// Uniqueness claim for a Google Calendar event id.
///
/// Document id is the remote event id itself; the claim is created with
/// create-only semantics, so the second writer for the same remote id fails
/// instead of silently overwriting the first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEventRef {
    /// Google Calendar event id (also the document id)
    pub remote_event_id: String,
    /// Local event that owns this remote id
    pub event_id: String,
    /// Owning user
    pub user_id: String,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by Google account id.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Look up a user by email. Emails are lowercased on write, so the
    /// lookup normalizes the same way.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let email = email.trim().to_lowercase();
        let mut users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("email").eq(&email)]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(users.pop())
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.user_id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Credential Operations ───────────────────────────────────

    /// Get the stored Google credential for a user.
    pub async fn get_credential(
        &self,
        user_id: &str,
    ) -> Result<Option<StoredCredential>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CREDENTIALS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store the Google credential for a user.
    pub async fn set_credential(
        &self,
        user_id: &str,
        credential: &StoredCredential,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CREDENTIALS)
            .document_id(user_id)
            .object(credential)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Event Operations ────────────────────────────────────────

    /// Get an event by id.
    pub async fn get_event(&self, event_id: &str) -> Result<Option<CalendarEvent>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::EVENTS)
            .obj()
            .one(event_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a new event record. Fails if the document already exists.
    pub async fn insert_event(&self, event: &CalendarEvent) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::EVENTS)
            .document_id(&event.event_id)
            .object(event)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Overwrite an existing event record.
    pub async fn set_event(&self, event: &CalendarEvent) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::EVENTS)
            .document_id(&event.event_id)
            .object(event)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete an event record.
    pub async fn delete_event(&self, event_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::EVENTS)
            .document_id(event_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// All events owned by a user, ordered by start time.
    pub async fn get_events_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<CalendarEvent>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::EVENTS)
            .filter(move |q| q.for_all([q.field("user_id").eq(&user_id)]))
            .order_by([(
                "start_time",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Remote Ref Operations ───────────────────────────────────

    /// Try to claim a remote event id for a local event.
    ///
    /// Returns `Ok(true)` if the claim was created, `Ok(false)` if another
    /// event already holds this remote id. The create-only insert is the
    /// uniqueness constraint: the losing writer of a concurrent duplicate
    /// gets a conflict, never a silent overwrite.
    pub async fn claim_remote_id(&self, claim: &RemoteEventRef) -> Result<bool, AppError> {
        let result: Result<(), firestore::errors::FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::REMOTE_REFS)
            .document_id(&claim.remote_event_id)
            .object(claim)
            .execute()
            .await;

        match result {
            Ok(()) => Ok(true),
            Err(firestore::errors::FirestoreError::DataConflictError(_)) => Ok(false),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    /// Look up the claim for a remote event id.
    pub async fn get_remote_ref(
        &self,
        remote_event_id: &str,
    ) -> Result<Option<RemoteEventRef>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::REMOTE_REFS)
            .obj()
            .one(remote_event_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Release the claim for a remote event id (on local delete).
    pub async fn delete_remote_ref(&self, remote_event_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::REMOTE_REFS)
            .document_id(remote_event_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Find the local event holding a remote event id, if any.
    pub async fn find_event_by_remote_id(
        &self,
        remote_event_id: &str,
    ) -> Result<Option<CalendarEvent>, AppError> {
        match self.get_remote_ref(remote_event_id).await? {
            Some(claim) => self.get_event(&claim.event_id).await,
            None => Ok(None),
        }
    }
}
