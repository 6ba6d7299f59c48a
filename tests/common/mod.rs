// SPDX-License-Identifier: MIT

use calsync::config::Config;
use calsync::db::FirestoreDb;
use calsync::middleware::auth::issue_session_token;
use calsync::models::{Role, StoredCredential, User};
use calsync::routes::create_router;
use calsync::services::{AuthService, CalendarService, GoogleAuthClient, GoogleCalendarClient};
use calsync::AppState;
use std::sync::Arc;
use std::time::Duration;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Generate a unique user ID for test isolation.
#[allow(dead_code)]
pub fn unique_user_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test-user-{}", nanos)
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Auth service whose Google endpoints point at a wiremock server.
#[allow(dead_code)]
pub fn auth_service_with(db: FirestoreDb, mock_base: &str) -> AuthService {
    let config = Config::test_default();
    let client = GoogleAuthClient::new(
        config.google_client_id,
        config.google_client_secret,
        config.google_redirect_uri,
        Duration::from_secs(5),
    )
    .with_endpoints(
        format!("{}/token", mock_base),
        format!("{}/userinfo", mock_base),
    );
    AuthService::new(client, db)
}

/// Calendar service whose remote API points at a wiremock server.
#[allow(dead_code)]
pub fn calendar_service_with(db: FirestoreDb, auth: AuthService, mock_base: &str) -> CalendarService {
    let client =
        GoogleCalendarClient::new(Duration::from_secs(5)).with_base_url(mock_base.to_string());
    CalendarService::new(db, client, auth, "primary".to_string())
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = test_db_offline();

    let auth_client = GoogleAuthClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.google_redirect_uri.clone(),
        Duration::from_secs(5),
    );
    let auth_service = AuthService::new(auth_client, db.clone());

    let calendar_client = GoogleCalendarClient::new(Duration::from_secs(5));
    let calendar_service = CalendarService::new(
        db.clone(),
        calendar_client,
        auth_service.clone(),
        config.default_calendar_id.clone(),
    );

    let state = Arc::new(AppState {
        config,
        db,
        auth_service,
        calendar_service,
    });

    (create_router(state.clone()), state)
}

/// A session token signed with the test config key.
#[allow(dead_code)]
pub fn session_token_for(user_id: &str, role: Role) -> String {
    let config = Config::test_default();
    issue_session_token(user_id, role, &config.jwt_signing_key, 1).unwrap()
}

/// Store a basic test user.
#[allow(dead_code)]
pub async fn seed_user(db: &FirestoreDb, user_id: &str) -> User {
    let now = chrono::Utc::now().to_rfc3339();
    let user = User {
        user_id: user_id.to_string(),
        email: format!("{}@example.com", user_id),
        name: "Test User".to_string(),
        picture: None,
        role: Role::User,
        created_at: now.clone(),
        updated_at: now,
    };
    db.upsert_user(&user).await.unwrap();
    user
}

/// Store a non-expiring credential so remote calls skip the refresh path.
#[allow(dead_code)]
pub async fn seed_credential(db: &FirestoreDb, user_id: &str) -> StoredCredential {
    let credential = StoredCredential {
        access_token: format!("access-{}", user_id),
        refresh_token: format!("refresh-{}", user_id),
        scope: "https://www.googleapis.com/auth/calendar".to_string(),
        token_type: "Bearer".to_string(),
        expiry: (chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339(),
    };
    db.set_credential(user_id, &credential).await.unwrap();
    credential
}
