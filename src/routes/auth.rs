// SPDX-License-Identifier: MIT

//! Google OAuth authentication routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::issue_session_token;
use crate::models::{Role, User};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/google", get(auth_start))
        .route("/auth/google/callback", get(auth_callback))
        .route("/auth/mock-google", post(mock_login))
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to redirect back to after OAuth completes.
    /// If not provided, uses the configured frontend URL.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Start OAuth flow - redirect to Google's consent page.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
) -> Result<Redirect> {
    let frontend_url = params
        .redirect_uri
        .unwrap_or_else(|| state.config.frontend_url.clone());

    // Encode frontend URL + timestamp in the signed state parameter
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    let state_payload = format!("{}|{:x}", frontend_url, timestamp);

    let mut mac = HmacSha256::new_from_slice(&state.config.oauth_state_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(state_payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed_state = format!("{}|{}", state_payload, hex::encode(signature));
    let oauth_state = URL_SAFE_NO_PAD.encode(signed_state.as_bytes());

    let auth_url = state.auth_service.authorization_url(&oauth_state);

    tracing::info!(frontend_url = %frontend_url, "Starting OAuth flow, redirecting to Google");

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, create session.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    // Decode and verify frontend URL from state parameter
    let frontend_url = params
        .state
        .as_deref()
        .and_then(|s| verify_and_decode_state(s, &state.config.oauth_state_key))
        .unwrap_or_else(|| {
            tracing::warn!(
                "Invalid or tampered state parameter, falling back to default frontend URL"
            );
            state.config.frontend_url.clone()
        });

    // Check for OAuth errors (user denied, etc.)
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        let redirect = format!("{}?error={}", frontend_url, urlencoding::encode(&error));
        return Ok(Redirect::temporary(&redirect));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::Validation("missing authorization code".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");

    let user = state.auth_service.handle_oauth_callback(&code).await?;

    tracing::info!(user_id = %user.user_id, "OAuth successful, user and credential stored");

    let token = issue_session_token(
        &user.user_id,
        user.role,
        &state.config.jwt_signing_key,
        state.config.session_ttl_hours,
    )?;

    let redirect_url = format!("{}/callback?token={}", frontend_url, token);

    Ok(Redirect::temporary(&redirect_url))
}

/// Verify HMAC signature and decode the frontend URL from the OAuth state
/// parameter.
fn verify_and_decode_state(state: &str, secret: &[u8]) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "frontend_url|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    if parts.len() != 3 {
        return None;
    }

    let frontend_url = parts[0];
    let timestamp_hex = parts[1];
    let signature_hex = parts[2];

    let payload = format!("{}|{}", frontend_url, timestamp_hex);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());

    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if signature_hex != expected_signature {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    Some(frontend_url.to_string())
}

// ─── Mock Login (development only) ───────────────────────────

#[derive(Deserialize, Validate)]
pub struct MockLoginRequest {
    #[validate(email)]
    email: String,
    #[validate(length(min = 1))]
    name: String,
}

#[derive(Serialize)]
pub struct MockLoginResponse {
    token: String,
    user_id: String,
}

/// Dev-only login that creates a user WITHOUT a Google credential. Useful
/// for exercising the API before connecting a Google account; any remote
/// calendar operation for such a user fails with `credentials_unavailable`.
async fn mock_login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MockLoginRequest>,
) -> Result<Json<MockLoginResponse>> {
    if !state.config.allow_mock_login {
        return Err(AppError::NotFound("no such route".to_string()));
    }

    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let email = body.email.trim().to_lowercase();

    let user = match state.db.find_user_by_email(&email).await? {
        Some(user) => user,
        None => {
            let now = chrono::Utc::now().to_rfc3339();
            let user = User {
                user_id: uuid::Uuid::new_v4().to_string(),
                email,
                name: body.name,
                picture: None,
                role: Role::User,
                created_at: now.clone(),
                updated_at: now,
            };
            state.db.upsert_user(&user).await?;
            user
        }
    };

    let token = issue_session_token(
        &user.user_id,
        user.role,
        &state.config.jwt_signing_key,
        state.config.session_ttl_hours,
    )?;

    Ok(Json(MockLoginResponse {
        token,
        user_id: user.user_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_and_decode_state_success() {
        let secret = b"secret_key";
        let frontend_url = "https://example.com";
        let timestamp = 1234567890u128;

        let payload = format!("{}|{:x}", frontend_url, timestamp);
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        let state_data = format!("{}|{}", payload, signature);
        let encoded_state = URL_SAFE_NO_PAD.encode(state_data.as_bytes());

        let result = verify_and_decode_state(&encoded_state, secret);
        assert_eq!(result, Some(frontend_url.to_string()));
    }

    #[test]
    fn verify_and_decode_state_invalid_signature() {
        let secret = b"secret_key";
        let payload = format!("{}|{:x}", "https://example.com", 1234567890u128);

        let state_data = format!("{}|{}", payload, "invalid_signature");
        let encoded_state = URL_SAFE_NO_PAD.encode(state_data.as_bytes());

        assert_eq!(verify_and_decode_state(&encoded_state, secret), None);
    }

    #[test]
    fn verify_and_decode_state_wrong_secret() {
        let secret = b"secret_key";
        let frontend_url = "https://example.com";

        let payload = format!("{}|{:x}", frontend_url, 1234567890u128);
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        let state_data = format!("{}|{}", payload, signature);
        let encoded_state = URL_SAFE_NO_PAD.encode(state_data.as_bytes());

        assert_eq!(verify_and_decode_state(&encoded_state, b"wrong_key"), None);
    }

    #[test]
    fn verify_and_decode_state_malformed() {
        let encoded_state = URL_SAFE_NO_PAD.encode("invalid|format");
        assert_eq!(verify_and_decode_state(&encoded_state, b"secret_key"), None);
    }
}
