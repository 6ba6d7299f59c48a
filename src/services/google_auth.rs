// SPDX-License-Identifier: MIT

//! Google OAuth2 client and credential lifecycle management.
//!
//! Handles:
//! - Consent URL construction (offline access, forced consent)
//! - Authorization-code exchange
//! - Token refresh when expired, serialized per user
//! - Userinfo fetch for the OAuth callback

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{Role, StoredCredential, User};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Scopes requested at consent: calendar read/write plus identity.
const SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
];

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Shared per-user refresh locks type for use in AppState.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Low-level Google OAuth2 client.
#[derive(Clone)]
pub struct GoogleAuthClient {
    http: reqwest::Client,
    token_url: String,
    userinfo_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleAuthClient {
    /// Create a new OAuth client.
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        timeout: std::time::Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client");

        Self {
            http,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    /// Point the client at alternate OAuth endpoints (tests).
    pub fn with_endpoints(mut self, token_url: String, userinfo_url: String) -> Self {
        self.token_url = token_url;
        self.userinfo_url = userinfo_url;
        self
    }

    /// Build the Google consent URL.
    ///
    /// `access_type=offline` plus `prompt=consent` guarantees a refresh token
    /// is issued even on repeat consent. No side effects.
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
             access_type=offline&prompt=consent&state={}",
            GOOGLE_AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&SCOPES.join(" ")),
            urlencoding::encode(state),
        )
    }

    /// Exchange a one-time authorization code for a token set.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::TokenExchange(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Google code exchange failed");
            return Err(AppError::TokenExchange(format!("HTTP {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::TokenExchange(format!("invalid token response: {}", e)))
    }

    /// Renew an access token using a stored refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::TokenRefresh(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Google token refresh rejected");
            return Err(AppError::TokenRefresh(format!("HTTP {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::TokenRefresh(format!("invalid token response: {}", e)))
    }

    /// Fetch the profile of the account that granted consent.
    pub async fn fetch_userinfo(&self, access_token: &str) -> Result<GoogleUserInfo, AppError> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::TokenExchange(format!("userinfo request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::TokenExchange(format!(
                "userinfo returned HTTP {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::TokenExchange(format!("invalid userinfo response: {}", e)))
    }
}

/// Token set from Google's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Absent on refresh responses; the stored refresh token is retained.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Turn a token response into a storable credential.
    ///
    /// `fallback_refresh` supplies the previous refresh token for refresh
    /// responses, where Google omits it.
    pub fn into_credential(
        self,
        fallback_refresh: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<StoredCredential, AppError> {
        let refresh_token = match self.refresh_token.or_else(|| {
            fallback_refresh.map(|t| t.to_string())
        }) {
            Some(t) => t,
            None => {
                return Err(AppError::TokenExchange(
                    "no refresh token in response".to_string(),
                ))
            }
        };

        let expiry = now + Duration::seconds(self.expires_in.unwrap_or(3600));

        Ok(StoredCredential {
            access_token: self.access_token,
            refresh_token,
            scope: self.scope.unwrap_or_default(),
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expiry: expiry.to_rfc3339(),
        })
    }
}

/// Userinfo payload (OAuth2 v2).
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserInfo {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// AuthService - credential lifecycle on top of the client
// ─────────────────────────────────────────────────────────────────────────────

/// High-level auth service: OAuth callback handling and credential renewal.
///
/// Concurrent refreshes for the same user are serialized by a per-user async
/// mutex rather than racing last-write-wins on the credential record.
#[derive(Clone)]
pub struct AuthService {
    client: GoogleAuthClient,
    db: FirestoreDb,
    refresh_locks: RefreshLocks,
}

impl AuthService {
    pub fn new(client: GoogleAuthClient, db: FirestoreDb) -> Self {
        Self {
            client,
            db,
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    /// Build the consent URL for the signed state parameter.
    pub fn authorization_url(&self, state: &str) -> String {
        self.client.authorization_url(state)
    }

    /// Handle the OAuth callback: exchange the code, fetch the profile,
    /// upsert the user, and persist the credential.
    pub async fn handle_oauth_callback(&self, code: &str) -> Result<User, AppError> {
        let tokens = self.client.exchange_code(code).await?;
        let info = self.client.fetch_userinfo(&tokens.access_token).await?;

        let now = Utc::now().to_rfc3339();
        let email = info.email.trim().to_lowercase();

        // Preserve role and creation time across repeat logins.
        let user = match self.db.get_user(&info.id).await? {
            Some(mut existing) => {
                existing.email = email;
                existing.name = info.name.unwrap_or(existing.name);
                existing.picture = info.picture.or(existing.picture);
                existing.updated_at = now.clone();
                existing
            }
            None => User {
                user_id: info.id.clone(),
                email,
                name: info.name.unwrap_or_default(),
                picture: info.picture,
                role: Role::User,
                created_at: now.clone(),
                updated_at: now.clone(),
            },
        };

        self.db.upsert_user(&user).await?;

        let credential = tokens.into_credential(None, Utc::now())?;
        self.db.set_credential(&user.user_id, &credential).await?;

        tracing::info!(user_id = %user.user_id, "OAuth callback handled, user and credential stored");

        Ok(user)
    }

    /// Force-renew the stored credential for a user.
    ///
    /// On refresh failure the stored credential is left untouched; the caller
    /// must restart authorization from `authorization_url`.
    pub async fn refresh_credential(&self, user_id: &str) -> Result<StoredCredential, AppError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let current = self
            .db
            .get_credential(user_id)
            .await?
            .ok_or(AppError::CredentialsUnavailable)?;

        self.refresh_locked(user_id, &current).await
    }

    /// A non-expired access token for the user, refreshing if the stored one
    /// is within the expiry margin.
    ///
    /// This is the `CredentialsUnavailable` gate for every remote calendar
    /// operation: it runs before any request mapping.
    pub async fn valid_access_token(&self, user_id: &str) -> Result<String, AppError> {
        let credential = self
            .db
            .get_credential(user_id)
            .await?
            .ok_or(AppError::CredentialsUnavailable)?;

        if !is_expiring(&credential)? {
            return Ok(credential.access_token);
        }

        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        // Re-check after acquiring the lock: another task may have refreshed
        // while we were waiting.
        let credential = self
            .db
            .get_credential(user_id)
            .await?
            .ok_or(AppError::CredentialsUnavailable)?;

        if !is_expiring(&credential)? {
            return Ok(credential.access_token);
        }

        tracing::info!(user_id, "Access token expired, refreshing");
        let renewed = self.refresh_locked(user_id, &credential).await?;
        Ok(renewed.access_token)
    }

    /// Perform the refresh with the per-user lock already held.
    async fn refresh_locked(
        &self,
        user_id: &str,
        current: &StoredCredential,
    ) -> Result<StoredCredential, AppError> {
        let tokens = self.client.refresh(&current.refresh_token).await?;
        let renewed = tokens.into_credential(Some(&current.refresh_token), Utc::now())?;
        self.db.set_credential(user_id, &renewed).await?;

        tracing::info!(user_id, "Credential refreshed and stored");
        Ok(renewed)
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Whether the credential's access token is expired or expiring soon.
fn is_expiring(credential: &StoredCredential) -> Result<bool, AppError> {
    let expiry = DateTime::parse_from_rfc3339(&credential.expiry)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to parse expiry: {}", e)))?
        .with_timezone(&Utc);

    Ok(Utc::now() + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) >= expiry)
}
