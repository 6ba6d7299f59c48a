// SPDX-License-Identifier: MIT

//! Application configuration loaded from environment variables.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Google OAuth ---
    /// OAuth client ID (public)
    pub google_client_id: String,
    /// OAuth client secret
    pub google_client_secret: String,
    /// Redirect URI registered with Google for the OAuth callback
    pub google_redirect_uri: String,

    // --- Service ---
    /// Frontend URL for post-login redirects
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Calendar used when a request does not name one
    pub default_calendar_id: String,
    /// Outbound HTTP timeout in seconds (Google OAuth + Calendar calls)
    pub http_timeout_secs: u64,

    // --- Sessions ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Session token lifetime in hours. The corpus shipped both 24h and 1h
    /// revisions; the TTL is a deployment policy, not a constant.
    pub session_ttl_hours: u64,
    /// Key used to sign the OAuth state parameter
    pub oauth_state_key: Vec<u8>,
    /// Enable the dev-only mock login endpoint
    pub allow_mock_login: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_ID"))?,
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_SECRET"))?,
            google_redirect_uri: env::var("GOOGLE_REDIRECT_URI")
                .map_err(|_| ConfigError::Missing("GOOGLE_REDIRECT_URI"))?,

            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            default_calendar_id: env::var("DEFAULT_CALENDAR_ID")
                .unwrap_or_else(|_| "primary".to_string()),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            session_ttl_hours: env::var("SESSION_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),
            allow_mock_login: env::var("ALLOW_MOCK_LOGIN")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }

    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            google_client_id: "test-client.apps.googleusercontent.com".to_string(),
            google_client_secret: "test_secret".to_string(),
            google_redirect_uri: "http://localhost:8080/auth/google/callback".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            default_calendar_id: "primary".to_string(),
            http_timeout_secs: 5,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            session_ttl_hours: 24,
            oauth_state_key: b"test_state_key".to_vec(),
            allow_mock_login: true,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
