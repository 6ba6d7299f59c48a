// SPDX-License-Identifier: MIT

//! Session token middleware.
//!
//! Session tokens are this service's own short-lived JWTs, deliberately
//! decoupled from the Google OAuth credential: a leaked session token must
//! not grant remote-calendar access, and expires on its own schedule.

use crate::error::AppError;
use crate::models::Role;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "calsync_token";

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Role carried into authorization checks
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from a session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
}

/// Mint a session token for a user.
pub fn issue_session_token(
    user_id: &str,
    role: Role,
    signing_key: &[u8],
    ttl_hours: u64,
) -> Result<String, AppError> {
    let now = chrono::Utc::now().timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        role,
        iat: now,
        exp: now + (ttl_hours as usize) * 60 * 60,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("session token encoding failed: {}", e)))
}

/// Verify a session token. Expired, malformed, and forged tokens all
/// collapse to `InvalidSession`.
pub fn verify_session_token(token: &str, signing_key: &[u8]) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|_| AppError::InvalidSession)
}

/// Middleware that requires a valid session token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Try cookie first, then header
    let token = if let Some(cookie) = jar.get(SESSION_COOKIE) {
        cookie.value().to_string()
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header {
            Some(h) if h.starts_with("Bearer ") => h[7..].to_string(),
            _ => return Err(AppError::Unauthorized),
        }
    };

    let claims = verify_session_token(&token, &state.config.jwt_signing_key)?;

    let auth_user = AuthUser {
        user_id: claims.sub,
        role: claims.role,
    };
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Role gate with admin override.
pub fn require_role(user: &AuthUser, required: Role) -> Result<(), AppError> {
    if user.role.satisfies(required) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"test_signing_key_32_bytes_long!!";

    #[test]
    fn role_gate_admin_override() {
        let admin = AuthUser {
            user_id: "a".to_string(),
            role: Role::Admin,
        };
        let user = AuthUser {
            user_id: "u".to_string(),
            role: Role::User,
        };

        assert!(require_role(&admin, Role::User).is_ok());
        assert!(require_role(&admin, Role::Admin).is_ok());
        assert!(require_role(&user, Role::User).is_ok());
        assert!(matches!(
            require_role(&user, Role::Admin),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn session_token_round_trip() {
        let token = issue_session_token("user-42", Role::User, KEY, 24).unwrap();
        let claims = verify_session_token(&token, KEY).unwrap();

        assert_eq!(claims.sub, "user-42");
        assert_eq!(claims.role, Role::User);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_key_is_invalid_session() {
        let token = issue_session_token("user-42", Role::User, KEY, 24).unwrap();
        let result = verify_session_token(&token, b"another_key_entirely_32_bytes!!!");
        assert!(matches!(result, Err(AppError::InvalidSession)));
    }

    #[test]
    fn garbage_token_is_invalid_session() {
        assert!(matches!(
            verify_session_token("not-a-jwt", KEY),
            Err(AppError::InvalidSession)
        ));
    }
}
