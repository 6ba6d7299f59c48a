// SPDX-License-Identifier: MIT

//! User and credential models for storage and API.

use serde::{Deserialize, Serialize};

/// Role assigned to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    /// Whether a user with this role may act at `required` level.
    /// Admins pass every gate.
    pub fn satisfies(self, required: Role) -> bool {
        self == Role::Admin || self == required
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Google account ID (also used as document ID)
    pub user_id: String,
    /// Email address, lowercased on write (unique)
    pub email: String,
    /// Display name
    pub name: String,
    /// Profile picture URL
    pub picture: Option<String>,
    /// Role for this service's own authorization
    #[serde(default)]
    pub role: Role,
    /// When the user first signed in
    pub created_at: String,
    /// Last profile update
    pub updated_at: String,
}

/// Per-user Google OAuth credential, stored in its own collection keyed by
/// user ID. A user without this record cannot perform any remote calendar
/// operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Bearer token for Google API calls
    pub access_token: String,
    /// Long-lived token used to renew the access token
    pub refresh_token: String,
    /// Space-separated granted scopes
    pub scope: String,
    /// Token type as reported by Google ("Bearer")
    pub token_type: String,
    /// Access token expiry (ISO 8601)
    pub expiry: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_satisfies_any_role() {
        assert!(Role::Admin.satisfies(Role::User));
        assert!(Role::Admin.satisfies(Role::Admin));
        assert!(Role::User.satisfies(Role::User));
        assert!(!Role::User.satisfies(Role::Admin));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }
}
