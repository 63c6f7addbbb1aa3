//! Models that represent users and authentication payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::types::UserId;
use crate::validation::rules;

#[derive(Debug, Clone, FromRow)]
/// Database representation of a user account.
pub struct User {
    /// Unique, positive identifier for the user.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Unique contact address.
    pub email: String,
    /// Argon2 PHC string of the user's password.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to insert a user; the id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Deserialize, Validate)]
/// Payload for creating a new user account.
pub struct RegisterRequest {
    #[validate(custom(function = "rules::validate_username"))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(custom(function = "rules::validate_password"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
/// Credentials submitted by a user attempting to authenticate.
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
/// Refresh token exchanged for a new token pair.
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUsernameRequest {
    #[validate(custom(function = "rules::validate_username"))]
    pub username: String,
}

#[derive(Debug, Deserialize)]
/// Password confirmation required before removing an account.
pub struct DeleteAccountRequest {
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
/// Raw tokens handed to the client after login or refresh.
///
/// This is the only place raw token values leave the server.
pub struct LoginResponse {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Public-facing representation of a user returned by the API.
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_validates_fields() {
        let valid = RegisterRequest {
            username: "alice_1".into(),
            email: "alice@example.com".into(),
            password: "correct horse".into(),
        };
        assert!(valid.validate().is_ok());

        let invalid = RegisterRequest {
            username: "al".into(),
            email: "not-an-email".into(),
            password: "short".into(),
        };
        let errors = invalid.validate().expect_err("invalid payload");
        let fields = errors.field_errors();
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn user_response_omits_password_hash() {
        let user = User {
            id: UserId::new(7).expect("id"),
            username: "bob".into(),
            email: "bob@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(UserResponse::from(user)).expect("json");
        assert_eq!(json["id"], 7);
        assert_eq!(json["username"], "bob");
        assert!(json.get("password_hash").is_none());
    }
}
