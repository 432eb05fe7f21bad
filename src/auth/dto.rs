use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::auth::repo_types::{Role, User};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub contact_number: String,
    pub password: String,
    pub date_of_birth: Option<Date>,
    pub gender: Option<String>,
    pub role: Option<Role>,
}

/// Request body for login. The identifier may be an email, an 11-digit
/// contact number, or a username.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

/// Request body for token refresh and logout. Absence of the token is a
/// distinct failure (Unauthorized) from an invalid one (Forbidden).
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Request body for initiating a password reset or account verification.
#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub reference: String,
}

/// Request body for the final password-reset step. The reset token itself
/// travels as a bearer credential, not in the body.
#[derive(Debug, Deserialize)]
pub struct ConfirmResetRequest {
    pub new_password: String,
    pub confirm_password: String,
}

/// A signed token together with its absolute expiry.
#[derive(Debug, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: IssuedToken,
    pub refresh_token: IssuedToken,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct ResetTokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Public part of the user returned to clients; the password hash is stripped.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub contact_number: String,
    pub date_of_birth: Option<Date>,
    pub gender: Option<String>,
    pub role: Role,
    pub verified: bool,
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            username: user.username,
            email: user.email,
            contact_number: user.contact_number,
            date_of_birth: user.date_of_birth,
            gender: user.gender,
            role: user.role,
            verified: user.verified,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn public_user_has_no_password_field() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Test Person".into(),
            username: None,
            email: Some("test@example.com".into()),
            contact_number: "01712345678".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            date_of_birth: None,
            gender: None,
            role: Role::Doctor,
            verified: false,
            created_at: datetime!(2024-06-01 0:00 UTC),
            updated_at: datetime!(2024-06-01 0:00 UTC),
        };
        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("argon2id"));
        assert!(json.contains("\"role\":\"doctor\""));
    }
}
