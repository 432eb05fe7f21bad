use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    #[default]
    Patient,
    Doctor,
    Admin,
}

/// Discriminator scoping a one-time verification record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "camelCase")]
#[sqlx(type_name = "flow_kind", rename_all = "snake_case")]
pub enum FlowKind {
    PasswordReset,
    AccountVerification,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub contact_number: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2 hash, never exposed in JSON
    pub date_of_birth: Option<Date>,
    pub gender: Option<String>,
    pub role: Role,
    pub verified: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// One live refresh-token grant. Row existence is the source of truth for
/// refresh and logout; expiry alone does not remove it.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub ip: String,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

/// One pending password-reset or account-verification attempt. At most one
/// active row per (user_id, flow).
#[derive(Debug, Clone, FromRow)]
pub struct VerificationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub flow: FlowKind,
    pub code: String,
    pub token: String,
    pub ip: String,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn user_serialization_strips_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Test Person".into(),
            username: Some("testp".into()),
            email: Some("test@example.com".into()),
            contact_number: "01712345678".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            date_of_birth: None,
            gender: None,
            role: Role::Patient,
            verified: true,
            created_at: datetime!(2024-01-01 0:00 UTC),
            updated_at: datetime!(2024-01-01 0:00 UTC),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2id"));
        assert!(json.contains("test@example.com"));
    }

    #[test]
    fn role_defaults_to_patient() {
        assert_eq!(Role::default(), Role::Patient);
    }
}
