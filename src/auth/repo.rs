use crate::auth::repo_types::{FlowKind, Role, Session, User, VerificationRecord};
use sqlx::PgPool;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, username, email, contact_number, password_hash, \
     date_of_birth, gender, role, verified, created_at, updated_at";

/// Insert payload for a new user. The password is already hashed by the time
/// it reaches the repo.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub contact_number: String,
    pub password_hash: String,
    pub date_of_birth: Option<Date>,
    pub gender: Option<String>,
    pub role: Role,
}

impl User {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_contact_number(db: &PgPool, number: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE contact_number = $1"
        ))
        .bind(number)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn create(db: &PgPool, new: &NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users \
             (name, username, email, contact_number, password_hash, date_of_birth, gender, role) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.name)
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.contact_number)
        .bind(&new.password_hash)
        .bind(new.date_of_birth)
        .bind(&new.gender)
        .bind(new.role)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Replace the stored hash. Returns false when the user no longer exists.
    pub async fn update_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_verified(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET verified = TRUE, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl Session {
    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        token: &str,
        ip: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, token, ip, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, token, ip, expires_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(ip)
        .bind(expires_at)
        .fetch_one(db)
        .await?;
        Ok(session)
    }

    /// Whether this refresh token is still on ledger for this user. Gatekeeps
    /// refresh: a revoked session fails here even while the signature is valid.
    pub async fn exists(db: &PgPool, user_id: Uuid, token: &str) -> anyhow::Result<bool> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM sessions WHERE user_id = $1 AND token = $2)",
        )
        .bind(user_id)
        .bind(token)
        .fetch_one(db)
        .await?;
        Ok(found)
    }

    /// Remove a session. Returns false when the token was already absent,
    /// which callers treat as success (logout is idempotent).
    pub async fn delete_by_token(db: &PgPool, token: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl VerificationRecord {
    /// Drop any prior record for (user, flow) and insert the new one, so only
    /// the most recently issued code remains valid. Delete-then-insert is
    /// sufficient here: concurrent requests race last-write-wins by design.
    pub async fn replace_active(
        db: &PgPool,
        user_id: Uuid,
        flow: FlowKind,
        code: &str,
        token: &str,
        ip: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<VerificationRecord> {
        sqlx::query("DELETE FROM verification_tokens WHERE user_id = $1 AND flow = $2")
            .bind(user_id)
            .bind(flow)
            .execute(db)
            .await?;
        let record = sqlx::query_as::<_, VerificationRecord>(
            r#"
            INSERT INTO verification_tokens (user_id, flow, code, token, ip, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, flow, code, token, ip, expires_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(flow)
        .bind(code)
        .bind(token)
        .bind(ip)
        .bind(expires_at)
        .fetch_one(db)
        .await?;
        Ok(record)
    }

    pub async fn find_by_code(
        db: &PgPool,
        code: &str,
        flow: FlowKind,
    ) -> anyhow::Result<Option<VerificationRecord>> {
        let record = sqlx::query_as::<_, VerificationRecord>(
            r#"
            SELECT id, user_id, flow, code, token, ip, expires_at, created_at
            FROM verification_tokens
            WHERE code = $1 AND flow = $2
            "#,
        )
        .bind(code)
        .bind(flow)
        .fetch_optional(db)
        .await?;
        Ok(record)
    }

    pub async fn delete_active(db: &PgPool, user_id: Uuid, flow: FlowKind) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM verification_tokens WHERE user_id = $1 AND flow = $2")
            .bind(user_id)
            .bind(flow)
            .execute(db)
            .await?;
        Ok(())
    }
}
