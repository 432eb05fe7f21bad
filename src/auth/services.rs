use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::code::generate_code;
use crate::auth::dto::{AuthResponse, IssuedToken, RegisterRequest, TokenPair};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo::NewUser;
use crate::auth::repo_types::{FlowKind, Session, User, VerificationRecord};
use crate::auth::tokens::{TokenKeys, TokenKind};
use crate::delivery::EmailMessage;
use crate::error::{store_error, ApiError};
use crate::state::AppState;

/// A login/reset identifier, classified once and used consistently by every
/// flow that resolves users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Email(String),
    Phone(String),
    Username(String),
}

pub fn classify(raw: &str) -> Identifier {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
        static ref PHONE_RE: Regex = Regex::new(r"^[0-9]{11}$").unwrap();
    }
    if EMAIL_RE.is_match(raw) {
        Identifier::Email(raw.to_string())
    } else if PHONE_RE.is_match(raw) {
        Identifier::Phone(raw.to_string())
    } else {
        Identifier::Username(raw.to_string())
    }
}

async fn find_by_identifier(
    state: &AppState,
    identifier: &Identifier,
) -> anyhow::Result<Option<User>> {
    match identifier {
        Identifier::Email(email) => User::find_by_email(&state.db, email).await,
        Identifier::Phone(number) => User::find_by_contact_number(&state.db, number).await,
        Identifier::Username(username) => User::find_by_username(&state.db, username).await,
    }
}

pub async fn register(state: &AppState, payload: RegisterRequest) -> Result<User, ApiError> {
    if payload.password.len() < 8 {
        return Err(ApiError::BadRequest("Password too short".into()));
    }
    if let Some(ref email) = payload.email {
        if User::find_by_email(&state.db, email).await?.is_some() {
            return Err(ApiError::Conflict(
                "The email that you have entered already exists".into(),
            ));
        }
    }
    if let Some(ref username) = payload.username {
        if User::find_by_username(&state.db, username).await?.is_some() {
            return Err(ApiError::Conflict(
                "The username that you have entered already exists".into(),
            ));
        }
    }
    if User::find_by_contact_number(&state.db, &payload.contact_number)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "The contact number that you have entered already exists".into(),
        ));
    }

    let password_hash = hash_password(&payload.password, state.config.hash_cost)?;
    // Two registrations can still race past the checks above; a unique
    // violation from the insert maps to Conflict, not a 500.
    let user = User::create(
        &state.db,
        &NewUser {
            name: payload.name,
            username: payload.username,
            email: payload.email,
            contact_number: payload.contact_number,
            password_hash,
            date_of_birth: payload.date_of_birth,
            gender: payload.gender,
            role: payload.role.unwrap_or_default(),
        },
    )
    .await
    .map_err(store_error)?;
    info!(user_id = %user.id, "user registered");
    Ok(user)
}

/// Login: resolve the identifier, check the password, require a verified
/// account, then issue an access/refresh pair and put the refresh token on
/// the session ledger.
pub async fn login(
    state: &AppState,
    identifier: &str,
    password: &str,
    ip: &str,
) -> Result<AuthResponse, ApiError> {
    let identifier = classify(identifier);
    let user = find_by_identifier(state, &identifier)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    if !user.verified {
        warn!(user_id = %user.id, "login on unverified account");
        return Err(ApiError::Unauthorized("User not verified".into()));
    }

    let keys = TokenKeys::from_ref(state);
    let access = keys.sign(user.id, user.role, ip, TokenKind::Access)?;
    let refresh = keys.sign(user.id, user.role, ip, TokenKind::Refresh)?;

    // The ledger row carries the same expiry the token embeds.
    Session::create(&state.db, user.id, &refresh.token, ip, refresh.expires).await?;
    info!(user_id = %user.id, "user logged in");

    Ok(AuthResponse {
        user: user.into(),
        tokens: TokenPair {
            access_token: IssuedToken {
                token: access.token,
                expires: access.expires,
            },
            refresh_token: IssuedToken {
                token: refresh.token,
                expires: refresh.expires,
            },
        },
    })
}

/// Exchange a live refresh token for a new access token. The ledger check
/// makes an explicitly logged-out token unusable even while its signature
/// and expiry are still valid. The refresh token is not rotated.
pub async fn refresh(state: &AppState, refresh_token: &str) -> Result<String, ApiError> {
    let keys = TokenKeys::from_ref(state);
    let claims = keys
        .verify(refresh_token, TokenKind::Refresh)
        .ok_or_else(|| ApiError::Forbidden("Refresh token verification failed".into()))?;

    if !Session::exists(&state.db, claims.user_id, refresh_token).await? {
        warn!(user_id = %claims.user_id, "refresh against revoked session");
        return Err(ApiError::Forbidden(
            "Refresh token verification failed".into(),
        ));
    }

    let access = keys.sign(
        claims.user_id,
        claims.user_role,
        &claims.user_ip,
        TokenKind::Access,
    )?;
    debug!(user_id = %claims.user_id, "access token refreshed");
    Ok(access.token)
}

/// Log out: the refresh token must verify and must belong to the caller, so
/// a stolen-but-valid token cannot be cleared with someone else's access
/// token. Deleting an already-absent session still counts as logged out.
pub async fn logout(state: &AppState, caller_id: Uuid, refresh_token: &str) -> Result<(), ApiError> {
    let keys = TokenKeys::from_ref(state);
    let claims = keys
        .verify(refresh_token, TokenKind::Refresh)
        .ok_or_else(|| ApiError::Forbidden("Refresh token verification failed".into()))?;

    if claims.user_id != caller_id {
        warn!(caller = %caller_id, token_owner = %claims.user_id, "logout user mismatch");
        return Err(ApiError::Forbidden(
            "Refresh token verification failed".into(),
        ));
    }

    let removed = Session::delete_by_token(&state.db, refresh_token).await?;
    info!(user_id = %caller_id, removed, "user logged out");
    Ok(())
}

fn flow_token_kind(flow: FlowKind) -> TokenKind {
    match flow {
        FlowKind::PasswordReset => TokenKind::PasswordReset,
        FlowKind::AccountVerification => TokenKind::AccountVerification,
    }
}

fn flow_subject(flow: FlowKind) -> &'static str {
    match flow {
        FlowKind::PasswordReset => "Password Reset Request",
        FlowKind::AccountVerification => "User Verification Request",
    }
}

/// Initiate a one-time-code flow: resolve the user by email or contact
/// number, generate a code plus a signed token, deliver the code on the
/// channel the identifier implies, and only then replace the active ledger
/// record. A delivery failure aborts before any ledger write.
pub async fn request_code(
    state: &AppState,
    reference: &str,
    ip: &str,
    flow: FlowKind,
) -> Result<(), ApiError> {
    let identifier = classify(reference);
    let kind_label = match identifier {
        Identifier::Email(_) => "email address",
        Identifier::Phone(_) => "contact number",
        Identifier::Username(_) => {
            return Err(ApiError::BadRequest(
                "A valid email address or contact number is required".into(),
            ))
        }
    };

    let user = find_by_identifier(state, &identifier)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("Your provided {kind_label} could not be found"))
        })?;

    if flow == FlowKind::AccountVerification && user.verified {
        return Err(ApiError::Conflict("User already verified".into()));
    }

    let code = generate_code();
    let keys = TokenKeys::from_ref(state);
    let signed = keys.sign(user.id, user.role, ip, flow_token_kind(flow))?;

    let message = format!("Dear {},\n\nYour OTP is {}.\n\nThank you.", user.name, code);
    match identifier {
        Identifier::Phone(ref number) => {
            state.delivery.send_sms(number, &message).await?;
        }
        _ => {
            let email = user
                .email
                .clone()
                .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("user matched by email has none")))?;
            state
                .delivery
                .send_email(EmailMessage {
                    to: email,
                    subject: flow_subject(flow).into(),
                    body: message,
                })
                .await?;
        }
    }

    VerificationRecord::replace_active(
        &state.db,
        user.id,
        flow,
        &code,
        &signed.token,
        ip,
        signed.expires,
    )
    .await?;
    info!(user_id = %user.id, flow = ?flow, "one-time code issued");
    Ok(())
}

/// Step A of the password reset: exchange the delivered code for the signed
/// reset token. The ledger record stays until the final confirm succeeds.
pub async fn get_reset_token(state: &AppState, code: &str) -> Result<String, ApiError> {
    let record = VerificationRecord::find_by_code(&state.db, code, FlowKind::PasswordReset)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid code".into()))?;

    let keys = TokenKeys::from_ref(state);
    if keys.verify(&record.token, TokenKind::PasswordReset).is_none() {
        return Err(ApiError::Unauthorized(
            "Verification code expired. Please initiate a new password reset request.".into(),
        ));
    }

    Ok(record.token)
}

/// Step B of the password reset: the bearer reset token authorizes a
/// password change, after which the active record is cleared.
pub async fn confirm_password_reset(
    state: &AppState,
    bearer_token: &str,
    new_password: &str,
) -> Result<(), ApiError> {
    let keys = TokenKeys::from_ref(state);
    let claims = keys
        .verify(bearer_token, TokenKind::PasswordReset)
        .ok_or_else(|| ApiError::Forbidden("Token verification failed".into()))?;

    let password_hash = hash_password(new_password, state.config.hash_cost)?;
    if !User::update_password(&state.db, claims.user_id, &password_hash).await? {
        return Err(ApiError::NotFound("User not found".into()));
    }

    VerificationRecord::delete_active(&state.db, claims.user_id, FlowKind::PasswordReset).await?;
    info!(user_id = %claims.user_id, "password reset completed");
    Ok(())
}

/// Confirm account verification from the delivered code: the stored signed
/// token must still verify, then the user is flagged verified and the record
/// removed.
pub async fn confirm_verification(state: &AppState, code: &str) -> Result<(), ApiError> {
    let record = VerificationRecord::find_by_code(&state.db, code, FlowKind::AccountVerification)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid code".into()))?;

    let keys = TokenKeys::from_ref(state);
    if keys
        .verify(&record.token, TokenKind::AccountVerification)
        .is_none()
    {
        return Err(ApiError::Unauthorized(
            "Verification token expired. Please initiate a new verification request.".into(),
        ));
    }

    if !User::mark_verified(&state.db, record.user_id).await? {
        return Err(ApiError::NotFound("User not found".into()));
    }

    VerificationRecord::delete_active(&state.db, record.user_id, FlowKind::AccountVerification)
        .await?;
    info!(user_id = %record.user_id, "account verified");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::Role;

    #[test]
    fn classify_prefers_email_then_phone_then_username() {
        assert_eq!(
            classify("user@example.com"),
            Identifier::Email("user@example.com".into())
        );
        assert_eq!(
            classify("01712345678"),
            Identifier::Phone("01712345678".into())
        );
        // 10 digits is not a contact number, falls through to username
        assert_eq!(
            classify("0171234567"),
            Identifier::Username("0171234567".into())
        );
        assert_eq!(classify("jdoe"), Identifier::Username("jdoe".into()));
        // malformed email is treated as a username, not rejected
        assert_eq!(
            classify("user@@example"),
            Identifier::Username("user@@example".into())
        );
    }

    #[test]
    fn flow_mappings_are_stable() {
        assert_eq!(
            flow_token_kind(FlowKind::PasswordReset),
            TokenKind::PasswordReset
        );
        assert_eq!(
            flow_token_kind(FlowKind::AccountVerification),
            TokenKind::AccountVerification
        );
        assert_eq!(flow_subject(FlowKind::PasswordReset), "Password Reset Request");
    }

    // The rejection branches below all return before any database access,
    // so the fake state's lazy pool is never touched.

    #[tokio::test]
    async fn logout_rejects_refresh_token_of_another_user() {
        let state = AppState::fake();
        let keys = TokenKeys::from_ref(&state);
        let owner = Uuid::new_v4();
        let signed = keys
            .sign(owner, Role::Patient, "::1", TokenKind::Refresh)
            .expect("sign refresh");
        let err = logout(&state, Uuid::new_v4(), &signed.token)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn logout_rejects_garbage_refresh_token() {
        let state = AppState::fake();
        let err = logout(&state, Uuid::new_v4(), "not-a-token")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn logout_rejects_access_token_presented_as_refresh() {
        let state = AppState::fake();
        let keys = TokenKeys::from_ref(&state);
        let user_id = Uuid::new_v4();
        let signed = keys
            .sign(user_id, Role::Patient, "::1", TokenKind::Access)
            .expect("sign access");
        let err = logout(&state, user_id, &signed.token).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn refresh_rejects_garbage_token() {
        let state = AppState::fake();
        let err = refresh(&state, "garbage").await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn refresh_rejects_password_reset_token() {
        let state = AppState::fake();
        let keys = TokenKeys::from_ref(&state);
        let signed = keys
            .sign(Uuid::new_v4(), Role::Patient, "::1", TokenKind::PasswordReset)
            .expect("sign reset");
        let err = refresh(&state, &signed.token).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}
