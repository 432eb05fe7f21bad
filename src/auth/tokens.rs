use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::repo_types::Role;
use crate::config::TokenConfig;
use crate::state::AppState;

/// Token kind. Each kind signs with its own secret and lifetime, so a token
/// of one kind never verifies as another even if the claims happen to match.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TokenKind {
    Access,
    Refresh,
    PasswordReset,
    AccountVerification,
}

/// Bearer token payload. The userId/userRole/userIP field names are a wire
/// contract shared with existing clients. `jti` makes every issued token
/// unique even when two signings share user, IP, and timestamp.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    #[serde(rename = "userRole")]
    pub user_role: Role,
    #[serde(rename = "userIP")]
    pub user_ip: String,
    pub iat: usize,
    pub exp: usize,
    pub jti: Uuid,
    pub kind: TokenKind,
}

/// A freshly signed token together with the expiry embedded in it. Callers
/// that persist or advertise the expiry use this value rather than
/// recomputing it, so the two can never disagree.
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires: OffsetDateTime,
}

struct KindKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl KindKeys {
    fn from_config(config: &TokenConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            ttl: Duration::from_secs((config.expiration_minutes as u64) * 60),
        }
    }
}

/// Signing and verification keys for every token kind.
pub struct TokenKeys {
    access: KindKeys,
    refresh: KindKeys,
    password_reset: KindKeys,
    account_verification: KindKeys,
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(state: &AppState) -> Self {
        let jwt = &state.config.jwt;
        Self {
            access: KindKeys::from_config(&jwt.access),
            refresh: KindKeys::from_config(&jwt.refresh),
            password_reset: KindKeys::from_config(&jwt.password_reset),
            account_verification: KindKeys::from_config(&jwt.email_verification),
        }
    }
}

impl TokenKeys {
    fn for_kind(&self, kind: TokenKind) -> &KindKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
            TokenKind::PasswordReset => &self.password_reset,
            TokenKind::AccountVerification => &self.account_verification,
        }
    }

    pub fn sign(
        &self,
        user_id: Uuid,
        user_role: Role,
        user_ip: &str,
        kind: TokenKind,
    ) -> anyhow::Result<SignedToken> {
        let keys = self.for_kind(kind);
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(keys.ttl.as_secs() as i64);
        let claims = Claims {
            user_id,
            user_role,
            user_ip: user_ip.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            jti: Uuid::new_v4(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "token signed");
        Ok(SignedToken {
            token,
            expires: exp,
        })
    }

    /// Verify a token as the given kind. Bad signature, malformed input,
    /// expiry, and kind mismatch all collapse to `None`; callers cannot tell
    /// them apart and nothing is raised across this boundary.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Option<Claims> {
        let keys = self.for_kind(kind);
        let validation = Validation::default();
        let claims = match decode::<Claims>(token, &keys.decoding, &validation) {
            Ok(data) => data.claims,
            Err(err) => {
                debug!(kind = ?kind, error = %err, "token rejected");
                return None;
            }
        };
        if claims.kind != kind {
            debug!(expected = ?kind, got = ?claims.kind, "token kind mismatch");
            return None;
        }
        Some(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    fn make_keys() -> TokenKeys {
        TokenKeys::from_ref(&AppState::fake())
    }

    #[tokio::test]
    async fn sign_and_verify_roundtrip_for_every_kind() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        for kind in [
            TokenKind::Access,
            TokenKind::Refresh,
            TokenKind::PasswordReset,
            TokenKind::AccountVerification,
        ] {
            let signed = keys
                .sign(user_id, Role::Patient, "1.2.3.4", kind)
                .expect("sign");
            let claims = keys.verify(&signed.token, kind).expect("verify");
            assert_eq!(claims.user_id, user_id);
            assert_eq!(claims.user_role, Role::Patient);
            assert_eq!(claims.user_ip, "1.2.3.4");
            assert_eq!(claims.kind, kind);
        }
    }

    #[tokio::test]
    async fn verify_rejects_other_kinds() {
        let keys = make_keys();
        let signed = keys
            .sign(Uuid::new_v4(), Role::Doctor, "::1", TokenKind::Access)
            .expect("sign access");
        assert!(keys.verify(&signed.token, TokenKind::Refresh).is_none());
        assert!(keys.verify(&signed.token, TokenKind::PasswordReset).is_none());
    }

    #[tokio::test]
    async fn verify_rejects_tampered_and_malformed_tokens() {
        let keys = make_keys();
        let signed = keys
            .sign(Uuid::new_v4(), Role::Patient, "::1", TokenKind::Refresh)
            .expect("sign refresh");
        let mut tampered = signed.token.clone();
        tampered.truncate(signed.token.len() - 2);
        assert!(keys.verify(&tampered, TokenKind::Refresh).is_none());
        assert!(keys.verify("not-a-token", TokenKind::Refresh).is_none());
        assert!(keys.verify("", TokenKind::Access).is_none());
    }

    #[tokio::test]
    async fn advertised_expiry_matches_embedded_exp() {
        let keys = make_keys();
        let signed = keys
            .sign(Uuid::new_v4(), Role::Patient, "::1", TokenKind::Refresh)
            .expect("sign refresh");
        let claims = keys.verify(&signed.token, TokenKind::Refresh).expect("verify");
        assert_eq!(claims.exp as i64, signed.expires.unix_timestamp());
    }

    #[tokio::test]
    async fn repeated_signing_yields_distinct_tokens() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        // Same user, role, IP, and (likely) second; jti still separates them.
        let a = keys
            .sign(user_id, Role::Patient, "::1", TokenKind::Refresh)
            .expect("sign");
        let b = keys
            .sign(user_id, Role::Patient, "::1", TokenKind::Refresh)
            .expect("sign");
        assert_ne!(a.token, b.token);
    }

    #[tokio::test]
    async fn verify_rejects_expired_token() {
        let keys = make_keys();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        // Signed with the right secret but already past expiry (and past the
        // default 60s leeway).
        let claims = Claims {
            user_id: Uuid::new_v4(),
            user_role: Role::Patient,
            user_ip: "::1".into(),
            iat: (now - 600) as usize,
            exp: (now - 300) as usize,
            jti: Uuid::new_v4(),
            kind: TokenKind::Access,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-access-secret"),
        )
        .expect("encode");
        assert!(keys.verify(&token, TokenKind::Access).is_none());
    }

    #[test]
    fn claims_serialize_with_wire_field_names() {
        let claims = Claims {
            user_id: Uuid::new_v4(),
            user_role: Role::Admin,
            user_ip: "10.0.0.1".into(),
            iat: 0,
            exp: 0,
            jti: Uuid::new_v4(),
            kind: TokenKind::PasswordReset,
        };
        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains("\"userId\""));
        assert!(json.contains("\"userRole\":\"admin\""));
        assert!(json.contains("\"userIP\":\"10.0.0.1\""));
        assert!(json.contains("\"kind\":\"passwordReset\""));
    }
}
