use serde::Deserialize;

/// Secret and lifetime for one token kind. Expirations are whole minutes.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub secret: String,
    pub expiration_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access: TokenConfig,
    pub refresh: TokenConfig,
    pub password_reset: TokenConfig,
    pub email_verification: TokenConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    pub smtp_host: String,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_from: String,
    pub sms_gateway_url: String,
    pub sms_gateway_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub hash_cost: u32,
    pub delivery: DeliveryConfig,
}

fn env_minutes(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            access: TokenConfig {
                secret: std::env::var("ACCESS_TOKEN_SECRET")?,
                expiration_minutes: env_minutes("ACCESS_TOKEN_EXPIRATION", 15),
            },
            refresh: TokenConfig {
                secret: std::env::var("REFRESH_TOKEN_SECRET")?,
                expiration_minutes: env_minutes("REFRESH_TOKEN_EXPIRATION", 60 * 24 * 14),
            },
            password_reset: TokenConfig {
                secret: std::env::var("PASSWORD_RESET_TOKEN_SECRET")?,
                expiration_minutes: env_minutes("PASSWORD_RESET_TOKEN_EXPIRATION", 15),
            },
            email_verification: TokenConfig {
                secret: std::env::var("EMAIL_VERIFICATION_TOKEN_SECRET")?,
                expiration_minutes: env_minutes("EMAIL_VERIFICATION_TOKEN_EXPIRATION", 60),
            },
        };
        let hash_cost = std::env::var("HASH_SALT_ROUND")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(2);
        let delivery = DeliveryConfig {
            smtp_host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".into()),
            smtp_username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
            smtp_from: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| "no-reply@clinicore.local".into()),
            sms_gateway_url: std::env::var("SMS_GATEWAY_URL").unwrap_or_default(),
            sms_gateway_key: std::env::var("SMS_GATEWAY_KEY").unwrap_or_default(),
        };
        Ok(Self {
            database_url,
            jwt,
            hash_cost,
            delivery,
        })
    }
}
