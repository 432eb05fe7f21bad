use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde_json::json;
use tracing::debug;

use crate::config::DeliveryConfig;

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn send_email(&self, message: EmailMessage) -> anyhow::Result<()>;
    async fn send_sms(&self, number: &str, message: &str) -> anyhow::Result<()>;
}

/// Production delivery: email over SMTP, SMS through an HTTP gateway.
pub struct Delivery {
    smtp: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    http: reqwest::Client,
    sms_url: String,
    sms_key: String,
}

impl Delivery {
    pub fn new(config: &DeliveryConfig) -> anyhow::Result<Self> {
        let smtp = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
            .credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
            .build();
        Ok(Self {
            smtp,
            from: config.smtp_from.clone(),
            http: reqwest::Client::new(),
            sms_url: config.sms_gateway_url.clone(),
            sms_key: config.sms_gateway_key.clone(),
        })
    }
}

#[async_trait]
impl DeliveryClient for Delivery {
    async fn send_email(&self, message: EmailMessage) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from.parse().context("parse smtp from address")?)
            .to(message.to.parse().context("parse recipient address")?)
            .subject(message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)?;
        self.smtp.send(email).await.context("smtp send")?;
        debug!(to = %message.to, "email delivered");
        Ok(())
    }

    async fn send_sms(&self, number: &str, message: &str) -> anyhow::Result<()> {
        let response = self
            .http
            .post(&self.sms_url)
            .bearer_auth(&self.sms_key)
            .json(&json!({ "number": number, "message": message }))
            .send()
            .await
            .context("sms gateway request")?;
        if !response.status().is_success() {
            anyhow::bail!("sms gateway returned {}", response.status());
        }
        debug!(number = %number, "sms delivered");
        Ok(())
    }
}
