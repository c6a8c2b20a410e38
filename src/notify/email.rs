use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::AlertDispatcher;

const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// SMTP over implicit TLS (port 465), authenticated as the sender.
pub struct EmailDispatcher {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailDispatcher {
    /// Reads `EMAIL_SENDER`, `EMAIL_PASSWORD` and optional `SMTP_HOST`.
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("SMTP_HOST").unwrap_or_else(|_| DEFAULT_SMTP_HOST.to_string());
        let sender = std::env::var("EMAIL_SENDER").context("EMAIL_SENDER missing")?;
        let pass = std::env::var("EMAIL_PASSWORD").context("EMAIL_PASSWORD missing")?;

        let creds = Credentials::new(sender.clone(), pass);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .with_context(|| format!("invalid SMTP_HOST {host}"))?
            .credentials(creds)
            .build();
        let from = sender.parse().context("invalid EMAIL_SENDER")?;

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl AlertDispatcher for EmailDispatcher {
    async fn dispatch(&self, subject: &str, body: &str, recipient: &str) -> Result<()> {
        let to: Mailbox = recipient
            .parse()
            .with_context(|| format!("invalid recipient {recipient}"))?;
        let msg = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }
}
