// src/notify/mod.rs
pub mod email;

use anyhow::Result;
use async_trait::async_trait;

pub use email::EmailDispatcher;

/// Delivery boundary: the core hands over a finished subject/body pair.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn dispatch(&self, subject: &str, body: &str, recipient: &str) -> Result<()>;
}

/// Logs alerts instead of sending them (dry runs).
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

#[async_trait]
impl AlertDispatcher for LogDispatcher {
    async fn dispatch(&self, subject: &str, body: &str, recipient: &str) -> Result<()> {
        tracing::info!(%subject, %recipient, "dry run alert\n{body}");
        Ok(())
    }
}

/// Where each channel goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipients {
    /// Forecast + generic ballot channel.
    pub forecasts: String,
    pub polls: String,
}

impl Recipients {
    /// `TEXT_RECIPIENT` for forecasts, `EMAIL_RECIPIENT` for polls.
    pub fn from_env() -> Result<Self> {
        use anyhow::Context;
        Ok(Self {
            forecasts: std::env::var("TEXT_RECIPIENT").context("TEXT_RECIPIENT missing")?,
            polls: std::env::var("EMAIL_RECIPIENT").context("EMAIL_RECIPIENT missing")?,
        })
    }
}
