/// Outbound mail
///
/// Verification codes are delivered by a [`Mailer`]. Messages are raw
/// RFC 5322 text with headers and body.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers `message` from `from` to `to`
    async fn send(&self, from: &str, to: &str, message: &str) -> Result<(), MailError>;
}

/// Renders the verification code email
pub fn verification_message(from_name: &str, from_addr: &str, to: &str, code: &str) -> String {
    format!(
        "Subject: Your verification code\nFrom: {from_name} <{from_addr}>\nTo: {to}\n\nYour code is {code}\n"
    )
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, from: &str, to: &str, message: &str) -> Result<(), MailError> {
        info!(from, to, %message, "Mail not delivered, logged instead");
        Ok(())
    }
}

/// A message captured by [`MemoryMailer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub from: String,
    pub to: String,
    pub message: String,
}

/// Keeps messages in memory
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far, oldest first
    pub async fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, from: &str, to: &str, message: &str) -> Result<(), MailError> {
        self.sent.lock().await.push(SentMail {
            from: from.to_string(),
            to: to.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}
