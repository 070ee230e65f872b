//! Outbound email boundary.

pub mod in_memory;
#[cfg(feature = "smtp")]
pub mod smtp;

use async_trait::async_trait;
use thiserror::Error;

pub use in_memory::InMemoryEmailSender;
#[cfg(feature = "smtp")]
pub use smtp::SmtpEmailSender;

/// A rendered HTML email to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("invalid email address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to build email: {0}")]
    Build(String),

    #[error("mail transport failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

#[async_trait]
impl<S> EmailSender for std::sync::Arc<S>
where
    S: EmailSender + ?Sized,
{
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        (**self).send(message).await
    }
}
