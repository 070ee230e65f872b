//! Send-welcome-email use case, also the handler of the welcome queue.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, instrument};

use userhub_events::{EventHandler, UserCreated};
use userhub_infra::{EmailError, EmailSender};

use crate::welcome::WelcomeEmail;

/// The welcome email could not be handed to the mail server.
///
/// Carries the sender's error unchanged; the consumer requeues the message.
#[derive(Debug, Error)]
#[error("welcome email to {recipient} not delivered: {source}")]
pub struct NotificationDeliveryError {
    pub recipient: String,
    #[source]
    pub source: EmailError,
}

pub struct SendWelcomeEmail<S> {
    sender: S,
}

impl<S: EmailSender> SendWelcomeEmail<S> {
    pub fn new(sender: S) -> Self {
        Self { sender }
    }

    /// Render and send one welcome email. No retries here.
    #[instrument(skip(self, event), fields(user_id = %event.id, email = %event.email), err)]
    pub async fn execute(&self, event: &UserCreated) -> Result<(), NotificationDeliveryError> {
        let message = WelcomeEmail::for_user(event).render();

        self.sender
            .send(&message)
            .await
            .map_err(|source| NotificationDeliveryError {
                recipient: message.to.clone(),
                source,
            })?;

        info!("welcome email sent");
        Ok(())
    }
}

#[async_trait]
impl<S: EmailSender> EventHandler<UserCreated> for SendWelcomeEmail<S> {
    type Error = NotificationDeliveryError;

    async fn handle(&self, event: &UserCreated) -> Result<(), Self::Error> {
        self.execute(event).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use userhub_core::UserId;
    use userhub_infra::InMemoryEmailSender;

    use super::*;

    fn ada() -> UserCreated {
        UserCreated {
            id: UserId::new(7),
            name: "Ada".to_string(),
            email: "ada@x.com".to_string(),
        }
    }

    #[tokio::test]
    async fn sends_one_welcome_email() {
        let sender = Arc::new(InMemoryEmailSender::new());
        let usecase = SendWelcomeEmail::new(sender.clone());

        usecase.execute(&ada()).await.unwrap();

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@x.com");
        assert_eq!(sent[0].subject, "Welcome to Our Platform!");
    }

    #[tokio::test]
    async fn sender_error_is_passed_through() {
        let sender = Arc::new(InMemoryEmailSender::new());
        sender.fail_next(EmailError::Transport("421 try later".to_string()));
        let usecase = SendWelcomeEmail::new(sender.clone());

        let err = usecase.execute(&ada()).await.unwrap_err();

        assert_eq!(err.recipient, "ada@x.com");
        assert_eq!(err.source, EmailError::Transport("421 try later".to_string()));
        assert!(err.to_string().contains("421 try later"));
        assert!(sender.sent().is_empty());
    }
}
