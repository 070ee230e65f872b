use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{EmailError, EmailMessage, EmailSender};

/// Records sent messages instead of delivering them.
///
/// Failures can be scripted with [`InMemoryEmailSender::fail_next`]; each
/// scripted error is returned once, in order, before sends succeed again.
#[derive(Debug, Default)]
pub struct InMemoryEmailSender {
    sent: Mutex<Vec<EmailMessage>>,
    failures: Mutex<VecDeque<EmailError>>,
}

impl InMemoryEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, error: EmailError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back(error);
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl EmailSender for InMemoryEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let scripted = self
            .failures
            .lock()
            .map_err(|_| EmailError::Transport("lock poisoned".to_string()))?
            .pop_front();
        if let Some(err) = scripted {
            return Err(err);
        }

        self.sent
            .lock()
            .map_err(|_| EmailError::Transport("lock poisoned".to_string()))?
            .push(message.clone());
        Ok(())
    }
}
