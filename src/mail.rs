//! Mail delivery seam for the reminder scheduler.
//!
//! Transports are trait objects so the scheduler never knows how a message
//! leaves the process. The default transport writes the rendered message to
//! the log; tests swap in recording or failing transports.

use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

/// A rendered email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport failure: {0}")]
    Transport(String),
}

/// Something that can deliver a [`Message`].
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &Message) -> Result<(), MailError>;
}

/// Transport that logs messages instead of delivering them.
/// Stands in where no SMTP relay is configured.
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, message: &Message) -> Result<(), MailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "outgoing mail:\n{}",
            message.body
        );
        Ok(())
    }
}

/// Transport that records messages in memory (for testing).
#[derive(Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<Message>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for MemoryTransport {
    async fn send(&self, message: &Message) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
