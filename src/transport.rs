//! Mail transport seam.

use async_trait::async_trait;

use duetrack_smtp::client;
use duetrack_smtp::types::{EmailMessage, SmtpConfig, SmtpResult};

/// Sends a compiled reminder message. Production uses the SMTP client;
/// tests substitute counting mocks.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// One message, one connection. The config travels with the call
    /// because every run reloads it.
    async fn send(&self, config: &SmtpConfig, message: &EmailMessage) -> SmtpResult<()>;

    /// Short provider label recorded in delivery outcomes.
    fn name(&self) -> &'static str;
}

/// Transport backed by the hand-rolled SMTP client.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpMailTransport;

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, config: &SmtpConfig, message: &EmailMessage) -> SmtpResult<()> {
        client::send_mail(config, message).await.map(|_| ())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
