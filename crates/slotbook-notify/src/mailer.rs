//! Mail delivery.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use slotbook_core::SmtpConfig;

use crate::error::NotifyError;
use crate::template::OutgoingEmail;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one message addressed to every recipient.
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NotifyError>;
}

/// SMTP delivery through `lettre`'s pooled tokio transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let builder = if config.implicit_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };

        let mut builder = builder.port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| NotifyError::invalid_address(&config.from, e))?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            implicit_tls = config.implicit_tls,
            "SMTP mailer configured"
        );

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message, NotifyError> {
        build_message(&self.from, email)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NotifyError> {
        let message = self.build_message(email)?;
        let response = self.transport.send(message).await?;
        tracing::debug!(code = %response.code(), recipients = email.to.len(), "Mail accepted");
        Ok(())
    }
}

/// Check that `address` is a deliverable mailbox address.
pub fn validate_address(address: &str) -> Result<(), NotifyError> {
    address
        .parse::<Address>()
        .map(|_| ())
        .map_err(|e| NotifyError::invalid_address(address, e))
}

fn build_message(from: &Mailbox, email: &OutgoingEmail) -> Result<Message, NotifyError> {
    if email.to.is_empty() {
        return Err(NotifyError::NoRecipients);
    }

    let mut builder = Message::builder()
        .from(from.clone())
        .subject(email.subject.clone());
    for address in &email.to {
        let mailbox = address
            .parse::<Mailbox>()
            .map_err(|e| NotifyError::invalid_address(address, e))?;
        builder = builder.to(mailbox);
    }

    Ok(builder.multipart(MultiPart::alternative_plain_html(
        email.text.clone(),
        email.html.clone(),
    ))?)
}

/// Logs messages instead of sending them. Used when no SMTP server is configured.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NotifyError> {
        tracing::info!(
            to = ?email.to,
            subject = %email.subject,
            "SMTP not configured, skipping confirmation email"
        );
        Ok(())
    }
}
