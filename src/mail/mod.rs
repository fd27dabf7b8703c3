pub mod templates;

use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use crate::config::MailConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid address {0:?}: {1}")]
    Address(String, String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    #[error("message has no recipients")]
    NoRecipients,
}

/// One rendered HTML email. `bcc` recipients are hidden from each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// SMTP delivery over an implicit-TLS relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let from = parse_mailbox(&config.from)?;

        let builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.smtp_port);

        let builder = match (&config.smtp_username, &config.smtp_password) {
            (Some(user), Some(pass)) => builder.credentials(Credentials::new(user.clone(), pass.clone())),
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let message = build_message(&self.from, &mail)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        tracing::info!(
            subject = %mail.subject,
            recipients = mail.to.len() + mail.bcc.len(),
            "email sent"
        );
        Ok(())
    }
}

/// Used when no SMTP host is configured: logs instead of sending.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        if mail.to.is_empty() && mail.bcc.is_empty() {
            return Err(MailError::NoRecipients);
        }
        tracing::info!(
            subject = %mail.subject,
            to = ?mail.to,
            bcc = mail.bcc.len(),
            "mail delivery disabled; skipping send"
        );
        Ok(())
    }
}

pub fn from_config(config: &MailConfig) -> Result<Box<dyn Mailer>, MailError> {
    if config.smtp_host.trim().is_empty() {
        tracing::warn!("SMTP host not configured; emails will only be logged");
        return Ok(Box::new(LogMailer));
    }
    Ok(Box::new(SmtpMailer::new(config)?))
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| MailError::Address(address.to_string(), e.to_string()))
}

pub fn build_message(from: &Mailbox, mail: &OutgoingMail) -> Result<Message, MailError> {
    if mail.to.is_empty() && mail.bcc.is_empty() {
        return Err(MailError::NoRecipients);
    }

    let mut builder = Message::builder()
        .from(from.clone())
        .subject(mail.subject.clone());
    for to in &mail.to {
        builder = builder.to(parse_mailbox(to)?);
    }
    for bcc in &mail.bcc {
        builder = builder.bcc(parse_mailbox(bcc)?);
    }

    builder
        .header(header::ContentType::TEXT_HTML)
        .body(mail.html.clone())
        .map_err(|e| MailError::Build(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(to: &[&str], bcc: &[&str]) -> OutgoingMail {
        OutgoingMail {
            to: to.iter().map(|s| s.to_string()).collect(),
            bcc: bcc.iter().map(|s| s.to_string()).collect(),
            subject: "Hello".to_string(),
            html: "<p>hi</p>".to_string(),
        }
    }

    #[test]
    fn build_message_keeps_bcc_out_of_headers() {
        let from = parse_mailbox("Scribe <no-reply@example.com>").unwrap();
        let message =
            build_message(&from, &sample(&[], &["a@example.com", "b@example.com"])).unwrap();

        let envelope = message.envelope();
        assert_eq!(envelope.to().len(), 2);

        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(!formatted.contains("a@example.com"));
        assert!(formatted.contains("Subject: Hello"));
    }

    #[test]
    fn build_message_rejects_bad_address() {
        let from = parse_mailbox("no-reply@example.com").unwrap();
        let err = build_message(&from, &sample(&["not an address"], &[])).unwrap_err();
        assert!(matches!(err, MailError::Address(..)));
    }

    #[test]
    fn build_message_requires_recipients() {
        let from = parse_mailbox("no-reply@example.com").unwrap();
        let err = build_message(&from, &sample(&[], &[])).unwrap_err();
        assert!(matches!(err, MailError::NoRecipients));
    }

    #[test]
    fn empty_host_selects_log_mailer() {
        assert!(from_config(&MailConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn log_mailer_accepts_mail() {
        assert!(LogMailer.send(sample(&["a@example.com"], &[])).await.is_ok());
    }
}
