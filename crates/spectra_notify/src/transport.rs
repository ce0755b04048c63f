use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::debug;

use crate::credentials::EmailCredentials;
use crate::error::{NotifyError, NotifyResult};
use crate::{SMTP_PORT, SMTP_SERVER};

/// A composed alert, independent of the wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivers one alert per call. Implementations must not retry.
pub trait MailTransport: Send + Sync {
    fn send(&self, credentials: &EmailCredentials, mail: &AlertMail) -> NotifyResult<()>;
}

/// Authenticated SMTP submission with a STARTTLS upgrade.
///
/// A new session is opened for every alert.
#[derive(Debug, Clone)]
pub struct SmtpMailTransport {
    relay: String,
    port: u16,
}

impl Default for SmtpMailTransport {
    fn default() -> Self {
        Self::new(SMTP_SERVER, SMTP_PORT)
    }
}

impl SmtpMailTransport {
    pub fn new(relay: impl Into<String>, port: u16) -> Self {
        Self {
            relay: relay.into(),
            port,
        }
    }

    pub fn relay(&self) -> &str {
        &self.relay
    }

    fn transport_error(&self, err: impl std::fmt::Display) -> NotifyError {
        NotifyError::Transport {
            relay: format!("{}:{}", self.relay, self.port),
            message: err.to_string(),
        }
    }
}

fn parse_mailbox(address: &str) -> NotifyResult<Mailbox> {
    address.parse::<Mailbox>().map_err(|e| NotifyError::Address {
        address: address.to_string(),
        message: e.to_string(),
    })
}

pub(crate) fn build_message(mail: &AlertMail) -> NotifyResult<Message> {
    Message::builder()
        .from(parse_mailbox(&mail.from)?)
        .to(parse_mailbox(&mail.to)?)
        .subject(mail.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(mail.body.clone())
        .map_err(|e| NotifyError::Message(e.to_string()))
}

impl MailTransport for SmtpMailTransport {
    fn send(&self, credentials: &EmailCredentials, mail: &AlertMail) -> NotifyResult<()> {
        let message = build_message(mail)?;

        let mailer = SmtpTransport::starttls_relay(&self.relay)
            .map_err(|e| self.transport_error(e))?
            .port(self.port)
            .credentials(Credentials::new(
                credentials.username.clone(),
                credentials.secret.clone(),
            ))
            .build();

        debug!(relay = %self.relay, port = self.port, "Submitting alert email");
        mailer
            .send(&message)
            .map_err(|e| self.transport_error(e))?;
        Ok(())
    }
}
