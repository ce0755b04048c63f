//! Operator alerts for pipeline failures.
//!
//! A single plaintext email is sent from and to the configured operator
//! address. Delivery is best effort: there is no retry and no queue, and a
//! notifier that cannot notify never fails the pipeline it reports on.

mod credentials;
mod error;
mod notifier;
mod transport;

pub use credentials::{get_credentials, EmailCredentials};
pub use error::{NotifyError, NotifyResult};
pub use notifier::{Notifier, NotifyOutcome};
pub use transport::{AlertMail, MailTransport, SmtpMailTransport};

/// Relay every alert is submitted through.
pub const SMTP_SERVER: &str = "smtp.uni-stuttgart.de";
/// Submission port; the session is upgraded with STARTTLS.
pub const SMTP_PORT: u16 = 587;
/// Subject line of every alert.
pub const ALERT_SUBJECT: &str = "Solar Park Error";

/// Send one alert to the address in `credentials`, from that same address.
pub fn send_error_email(
    transport: &dyn MailTransport,
    credentials: &EmailCredentials,
    content: &str,
) -> NotifyResult<()> {
    let mail = AlertMail {
        from: credentials.address.clone(),
        to: credentials.address.clone(),
        subject: ALERT_SUBJECT.to_string(),
        body: content.to_string(),
    };
    transport.send(credentials, &mail)
}
