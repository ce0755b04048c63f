use spectra_protocol::EnvSource;
use std::sync::Arc;
use tracing::{info, warn};

use crate::credentials::get_credentials;
use crate::send_error_email;
use crate::transport::{MailTransport, SmtpMailTransport};

/// Result of a best-effort alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    /// Notification credentials are not configured.
    Disabled,
    /// Delivery failed; the reason has already been logged.
    Failed(String),
}

/// Best-effort alert sender.
///
/// Cheap to clone; clones share the transport and configuration source.
/// Credentials are resolved on every call, so the notifier can be used from
/// any thread without sharing state with the code that raised the alert.
#[derive(Clone)]
pub struct Notifier {
    env: Arc<dyn EnvSource>,
    transport: Arc<dyn MailTransport>,
}

impl Notifier {
    pub fn new(env: Arc<dyn EnvSource>, transport: Arc<dyn MailTransport>) -> Self {
        Self { env, transport }
    }

    /// Notifier using the fixed SMTP relay.
    pub fn smtp(env: Arc<dyn EnvSource>) -> Self {
        Self::new(env, Arc::new(SmtpMailTransport::default()))
    }

    /// Send `content` to the operator. Never fails.
    pub fn notify(&self, content: &str) -> NotifyOutcome {
        let Some(credentials) = get_credentials(self.env.as_ref()) else {
            warn!("Notification credentials not configured; alert not sent");
            return NotifyOutcome::Disabled;
        };

        match send_error_email(self.transport.as_ref(), &credentials, content) {
            Ok(()) => {
                info!(to = %credentials.address, "Sent alert email");
                NotifyOutcome::Sent
            }
            Err(err) => {
                warn!(error = %err, "Failed to send alert email");
                NotifyOutcome::Failed(err.to_string())
            }
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}
