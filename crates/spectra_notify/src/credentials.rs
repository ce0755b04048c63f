use spectra_protocol::defaults::{
    NOTIFY_EMAIL_ENV_KEY, NOTIFY_PASSWORD_ENV_KEY, NOTIFY_USERNAME_ENV_KEY,
};
use spectra_protocol::EnvSource;
use std::fmt;

/// Login for the alert relay.
///
/// Read fresh for every alert and never stored.
#[derive(Clone, PartialEq, Eq)]
pub struct EmailCredentials {
    /// Operator address; alerts are sent from and to it.
    pub address: String,
    pub username: String,
    pub secret: String,
}

impl EmailCredentials {
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            username: username.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for EmailCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailCredentials")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Resolve alert credentials, or `None` when notifications are disabled.
///
/// Any missing value disables notifications; this is not an error.
pub fn get_credentials(env: &dyn EnvSource) -> Option<EmailCredentials> {
    let address = env.get(NOTIFY_EMAIL_ENV_KEY)?;
    let username = env.get(NOTIFY_USERNAME_ENV_KEY)?;
    let secret = env.get(NOTIFY_PASSWORD_ENV_KEY)?;
    Some(EmailCredentials {
        address,
        username,
        secret,
    })
}
