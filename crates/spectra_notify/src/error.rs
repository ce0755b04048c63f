use thiserror::Error;

/// Errors returned while composing or delivering an alert.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid alert address '{address}': {message}")]
    Address { address: String, message: String },
    #[error("failed to build alert message: {0}")]
    Message(String),
    #[error("failed to deliver alert via {relay}: {message}")]
    Transport { relay: String, message: String },
}

pub type NotifyResult<T> = std::result::Result<T, NotifyError>;
