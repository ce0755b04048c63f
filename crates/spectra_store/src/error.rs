use spectra_protocol::ReadingError;
use thiserror::Error;

/// Errors returned by [`crate::SpectraPipeline`] construction and `ingest`.
///
/// Backend failures are not errors: they surface as degraded
/// [`crate::IngestOutcome`] values and an operator alert.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required credential is absent. Raised before any network call.
    #[error("required credential {key} is not set")]
    MissingCredential { key: &'static str },
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    InvalidReading(#[from] ReadingError),
    #[error("failed to start pipeline worker: {0}")]
    Startup(#[source] std::io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        StoreError::InvalidConfig(message.into())
    }

    pub fn is_configuration_fault(&self) -> bool {
        matches!(
            self,
            StoreError::MissingCredential { .. } | StoreError::InvalidConfig(_)
        )
    }
}

/// Upload stage failures. Never retried by the pipeline.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("failed to stage spectra in scratch file: {0}")]
    Scratch(#[from] std::io::Error),
    #[error("failed to configure object store client: {0}")]
    Client(String),
    #[error("failed to upload s3://{bucket}/{key}: {message}")]
    Upload {
        bucket: String,
        key: String,
        message: String,
    },
}

/// Index stage failures.
///
/// Cloned to every caller waiting on the failed batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// Transport failure, throttling or server error; worth retrying.
    #[error("transient index failure: {0}")]
    Retriable(String),
    /// The backend refused the write; retrying cannot help.
    #[error("index rejected write: {0}")]
    Rejected(String),
    /// The background writer is no longer running.
    #[error("index writer unavailable: {0}")]
    Unavailable(String),
}

impl IndexError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, IndexError::Retriable(_))
    }
}
