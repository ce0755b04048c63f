use spectra_notify::Notifier;
use tracing::{debug, error, info};

use crate::error::IndexError;
use crate::writer::{LineBatch, RetryAttempt, WriteCallbacks};

/// Index write hooks: log every outcome and alert the operator on
/// terminal failure.
///
/// Runs on the writer thread; the notifier resolves its own credentials.
pub struct IndexCallbacks {
    notifier: Notifier,
    backend: String,
}

impl IndexCallbacks {
    pub fn new(notifier: Notifier, backend: impl Into<String>) -> Self {
        Self {
            notifier,
            backend: backend.into(),
        }
    }

    pub(crate) fn failure_message(&self, batch: &LineBatch, error: &IndexError) -> String {
        format!(
            "Failed writing {} spectra pointer(s) to {}: {}\n\nData:\n{}",
            batch.len(),
            self.backend,
            error,
            batch.body()
        )
    }
}

impl WriteCallbacks for IndexCallbacks {
    fn on_success(&self, batch: &LineBatch) {
        info!(points = batch.len(), backend = %self.backend, "Successfully wrote batch");
        debug!(data = %batch.body(), "Written batch data");
    }

    fn on_error(&self, batch: &LineBatch, error: &IndexError) {
        error!(
            points = batch.len(),
            backend = %self.backend,
            error = %error,
            data = %batch.body(),
            "Failed writing batch"
        );
        self.notifier.notify(&self.failure_message(batch, error));
    }

    fn on_retry(&self, batch: &LineBatch, error: &IndexError, retry: RetryAttempt) {
        debug!(
            points = batch.len(),
            backend = %self.backend,
            attempt = retry.attempt,
            max_retries = retry.max_retries,
            delay_ms = retry.delay.as_millis() as u64,
            error = %error,
            "Retrying batch write"
        );
    }
}
