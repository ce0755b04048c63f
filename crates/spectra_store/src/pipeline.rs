//! Upload-then-index persistence pipeline.
//!
//! ```text
//! START -> UPLOADING -> UPLOAD_FAILED                     (alert, no key)
//!                    -> UPLOADED -> INDEXING -> INDEX_FAILED   (alert)
//!                                            -> INDEXED
//! ```
//!
//! The index write is only attempted after a successful upload. A stored
//! blob whose pointer never lands in the index is an accepted outcome: the
//! raw data is kept and the operator is alerted.

use chrono::{DateTime, Utc};
use spectra_notify::Notifier;
use spectra_protocol::defaults::INFLUXDB_TOKEN_ENV_KEY;
use spectra_protocol::{
    object_key, EnvSource, ObjectKey, ProcessEnv, SpectralReading, SpectrometerId,
};
use std::sync::Arc;
use tracing::{debug, error, info, info_span};

use crate::blob::{BlobCredentials, BlobStore, S3BlobStore};
use crate::callbacks::IndexCallbacks;
use crate::config::{IndexConfirmation, StoreConfig};
use crate::error::{BlobError, IndexError, StoreError, StoreResult};
use crate::point::IndexPoint;
use crate::scratch::ScratchFile;
use crate::sink::{InfluxHttpSink, LineSink};
use crate::writer::BatchingIndexWriter;

/// Result of one `ingest` call that got past configuration checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Uploaded; the pointer was accepted by the background writer.
    IndexQueued { key: ObjectKey },
    /// Uploaded and the pointer write was confirmed.
    Indexed { key: ObjectKey },
    /// Uploaded, but the pointer write failed. The blob is orphaned.
    IndexFailed { key: ObjectKey, error: IndexError },
    /// Nothing was stored.
    UploadFailed { reason: String },
}

impl IngestOutcome {
    /// Key of the stored blob; `None` only when the upload failed.
    pub fn object_key(&self) -> Option<&ObjectKey> {
        match self {
            IngestOutcome::IndexQueued { key }
            | IngestOutcome::Indexed { key }
            | IngestOutcome::IndexFailed { key, .. } => Some(key),
            IngestOutcome::UploadFailed { .. } => None,
        }
    }

    pub fn into_object_key(self) -> Option<ObjectKey> {
        match self {
            IngestOutcome::IndexQueued { key }
            | IngestOutcome::Indexed { key }
            | IngestOutcome::IndexFailed { key, .. } => Some(key),
            IngestOutcome::UploadFailed { .. } => None,
        }
    }
}

/// The persistence pipeline.
///
/// `ingest` may be called concurrently for different readings. Calls for
/// the same (spectrometer, second) race on the same key; the last writer
/// wins.
pub struct SpectraPipeline {
    config: StoreConfig,
    env: Arc<dyn EnvSource>,
    blob_store: Arc<dyn BlobStore>,
    index_writer: BatchingIndexWriter,
    notifier: Notifier,
}

impl SpectraPipeline {
    /// Assemble a pipeline from explicit backends.
    pub fn new(
        config: StoreConfig,
        env: Arc<dyn EnvSource>,
        blob_store: Arc<dyn BlobStore>,
        line_sink: Arc<dyn LineSink>,
        notifier: Notifier,
    ) -> StoreResult<Self> {
        config.validate()?;
        let callbacks = Arc::new(IndexCallbacks::new(notifier.clone(), line_sink.describe()));
        let index_writer =
            BatchingIndexWriter::start(line_sink, callbacks, config.write_policy.clone())?;
        Ok(Self {
            config,
            env,
            blob_store,
            index_writer,
            notifier,
        })
    }

    /// S3, InfluxDB and SMTP backends.
    ///
    /// Credentials are not checked here; they are resolved on every
    /// `ingest`.
    pub fn connect(config: StoreConfig, env: Arc<dyn EnvSource>) -> StoreResult<Self> {
        config.validate()?;
        let blob_store = S3BlobStore::new(config.region.clone(), config.endpoint.clone())?;
        let line_sink = InfluxHttpSink::new(&config.influx_host, &config.influx_database, env.clone())?;
        let notifier = Notifier::smtp(env.clone());
        Self::new(
            config,
            env,
            Arc::new(blob_store),
            Arc::new(line_sink),
            notifier,
        )
    }

    /// [`SpectraPipeline::connect`] configured from the process environment.
    pub fn from_process_env() -> StoreResult<Self> {
        let env: Arc<dyn EnvSource> = Arc::new(ProcessEnv);
        let config = StoreConfig::from_env(env.as_ref());
        Self::connect(config, env)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn object_key_for(&self, reading: &SpectralReading) -> ObjectKey {
        object_key(
            &self.config.key_prefix,
            reading.spectrometer(),
            reading.captured_at(),
        )
    }

    /// Validate a raw table and persist it.
    pub fn ingest(
        &self,
        rows: Vec<Vec<f64>>,
        captured_at: DateTime<Utc>,
        spectrometer_id: &str,
    ) -> StoreResult<IngestOutcome> {
        let spectrometer = SpectrometerId::new(spectrometer_id)?;
        let reading = SpectralReading::new(rows, captured_at, spectrometer)?;
        self.ingest_reading(&reading)
    }

    /// Upload `reading`, then record a pointer to it in the index.
    ///
    /// Returns `Err` only for configuration faults, before any network call.
    pub fn ingest_reading(&self, reading: &SpectralReading) -> StoreResult<IngestOutcome> {
        let credentials = self.required_credentials()?;

        let span = info_span!(
            "ingest",
            spectrometer = %reading.spectrometer(),
            captured_at = %reading.captured_at()
        );
        let _enter = span.enter();

        let key = self.object_key_for(reading);
        if let Err(err) = self.upload(reading, &key, &credentials) {
            error!(bucket = %self.config.bucket, key = %key, error = %err, "Spectra upload failed");
            self.notifier.notify(&format!(
                "Failed to upload spectra from spectrometer {} captured at {} to bucket {} as {}: {}",
                reading.spectrometer(),
                reading.captured_at(),
                self.config.bucket,
                key,
                err
            ));
            return Ok(IngestOutcome::UploadFailed {
                reason: err.to_string(),
            });
        }
        info!(bucket = %self.config.bucket, key = %key, "Uploaded spectra");

        Ok(self.index(reading, key))
    }

    /// Flush queued pointers and stop the index writer.
    pub fn shutdown(mut self) {
        self.index_writer.close();
    }

    fn required_credentials(&self) -> StoreResult<BlobCredentials> {
        let blob = BlobCredentials::from_env(self.env.as_ref())?;
        if self.env.get(INFLUXDB_TOKEN_ENV_KEY).is_none() {
            return Err(StoreError::MissingCredential {
                key: INFLUXDB_TOKEN_ENV_KEY,
            });
        }
        Ok(blob)
    }

    fn upload(
        &self,
        reading: &SpectralReading,
        key: &ObjectKey,
        credentials: &BlobCredentials,
    ) -> Result<(), BlobError> {
        let scratch = ScratchFile::write_reading(self.config.scratch_dir.as_deref(), reading)?;
        self.blob_store
            .put_file(credentials, &self.config.bucket, key, scratch.path())
    }

    fn index(&self, reading: &SpectralReading, key: ObjectKey) -> IngestOutcome {
        let point = IndexPoint::spectra_pointer(&self.config, reading, &key);
        let ticket = match self.index_writer.submit(&point) {
            Ok(ticket) => ticket,
            Err(err) => {
                // The writer thread is gone, so its error hook will not fire.
                error!(key = %key, error = %err, "Failed to queue index point");
                self.notifier.notify(&format!(
                    "Failed to queue spectra pointer {} for the index store: {}",
                    key, err
                ));
                return IngestOutcome::IndexFailed { key, error: err };
            }
        };

        match self.config.index_confirmation {
            IndexConfirmation::Background => {
                debug!(key = %key, "Queued index point");
                IngestOutcome::IndexQueued { key }
            }
            IndexConfirmation::AwaitResult => {
                if let Err(err) = self.index_writer.flush() {
                    // The ticket resolves to the same failure.
                    debug!(key = %key, error = %err, "Index flush request not delivered");
                }
                match ticket.wait() {
                    Ok(()) => IngestOutcome::Indexed { key },
                    Err(error) => IngestOutcome::IndexFailed { key, error },
                }
            }
        }
    }
}

impl std::fmt::Debug for SpectraPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectraPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
