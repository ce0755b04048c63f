//! Persistence pipeline for solar park spectra.
//!
//! Each reading is written as CSV to a blob store under a deterministic
//! key, then a pointer to that key is recorded in a time-series index.
//! Failures at either stage are logged and emailed to the operator; the
//! caller only sees an error for configuration faults.
//!
//! ```no_run
//! use chrono::Utc;
//! use spectra_store::SpectraPipeline;
//!
//! let pipeline = SpectraPipeline::from_process_env()?;
//! let outcome = pipeline.ingest(vec![vec![350.0, 0.12]], Utc::now(), "SP01")?;
//! println!("stored as {:?}", outcome.object_key());
//! pipeline.shutdown();
//! # Ok::<(), spectra_store::StoreError>(())
//! ```

pub mod blob;
pub mod callbacks;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod point;
pub mod reconcile;
pub mod scratch;
pub mod sink;
pub mod writer;

pub use blob::{BlobCredentials, BlobStore, S3BlobStore};
pub use callbacks::IndexCallbacks;
pub use config::{IndexConfirmation, StoreConfig, WritePolicy};
pub use error::{BlobError, IndexError, StoreError, StoreResult};
pub use pipeline::{IngestOutcome, SpectraPipeline};
pub use point::{FieldValue, IndexPoint};
pub use reconcile::{find_orphans, parse_object_key};
pub use scratch::ScratchFile;
pub use sink::{InfluxHttpSink, LineSink};
pub use writer::{BatchingIndexWriter, LineBatch, RetryAttempt, WriteCallbacks, WriteTicket};

pub use spectra_protocol::{object_key, ObjectKey, SpectralReading, SpectrometerId};
