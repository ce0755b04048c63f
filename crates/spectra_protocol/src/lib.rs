//! Shared vocabulary for the solar park spectra pipeline.
//!
//! Readings arrive from the acquisition side already parsed into a numeric
//! table. Everything downstream (blob naming, index records, notification)
//! is keyed off the types defined here.

pub mod defaults;
pub mod env;
pub mod naming;
pub mod reading;

pub use env::{EnvSource, MapEnv, ProcessEnv};
pub use naming::{object_key, ObjectKey, KEY_TIMESTAMP_FORMAT};
pub use reading::{ReadingError, SpectralReading, SpectrometerId};
