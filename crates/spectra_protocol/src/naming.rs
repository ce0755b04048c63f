//! Object key derivation.
//!
//! Keys are a pure function of (prefix, spectrometer, capture second), so
//! re-ingesting the same reading overwrites the earlier object instead of
//! creating a second one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::reading::SpectrometerId;

/// Timestamp layout used in object keys.
pub const KEY_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Path-like address of a spectra file within its bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive `<prefix>/<spectrometer>/<YYYYMMDDHHMMSS>.csv`.
///
/// Leading and trailing slashes on the prefix are ignored; an empty prefix
/// yields `<spectrometer>/<timestamp>.csv`.
///
/// The timestamp is four-digit-year only for years in
/// [`crate::reading::KEY_YEAR_RANGE`], which `SpectralReading::new` enforces.
pub fn object_key(
    prefix: &str,
    spectrometer: &SpectrometerId,
    captured_at: DateTime<Utc>,
) -> ObjectKey {
    let stamp = captured_at.format(KEY_TIMESTAMP_FORMAT);
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        ObjectKey(format!("{}/{}.csv", spectrometer, stamp))
    } else {
        ObjectKey(format!("{}/{}/{}.csv", prefix, spectrometer, stamp))
    }
}
