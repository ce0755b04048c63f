//! Helpers for reconciling the blob store against the index.
//!
//! A blob whose pointer write failed stays in the bucket. Operators list
//! both stores and diff them with [`find_orphans`]; [`parse_object_key`]
//! recovers the spectrometer and capture time needed to re-register it.

use chrono::{DateTime, NaiveDateTime, Utc};
use spectra_protocol::{ObjectKey, SpectrometerId, KEY_TIMESTAMP_FORMAT};
use std::collections::BTreeSet;

/// Stored keys with no matching index record, sorted.
pub fn find_orphans<'a>(
    stored: impl IntoIterator<Item = &'a ObjectKey>,
    indexed: impl IntoIterator<Item = &'a ObjectKey>,
) -> Vec<ObjectKey> {
    let indexed: BTreeSet<&ObjectKey> = indexed.into_iter().collect();
    let stored: BTreeSet<&ObjectKey> = stored.into_iter().collect();
    stored
        .into_iter()
        .filter(|key| !indexed.contains(key))
        .cloned()
        .collect()
}

/// Inverse of [`spectra_protocol::object_key`] for keys under `prefix`.
pub fn parse_object_key(prefix: &str, key: &str) -> Option<(SpectrometerId, DateTime<Utc>)> {
    let prefix = prefix.trim_matches('/');
    let rest = if prefix.is_empty() {
        key
    } else {
        key.strip_prefix(prefix)?.strip_prefix('/')?
    };
    let (spectrometer, file) = rest.split_once('/')?;
    let stamp = file.strip_suffix(".csv")?;
    let captured_at = NaiveDateTime::parse_from_str(stamp, KEY_TIMESTAMP_FORMAT)
        .ok()?
        .and_utc();
    let spectrometer = SpectrometerId::new(spectrometer).ok()?;
    Some((spectrometer, captured_at))
}
