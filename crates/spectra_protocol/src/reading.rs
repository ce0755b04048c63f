//! Spectral readings handed to the pipeline by the acquisition side.

use chrono::{DateTime, Datelike, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised when a reading cannot be accepted.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReadingError {
    #[error("spectrometer id cannot be empty")]
    EmptySpectrometerId,
    #[error("spectrometer id '{0}' may only contain ASCII letters, digits, '-' and '_'")]
    UnsafeSpectrometerId(String),
    #[error("spectral table has no rows")]
    EmptyTable,
    #[error("spectral table row {row} has {actual} columns, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("spectral table value at row {row}, column {column} is not finite")]
    NonFinite { row: usize, column: usize },
    #[error("capture year {0} cannot be written as a four-digit key timestamp")]
    YearOutOfRange(i32),
}

/// Years whose capture time fits the `YYYYMMDDHHMMSS` key layout.
pub const KEY_YEAR_RANGE: std::ops::RangeInclusive<i32> = 0..=9999;

/// Identifier of a field spectrometer.
///
/// Used verbatim as a storage path segment and as an index tag value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SpectrometerId(String);

impl SpectrometerId {
    pub fn new(id: impl Into<String>) -> Result<Self, ReadingError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ReadingError::EmptySpectrometerId);
        }
        if !is_safe_spectrometer_id(&id) {
            return Err(ReadingError::UnsafeSpectrometerId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Returns true if the id can be used as a path segment without escaping.
pub fn is_safe_spectrometer_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl fmt::Display for SpectrometerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SpectrometerId {
    type Err = ReadingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SpectrometerId {
    type Error = ReadingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SpectrometerId> for String {
    fn from(id: SpectrometerId) -> Self {
        id.0
    }
}

/// One acquired spectrum.
///
/// Rows are wavelength samples, columns are intensity channels. The table
/// carries no header. The capture timestamp is held at second precision.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralReading {
    rows: Vec<Vec<f64>>,
    captured_at: DateTime<Utc>,
    spectrometer: SpectrometerId,
}

impl SpectralReading {
    pub fn new(
        rows: Vec<Vec<f64>>,
        captured_at: DateTime<Utc>,
        spectrometer: SpectrometerId,
    ) -> Result<Self, ReadingError> {
        validate_table(&rows)?;
        if !KEY_YEAR_RANGE.contains(&captured_at.year()) {
            return Err(ReadingError::YearOutOfRange(captured_at.year()));
        }
        Ok(Self {
            rows,
            captured_at: captured_at.trunc_subsecs(0),
            spectrometer,
        })
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn spectrometer(&self) -> &SpectrometerId {
        &self.spectrometer
    }
}

fn validate_table(rows: &[Vec<f64>]) -> Result<(), ReadingError> {
    let expected = match rows.first() {
        Some(first) if !first.is_empty() => first.len(),
        _ => return Err(ReadingError::EmptyTable),
    };

    for (row_idx, row) in rows.iter().enumerate() {
        if row.len() != expected {
            return Err(ReadingError::RaggedRow {
                row: row_idx,
                expected,
                actual: row.len(),
            });
        }
        if let Some(column) = row.iter().position(|value| !value.is_finite()) {
            return Err(ReadingError::NonFinite {
                row: row_idx,
                column,
            });
        }
    }

    Ok(())
}
