//! Index point records and their line protocol encoding.

use chrono::{DateTime, Utc};
use spectra_protocol::defaults::{BUCKET_FIELD, OBJECT_KEY_FIELD};
use spectra_protocol::{ObjectKey, SpectralReading};
use std::fmt::Write as _;

use crate::config::StoreConfig;

/// Value of a point field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Float(f64),
    Integer(i64),
    Boolean(bool),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

/// One timestamped, tagged, multi-field record for the index store.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPoint {
    measurement: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, FieldValue)>,
    timestamp: DateTime<Utc>,
}

impl IndexPoint {
    pub fn new(measurement: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp,
        }
    }

    /// Pointer record for an uploaded reading.
    pub fn spectra_pointer(
        config: &StoreConfig,
        reading: &SpectralReading,
        key: &ObjectKey,
    ) -> Self {
        IndexPoint::new(config.measurement.as_str(), reading.captured_at())
            .tag(config.spectrometer_tag.as_str(), reading.spectrometer().as_str())
            .field(BUCKET_FIELD, config.bucket.as_str())
            .field(OBJECT_KEY_FIELD, key.as_str())
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn field_value(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Encode as one line of line protocol with a seconds timestamp.
    ///
    /// Tags are emitted sorted by key.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape(&self.measurement, &[',', ' ']);

        let mut tags: Vec<&(String, String)> = self.tags.iter().collect();
        tags.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, value) in tags {
            let _ = write!(
                line,
                ",{}={}",
                escape(key, &[',', '=', ' ']),
                escape(value, &[',', '=', ' '])
            );
        }

        for (idx, (key, value)) in self.fields.iter().enumerate() {
            line.push(if idx == 0 { ' ' } else { ',' });
            line.push_str(&escape(key, &[',', '=', ' ']));
            line.push('=');
            match value {
                FieldValue::String(s) => {
                    line.push('"');
                    line.push_str(&escape(s, &['\\', '"']));
                    line.push('"');
                }
                FieldValue::Float(f) => {
                    let _ = write!(line, "{}", f);
                }
                FieldValue::Integer(i) => {
                    let _ = write!(line, "{}i", i);
                }
                FieldValue::Boolean(b) => {
                    let _ = write!(line, "{}", b);
                }
            }
        }

        let _ = write!(line, " {}", self.timestamp.timestamp());
        line
    }
}

fn escape(input: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if special.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
