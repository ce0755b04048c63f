//! Index store seam and the InfluxDB HTTP implementation.

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use spectra_protocol::defaults::INFLUXDB_TOKEN_ENV_KEY;
use spectra_protocol::EnvSource;
use std::sync::Arc;
use tracing::debug;

use crate::error::{IndexError, StoreError, StoreResult};

/// Destination for encoded line protocol batches.
///
/// One call is one write attempt; retrying is the writer's job.
pub trait LineSink: Send + Sync {
    fn write_lines(&self, body: &str) -> Result<(), IndexError>;

    /// Human-readable backend name used in logs and alerts.
    fn describe(&self) -> String;
}

/// InfluxDB write endpoint (`/api/v2/write`, second precision).
///
/// The access token is read from the environment on every write. Build
/// this outside of any async runtime: it wraps a blocking HTTP client.
pub struct InfluxHttpSink {
    client: Client,
    write_url: Url,
    host: String,
    database: String,
    env: Arc<dyn EnvSource>,
}

impl InfluxHttpSink {
    pub fn new(host: &str, database: &str, env: Arc<dyn EnvSource>) -> StoreResult<Self> {
        let write_url = write_url(host, database)?;
        let client = Client::builder()
            .build()
            .map_err(|e| StoreError::config(format!("failed to build InfluxDB client: {}", e)))?;
        Ok(Self {
            client,
            write_url,
            host: host.to_string(),
            database: database.to_string(),
            env,
        })
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }
}

fn write_url(host: &str, database: &str) -> StoreResult<Url> {
    let mut base = host.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    let mut url = Url::parse(&base)
        .and_then(|base| base.join("api/v2/write"))
        .map_err(|e| StoreError::config(format!("invalid InfluxDB host '{}': {}", host, e)))?;
    url.query_pairs_mut()
        .append_pair("bucket", database)
        .append_pair("precision", "s");
    Ok(url)
}

/// Map a non-success HTTP status onto retry semantics.
pub(crate) fn classify_status(status: u16, message: String) -> IndexError {
    if status == 429 || (500..600).contains(&status) {
        IndexError::Retriable(message)
    } else {
        IndexError::Rejected(message)
    }
}

impl LineSink for InfluxHttpSink {
    fn write_lines(&self, body: &str) -> Result<(), IndexError> {
        let token = self.env.get(INFLUXDB_TOKEN_ENV_KEY).ok_or_else(|| {
            IndexError::Rejected(format!("{} is not set", INFLUXDB_TOKEN_ENV_KEY))
        })?;

        let response = self
            .client
            .post(self.write_url.clone())
            .header(AUTHORIZATION, format!("Token {}", token))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body.to_string())
            .send()
            .map_err(|e| IndexError::Retriable(format!("request to {} failed: {}", self.host, e)))?;

        let status = response.status();
        if status.is_success() {
            debug!(host = %self.host, status = status.as_u16(), "InfluxDB accepted batch");
            return Ok(());
        }

        let detail = response.text().unwrap_or_default();
        Err(classify_status(
            status.as_u16(),
            format!("{} responded {}: {}", self.host, status, detail.trim()),
        ))
    }

    fn describe(&self) -> String {
        format!("InfluxDB at {} (database {})", self.host, self.database)
    }
}
