//! Blob store seam and the S3 implementation.

use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::buffered::BufWriter;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, RetryConfig};
use spectra_protocol::defaults::{AWS_ACCESS_KEY_ID_ENV_KEY, AWS_SECRET_ACCESS_KEY_ENV_KEY};
use spectra_protocol::{EnvSource, ObjectKey};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{BlobError, StoreError, StoreResult};

/// Access key pair for the blob store, resolved per upload.
#[derive(Clone, PartialEq, Eq)]
pub struct BlobCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl BlobCredentials {
    pub fn from_env(env: &dyn EnvSource) -> StoreResult<Self> {
        let access_key_id = env
            .get(AWS_ACCESS_KEY_ID_ENV_KEY)
            .ok_or(StoreError::MissingCredential {
                key: AWS_ACCESS_KEY_ID_ENV_KEY,
            })?;
        let secret_access_key =
            env.get(AWS_SECRET_ACCESS_KEY_ENV_KEY)
                .ok_or(StoreError::MissingCredential {
                    key: AWS_SECRET_ACCESS_KEY_ENV_KEY,
                })?;
        Ok(Self {
            access_key_id,
            secret_access_key,
        })
    }
}

impl fmt::Debug for BlobCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Durable object storage addressed by bucket and key.
///
/// Writing an existing key replaces the object.
pub trait BlobStore: Send + Sync {
    fn put_file(
        &self,
        credentials: &BlobCredentials,
        bucket: &str,
        key: &ObjectKey,
        source: &Path,
    ) -> Result<(), BlobError>;
}

/// Amazon S3 (or an S3-compatible endpoint).
///
/// Uploads stream the source file through a buffered multipart writer and
/// are attempted exactly once: the client's built-in retries are disabled,
/// and an unfinished multipart upload is aborted on failure. The store owns
/// a single-threaded runtime and blocks the caller for the duration of the
/// upload; it must not be used from inside an async context.
pub struct S3BlobStore {
    region: String,
    endpoint: Option<String>,
    runtime: tokio::runtime::Runtime,
}

impl S3BlobStore {
    pub fn new(region: impl Into<String>, endpoint: Option<String>) -> StoreResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StoreError::Startup)?;
        Ok(Self {
            region: region.into(),
            endpoint,
            runtime,
        })
    }

    fn client(&self, credentials: &BlobCredentials, bucket: &str) -> Result<AmazonS3, BlobError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(self.region.as_str())
            .with_access_key_id(credentials.access_key_id.as_str())
            .with_secret_access_key(credentials.secret_access_key.as_str())
            .with_retry(RetryConfig {
                max_retries: 0,
                ..RetryConfig::default()
            });
        if let Some(endpoint) = &self.endpoint {
            builder = builder
                .with_endpoint(endpoint.as_str())
                .with_allow_http(endpoint.starts_with("http://"));
        }
        builder.build().map_err(|e| BlobError::Client(e.to_string()))
    }
}

impl BlobStore for S3BlobStore {
    fn put_file(
        &self,
        credentials: &BlobCredentials,
        bucket: &str,
        key: &ObjectKey,
        source: &Path,
    ) -> Result<(), BlobError> {
        let store: Arc<dyn ObjectStore> = Arc::new(self.client(credentials, bucket)?);
        let location = ObjectPath::from(key.as_str());
        let upload_error = |message: String| BlobError::Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        debug!(bucket, key = %key, "Uploading spectra file");
        self.runtime.block_on(async {
            let mut file = tokio::fs::File::open(source).await?;
            let mut writer = BufWriter::new(store, location);
            if let Err(err) = tokio::io::copy(&mut file, &mut writer).await {
                let _ = writer.abort().await;
                return Err(upload_error(err.to_string()));
            }
            if let Err(err) = writer.shutdown().await {
                let _ = writer.abort().await;
                return Err(upload_error(err.to_string()));
            }
            Ok(())
        })
    }
}

impl fmt::Debug for S3BlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3BlobStore")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
