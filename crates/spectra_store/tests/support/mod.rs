//! In-memory backends shared by the pipeline tests.
#![allow(dead_code)]

pub mod http;

use spectra_notify::{AlertMail, EmailCredentials, MailTransport, NotifyResult, Notifier};
use spectra_protocol::defaults::{
    AWS_ACCESS_KEY_ID_ENV_KEY, AWS_SECRET_ACCESS_KEY_ENV_KEY, INFLUXDB_TOKEN_ENV_KEY,
    NOTIFY_EMAIL_ENV_KEY, NOTIFY_PASSWORD_ENV_KEY, NOTIFY_USERNAME_ENV_KEY,
};
use spectra_protocol::{EnvSource, MapEnv, ObjectKey};
use spectra_store::{
    BlobCredentials, BlobError, IndexError, LineSink, SpectraPipeline, StoreConfig, WritePolicy,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub content: String,
    pub access_key_id: String,
}

/// Blob store that keeps uploads in memory, optionally failing every call.
#[derive(Default)]
pub struct RecordingBlobStore {
    objects: Mutex<Vec<StoredObject>>,
    sources: Mutex<Vec<PathBuf>>,
    fail_with: Option<String>,
}

impl RecordingBlobStore {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().unwrap().clone()
    }

    /// Scratch paths handed to the store, in call order.
    pub fn sources(&self) -> Vec<PathBuf> {
        self.sources.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.sources.lock().unwrap().len()
    }
}

impl spectra_store::BlobStore for RecordingBlobStore {
    fn put_file(
        &self,
        credentials: &BlobCredentials,
        bucket: &str,
        key: &ObjectKey,
        source: &Path,
    ) -> Result<(), BlobError> {
        self.sources.lock().unwrap().push(source.to_path_buf());
        if let Some(message) = &self.fail_with {
            return Err(BlobError::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: message.clone(),
            });
        }
        let content = std::fs::read_to_string(source)?;
        let mut objects = self.objects.lock().unwrap();
        objects.retain(|o| !(o.bucket == bucket && o.key == key.as_str()));
        objects.push(StoredObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content,
            access_key_id: credentials.access_key_id.clone(),
        });
        Ok(())
    }
}

/// Line sink that replays scripted results, then succeeds.
#[derive(Default)]
pub struct ScriptedLineSink {
    script: Mutex<VecDeque<Result<(), IndexError>>>,
    always_fail: Option<IndexError>,
    bodies: Mutex<Vec<String>>,
}

impl ScriptedLineSink {
    pub fn always_failing(error: IndexError) -> Self {
        Self {
            always_fail: Some(error),
            ..Self::default()
        }
    }

    pub fn with_script(script: Vec<Result<(), IndexError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn bodies(&self) -> Vec<String> {
        self.bodies.lock().unwrap().clone()
    }
}

impl LineSink for ScriptedLineSink {
    fn write_lines(&self, body: &str) -> Result<(), IndexError> {
        self.bodies.lock().unwrap().push(body.to_string());
        if let Some(error) = &self.always_fail {
            return Err(error.clone());
        }
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    fn describe(&self) -> String {
        "InfluxDB at http://influx.test:8181 (database solar_park)".to_string()
    }
}

#[derive(Default)]
pub struct RecordingMailTransport {
    sent: Mutex<Vec<AlertMail>>,
}

impl RecordingMailTransport {
    pub fn sent(&self) -> Vec<AlertMail> {
        self.sent.lock().unwrap().clone()
    }
}

impl MailTransport for RecordingMailTransport {
    fn send(&self, _credentials: &EmailCredentials, mail: &AlertMail) -> NotifyResult<()> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

pub fn full_env() -> MapEnv {
    MapEnv::new()
        .with(AWS_ACCESS_KEY_ID_ENV_KEY, "AKIATEST")
        .with(AWS_SECRET_ACCESS_KEY_ENV_KEY, "aws-secret")
        .with(INFLUXDB_TOKEN_ENV_KEY, "influx-token")
        .with(NOTIFY_EMAIL_ENV_KEY, "operator@example.org")
        .with(NOTIFY_USERNAME_ENV_KEY, "operator")
        .with(NOTIFY_PASSWORD_ENV_KEY, "mail-secret")
}

pub fn fast_policy() -> WritePolicy {
    WritePolicy {
        batch_size: 100,
        flush_interval_ms: 20,
        jitter_interval_ms: 0,
        retry_interval_ms: 1,
        max_retries: 2,
        max_retry_delay_ms: 2,
        exponential_base: 2,
    }
}

pub fn test_config(scratch_dir: &Path) -> StoreConfig {
    StoreConfig {
        scratch_dir: Some(scratch_dir.to_path_buf()),
        write_policy: fast_policy(),
        ..StoreConfig::default()
    }
}

/// A pipeline wired to in-memory backends.
pub struct Harness {
    pub env: Arc<MapEnv>,
    pub blobs: Arc<RecordingBlobStore>,
    pub sink: Arc<ScriptedLineSink>,
    pub mail: Arc<RecordingMailTransport>,
    pub pipeline: SpectraPipeline,
}

impl Harness {
    pub fn new(
        config: StoreConfig,
        env: MapEnv,
        blobs: RecordingBlobStore,
        sink: ScriptedLineSink,
    ) -> Self {
        init_tracing();
        let env = Arc::new(env);
        let blobs = Arc::new(blobs);
        let sink = Arc::new(sink);
        let mail = Arc::new(RecordingMailTransport::default());
        let env_source: Arc<dyn EnvSource> = env.clone();
        let notifier = Notifier::new(env_source.clone(), mail.clone());
        let pipeline =
            SpectraPipeline::new(config, env_source, blobs.clone(), sink.clone(), notifier)
                .unwrap();
        Self {
            env,
            blobs,
            sink,
            mail,
            pipeline,
        }
    }
}

/// Route pipeline logs to the test harness output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("spectra_store=debug,spectra_notify=debug")
        .with_test_writer()
        .try_init();
}

pub fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}
