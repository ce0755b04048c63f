//! Canonical names and default values shared by the pipeline crates.

// Required storage credentials.
pub const AWS_ACCESS_KEY_ID_ENV_KEY: &str = "SOLAR_PARK_SPECTRA_AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY_ENV_KEY: &str = "SOLAR_PARK_SPECTRA_AWS_SECRET_ACCESS_KEY";
pub const INFLUXDB_TOKEN_ENV_KEY: &str = "SOLAR_PARK_SPECTRA_INFLUXDB_TOKEN";

// Notification credentials. All three must be present to enable alerts.
pub const NOTIFY_EMAIL_ENV_KEY: &str = "SOLAR_PARK_SPECTRA_NOTIFY_EMAIL";
pub const NOTIFY_USERNAME_ENV_KEY: &str = "SOLAR_PARK_SPECTRA_NOTIFY_USERNAME";
pub const NOTIFY_PASSWORD_ENV_KEY: &str = "SOLAR_PARK_SPECTRA_NOTIFY_PASSWORD";

// Optional deployment overrides.
pub const AWS_REGION_ENV_KEY: &str = "SOLAR_PARK_SPECTRA_AWS_REGION";
pub const S3_ENDPOINT_ENV_KEY: &str = "SOLAR_PARK_SPECTRA_S3_ENDPOINT";
pub const INFLUXDB_HOST_ENV_KEY: &str = "SOLAR_PARK_SPECTRA_INFLUXDB_HOST";
pub const INFLUXDB_DATABASE_ENV_KEY: &str = "SOLAR_PARK_SPECTRA_INFLUXDB_DATABASE";
pub const HOME_ENV_KEY: &str = "SOLAR_PARK_SPECTRA_HOME";

pub const DEFAULT_BUCKET: &str = "solar-park-spectra";
pub const DEFAULT_KEY_PREFIX: &str = "spectra";
pub const DEFAULT_AWS_REGION: &str = "eu-central-1";
pub const DEFAULT_INFLUXDB_HOST: &str = "http://localhost:8181";
pub const DEFAULT_INFLUXDB_DATABASE: &str = "solar_park";
pub const DEFAULT_MEASUREMENT: &str = "solar_spectra";
pub const DEFAULT_SPECTROMETER_TAG: &str = "spectrometer";

/// Field holding the bucket the spectra file was uploaded to.
pub const BUCKET_FIELD: &str = "bucket";
/// Field holding the object key of the spectra file.
pub const OBJECT_KEY_FIELD: &str = "object_key";
