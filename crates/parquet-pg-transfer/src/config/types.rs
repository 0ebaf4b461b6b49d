//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Local staging directory holding `<dataset>.parquet` files.
    pub local: LocalConfig,

    /// Object store configuration.
    pub store: StoreConfig,

    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Transfer behavior configuration.
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Mock data generation settings.
    #[serde(default)]
    pub generate: GenerateConfig,
}

/// Local filesystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Directory containing one Parquet file per dataset.
    pub data_dir: PathBuf,
}

impl LocalConfig {
    /// Path of the local Parquet file for a dataset.
    pub fn dataset_path(&self, dataset: &str) -> PathBuf {
        self.data_dir.join(format!("{}.parquet", dataset))
    }
}

/// Object storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    /// Amazon S3 or S3-compatible (MinIO).
    #[default]
    S3,
    /// Local filesystem directory (bucket becomes a subdirectory of `root`).
    Local,
    /// Process-local in-memory store.
    Memory,
}

/// Object store configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Storage provider (s3, local, memory).
    #[serde(default)]
    pub provider: StoreProvider,

    /// Custom endpoint URL (MinIO etc.).
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Region (default: us-east-1).
    #[serde(default = "default_region")]
    pub region: String,

    /// Bucket name.
    pub bucket: String,

    /// Access key id.
    #[serde(default)]
    pub access_key: Option<String>,

    /// Secret access key.
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Connect over HTTPS. When false, plain HTTP endpoints are allowed (default: false).
    #[serde(default)]
    pub use_ssl: bool,

    /// Verify TLS certificates (default: true).
    #[serde(default = "default_true")]
    pub verify: bool,

    /// Root directory for the local provider.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .field("use_ssl", &self.use_ssl)
            .field("verify", &self.verify)
            .field("root", &self.root)
            .finish()
    }
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Schema used to qualify unqualified table names.
    #[serde(default)]
    pub schema: Option<String>,

    /// SSL mode (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,

    /// Connect timeout in seconds (default: 30).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Transfer behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Datasets to transfer, in order.
    #[serde(default = "default_datasets")]
    pub datasets: Vec<String>,

    /// Rows per Parquet row group.
    #[serde(default = "default_row_group_size")]
    pub row_group_size: usize,

    /// Maximum rows per object written to the store. Unset writes one object per dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rows_per_object: Option<usize>,

    /// Rows per COPY payload chunk.
    #[serde(default = "default_copy_chunk_rows")]
    pub copy_chunk_rows: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            datasets: default_datasets(),
            row_group_size: default_row_group_size(),
            max_rows_per_object: None,
            copy_chunk_rows: default_copy_chunk_rows(),
        }
    }
}

/// Mock data generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Random seed.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of customers. Drawn from [1000, 2000] if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customers: Option<usize>,

    /// Number of loans. Drawn from [3000, 5000] if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loans: Option<usize>,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            customers: None,
            loans: None,
        }
    }
}

// Default value functions for serde
fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

pub(crate) fn default_datasets() -> Vec<String> {
    vec!["customers".to_string(), "loans".to_string()]
}

fn default_row_group_size() -> usize {
    64 * 1024
}

fn default_copy_chunk_rows() -> usize {
    10_000
}

fn default_seed() -> u64 {
    10
}
