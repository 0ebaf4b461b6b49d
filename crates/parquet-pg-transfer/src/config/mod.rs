//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{Result, TransferError};
use std::path::{Path, PathBuf};
use std::time::Duration;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from environment variables.
    ///
    /// Reads `HOME` (data dir `$HOME/work/data`), `MINIO_ENDPOINT`, `MINIO_ROOT_USER`,
    /// `MINIO_ROOT_PASSWORD`, `MINIO_BUCKET` (default `landing-zone`) and
    /// `POSTGRES_{HOST,PORT,DATABASE,USER,PASSWORD}`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| {
                TransferError::Config(format!("environment variable {} is not set", key))
            })
        };

        let home = required("HOME")?;
        let port = match lookup("POSTGRES_PORT") {
            Some(p) => parse_port(&p)?,
            None => 5432,
        };

        let config = Config {
            local: LocalConfig {
                data_dir: PathBuf::from(home).join("work").join("data"),
            },
            store: StoreConfig {
                provider: StoreProvider::S3,
                endpoint: Some(required("MINIO_ENDPOINT")?),
                region: "us-east-1".to_string(),
                bucket: lookup("MINIO_BUCKET").unwrap_or_else(|| "landing-zone".to_string()),
                access_key: Some(required("MINIO_ROOT_USER")?),
                secret_key: Some(required("MINIO_ROOT_PASSWORD")?),
                use_ssl: false,
                verify: false,
                root: None,
            },
            target: TargetConfig {
                host: required("POSTGRES_HOST")?,
                port,
                database: required("POSTGRES_DATABASE")?,
                user: required("POSTGRES_USER")?,
                password: required("POSTGRES_PASSWORD")?,
                schema: None,
                ssl_mode: "disable".to_string(),
                connect_timeout_secs: 30,
            },
            transfer: TransferConfig::default(),
            generate: GenerateConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Overlay any set environment variables on top of a file configuration.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from a variable lookup on top of this configuration.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MINIO_ENDPOINT") {
            self.store.endpoint = Some(v);
        }
        if let Some(v) = lookup("MINIO_BUCKET") {
            self.store.bucket = v;
        }
        if let Some(v) = lookup("MINIO_ROOT_USER") {
            self.store.access_key = Some(v);
        }
        if let Some(v) = lookup("MINIO_ROOT_PASSWORD") {
            self.store.secret_key = Some(v);
        }
        if let Some(v) = lookup("POSTGRES_HOST") {
            self.target.host = v;
        }
        if let Some(v) = lookup("POSTGRES_PORT") {
            self.target.port = parse_port(&v)?;
        }
        if let Some(v) = lookup("POSTGRES_DATABASE") {
            self.target.database = v;
        }
        if let Some(v) = lookup("POSTGRES_USER") {
            self.target.user = v;
        }
        if let Some(v) = lookup("POSTGRES_PASSWORD") {
            self.target.password = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl TargetConfig {
    /// Build a tokio-postgres configuration.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config.host(&self.host);
        pg_config.port(self.port);
        pg_config.dbname(&self.database);
        pg_config.user(&self.user);
        pg_config.password(&self.password);
        pg_config.application_name("parquet-pg-transfer");
        pg_config.connect_timeout(Duration::from_secs(self.connect_timeout_secs));
        pg_config
    }

    /// Qualify a table name with the configured schema unless already qualified.
    pub fn qualified_table(&self, table: &str) -> String {
        match &self.schema {
            Some(schema) if !table.contains('.') => format!("{}.{}", schema, table),
            _ => table.to_string(),
        }
    }
}

fn parse_port(value: &str) -> Result<u16> {
    value
        .trim()
        .parse()
        .map_err(|_| TransferError::Config(format!("invalid POSTGRES_PORT '{}'", value)))
}
