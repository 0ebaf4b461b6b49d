//! Configuration validation.

use super::{Config, StoreProvider};
use crate::error::{Result, TransferError};
use crate::target::tls::SslMode;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Store validation
    if config.store.bucket.is_empty() {
        return Err(TransferError::Config("store.bucket is required".into()));
    }
    if config.store.bucket.contains('/') {
        return Err(TransferError::Config(format!(
            "store.bucket must not contain '/', got '{}'",
            config.store.bucket
        )));
    }
    if config.store.provider == StoreProvider::Local && config.store.root.is_none() {
        return Err(TransferError::Config(
            "store.root is required for the local provider".into(),
        ));
    }
    if config.store.access_key.is_some() != config.store.secret_key.is_some() {
        return Err(TransferError::Config(
            "store.access_key and store.secret_key must be set together".into(),
        ));
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(TransferError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(TransferError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(TransferError::Config("target.user is required".into()));
    }
    SslMode::parse(&config.target.ssl_mode)?;

    // Transfer validation
    if config.transfer.datasets.is_empty() {
        return Err(TransferError::Config(
            "transfer.datasets must name at least one dataset".into(),
        ));
    }
    for name in &config.transfer.datasets {
        validate_dataset_name(name)?;
    }
    if config.transfer.row_group_size == 0 {
        return Err(TransferError::Config(
            "transfer.row_group_size must be at least 1".into(),
        ));
    }
    if config.transfer.copy_chunk_rows == 0 {
        return Err(TransferError::Config(
            "transfer.copy_chunk_rows must be at least 1".into(),
        ));
    }
    if let Some(0) = config.transfer.max_rows_per_object {
        return Err(TransferError::Config(
            "transfer.max_rows_per_object must be at least 1".into(),
        ));
    }

    Ok(())
}

/// A dataset name doubles as file stem, object prefix and table name.
pub fn validate_dataset_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(TransferError::Config(format!(
            "invalid dataset name '{}': use letters, digits, '_' or '-'",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        GenerateConfig, LocalConfig, StoreConfig, TargetConfig, TransferConfig,
    };
    use std::path::PathBuf;

    fn valid_config() -> Config {
        Config {
            local: LocalConfig {
                data_dir: PathBuf::from("/data"),
            },
            store: StoreConfig {
                provider: StoreProvider::S3,
                endpoint: Some("http://localhost:9000".to_string()),
                region: "us-east-1".to_string(),
                bucket: "landing-zone".to_string(),
                access_key: Some("minio".to_string()),
                secret_key: Some("minio123".to_string()),
                use_ssl: false,
                verify: false,
                root: None,
            },
            target: TargetConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "bank".to_string(),
                user: "postgres".to_string(),
                password: "password".to_string(),
                schema: None,
                ssl_mode: "disable".to_string(),
                connect_timeout_secs: 30,
            },
            transfer: TransferConfig::default(),
            generate: GenerateConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_bucket() {
        let mut config = valid_config();
        config.store.bucket = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_local_provider_requires_root() {
        let mut config = valid_config();
        config.store.provider = StoreProvider::Local;
        assert!(validate(&config).is_err());
        config.store.root = Some(PathBuf::from("/tmp/store"));
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_half_credentials_rejected() {
        let mut config = valid_config();
        config.store.secret_key = None;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_target_host() {
        let mut config = valid_config();
        config.target.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_ssl_mode() {
        let mut config = valid_config();
        config.target.ssl_mode = "sometimes".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_dataset_names() {
        assert!(validate_dataset_name("customers").is_ok());
        assert!(validate_dataset_name("loan-events_2024").is_ok());
        assert!(validate_dataset_name("").is_err());
        assert!(validate_dataset_name("../etc").is_err());
        assert!(validate_dataset_name("a b").is_err());
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let mut config = valid_config();
        config.transfer.copy_chunk_rows = 0;
        assert!(validate(&config).is_err());

        let mut config = valid_config();
        config.transfer.max_rows_per_object = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.target);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_456"),
            "Debug output should not contain actual password value"
        );
    }

    #[test]
    fn test_store_config_debug_redacts_secret_key() {
        let mut config = valid_config();
        config.store.secret_key = Some("super_secret_key_789".to_string());
        let debug_output = format!("{:?}", config.store);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_key_789"));
    }
}
