//! # parquet-pg-transfer
//!
//! Move tabular datasets from local Parquet files through an object store into
//! PostgreSQL.
//!
//! - **Columnar codec**: Snappy-compressed, dictionary-encoded Parquet with a format
//!   version tag
//! - **Object store adapter**: additive, dataset-partitioned layout on S3/MinIO or a
//!   local directory, union-on-read
//! - **Bulk loader**: `COPY ... FROM STDIN` in CSV format inside one transaction
//! - **Orchestrator**: sequential per-dataset pipelines with per-dataset error isolation
//!
//! ## Example
//!
//! ```rust,no_run
//! use parquet_pg_transfer::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> parquet_pg_transfer::Result<()> {
//!     let config = Config::from_env()?;
//!     let orchestrator = Orchestrator::from_config(&config)?;
//!     let result = orchestrator.run(&config.transfer.datasets).await?;
//!     println!("Loaded {} rows", result.rows_loaded);
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod core;
pub mod ddl;
pub mod error;
pub mod generate;
pub mod orchestrator;
pub mod store;
pub mod target;

// Re-exports for convenient access
pub use codec::ParquetCodec;
pub use config::{Config, LocalConfig, StoreConfig, StoreProvider, TargetConfig};
pub use crate::core::{BulkLoader, Dataset, DatasetStore};
pub use error::{Result, TransferError};
pub use orchestrator::{BatchResult, DatasetOutcome, HealthCheckResult, Orchestrator, TransferJob};
pub use store::ObjectDatasetStore;
pub use target::PgBulkLoader;
