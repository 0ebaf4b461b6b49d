//! Core traits for the transfer pipeline.
//!
//! - [`DatasetStore`]: Persists datasets as objects under a prefix
//! - [`BulkLoader`]: Streams datasets into a relational table
//!
//! The orchestrator only talks to these traits, so tests swap in in-memory stores and
//! recording loaders without touching the network.

use async_trait::async_trait;

use crate::config::TargetConfig;
use crate::error::Result;

use super::dataset::Dataset;

/// Dataset-partitioned object storage.
///
/// Writes are additive: implementations never delete, rename or overwrite objects.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Encode and write a dataset under `prefix`, returning the keys written.
    async fn write(&self, dataset: &Dataset, prefix: &str) -> Result<Vec<String>>;

    /// Read the union of every object under `prefix`.
    async fn read(&self, prefix: &str) -> Result<Dataset>;

    /// List object keys under `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Verify the store is reachable.
    async fn health_check(&self) -> Result<()>;

    /// Human-readable location, e.g. `s3://landing-zone`.
    fn location(&self) -> String;
}

/// Bulk load into a relational database.
#[async_trait]
pub trait BulkLoader: Send + Sync {
    /// Load every row of `dataset` into `table`, returning the number of rows loaded.
    ///
    /// The load is all-or-nothing.
    async fn load(&self, dataset: &Dataset, table: &str, target: &TargetConfig) -> Result<u64>;

    /// Verify the database accepts connections.
    async fn health_check(&self, target: &TargetConfig) -> Result<()>;

    /// Database type name.
    fn db_type(&self) -> &str;
}
