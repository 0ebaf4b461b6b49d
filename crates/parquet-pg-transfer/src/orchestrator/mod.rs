//! Transfer orchestrator - composes codec, store and loader into per-dataset pipelines.
//!
//! Each dataset runs two stages in order: local Parquet file to object store, then
//! object store to database table. Datasets are processed one after another. A
//! recoverable failure in one dataset is logged and recorded, and the batch moves on.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::codec::ParquetCodec;
use crate::config::{Config, LocalConfig, TargetConfig};
use crate::core::{BulkLoader, DatasetStore};
use crate::error::{Result, TransferError};
use crate::store::ObjectDatasetStore;
use crate::target::PgBulkLoader;

/// One dataset's unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    /// Dataset name.
    pub name: String,
    /// Local Parquet file.
    pub local_path: PathBuf,
    /// Object store prefix.
    pub store_prefix: String,
    /// Destination table, schema-qualified when a target schema is configured.
    pub table: String,
}

/// Transfer orchestrator.
pub struct Orchestrator {
    store: Arc<dyn DatasetStore>,
    loader: Arc<dyn BulkLoader>,
    codec: ParquetCodec,
    local: LocalConfig,
    target: TargetConfig,
}

/// Outcome of one dataset in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetOutcome {
    /// Dataset name.
    pub name: String,

    /// "completed" or "failed".
    pub status: String,

    /// Objects written to the store.
    pub objects_written: usize,

    /// Rows loaded into the table.
    pub rows_loaded: u64,

    /// Duration in seconds.
    pub duration_seconds: f64,

    /// Error message when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    /// Unique run identifier.
    pub run_id: String,

    /// "completed" or "completed_with_failures".
    pub status: String,

    /// When the batch started.
    pub started_at: DateTime<Utc>,

    /// When the batch completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    pub datasets_total: usize,
    pub datasets_success: usize,
    pub datasets_failed: usize,

    /// Rows loaded across all datasets.
    pub rows_loaded: u64,

    /// Per-dataset outcomes in processing order.
    pub datasets: Vec<DatasetOutcome>,

    /// Names of failed datasets.
    pub failed_datasets: Vec<String>,
}

impl BatchResult {
    /// True when every dataset completed.
    pub fn is_success(&self) -> bool {
        self.failed_datasets.is_empty()
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Reachability of the store and the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub store_location: String,
    pub store_connected: bool,
    pub store_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_error: Option<String>,
    pub target_type: String,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,
    pub healthy: bool,
}

impl Orchestrator {
    /// Create an orchestrator from explicit collaborators.
    pub fn new(
        store: Arc<dyn DatasetStore>,
        loader: Arc<dyn BulkLoader>,
        codec: ParquetCodec,
        local: LocalConfig,
        target: TargetConfig,
    ) -> Self {
        Self {
            store,
            loader,
            codec,
            local,
            target,
        }
    }

    /// Create an orchestrator with the object store and PostgreSQL loader from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let codec = ParquetCodec::new(config.transfer.row_group_size);
        let store = ObjectDatasetStore::from_config(
            &config.store,
            codec.clone(),
            config.transfer.max_rows_per_object,
        )?;
        let loader = PgBulkLoader::new(config.transfer.copy_chunk_rows);

        Ok(Self::new(
            Arc::new(store),
            Arc::new(loader),
            codec,
            config.local.clone(),
            config.target.clone(),
        ))
    }

    /// Build the job for a dataset name.
    pub fn job(&self, name: &str) -> TransferJob {
        TransferJob {
            name: name.to_string(),
            local_path: self.local.dataset_path(name),
            store_prefix: name.to_string(),
            table: self.target.qualified_table(name),
        }
    }

    /// Copy a local Parquet file into the store under `prefix`.
    ///
    /// Fails with [`TransferError::NotFound`] before touching the store if the file is
    /// missing.
    pub async fn local_to_store(&self, local_path: &Path, prefix: &str) -> Result<Vec<String>> {
        match tokio::fs::metadata(local_path).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                return Err(TransferError::NotFound(format!(
                    "local file {} does not exist",
                    local_path.display()
                )))
            }
        }

        let dataset = self.codec.read_file(local_path).await?;
        debug!(
            "{}: read {} rows x {} columns from {}",
            prefix,
            dataset.num_rows(),
            dataset.num_columns(),
            local_path.display()
        );

        let keys = self.store.write(&dataset, prefix).await?;
        debug!(
            "{}: wrote {} object(s) to {}",
            prefix,
            keys.len(),
            self.store.location()
        );
        Ok(keys)
    }

    /// Load everything under `prefix` into `table`.
    pub async fn store_to_relational(&self, prefix: &str, table: &str) -> Result<u64> {
        let dataset = self.store.read(prefix).await?;
        debug!(
            "{}: read {} rows from {}",
            prefix,
            dataset.num_rows(),
            self.store.location()
        );

        let rows = self.loader.load(&dataset, table, &self.target).await?;
        debug!("{}: loaded {} rows into {}", prefix, rows, table);
        Ok(rows)
    }

    /// Verify every dataset has a local source file.
    pub fn check_sources(&self, datasets: &[String]) -> Result<()> {
        let missing: Vec<String> = datasets
            .iter()
            .map(|name| self.local.dataset_path(name))
            .filter(|path| !path.is_file())
            .map(|path| path.display().to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(TransferError::NotFound(format!(
                "missing local source file(s): {}",
                missing.join(", ")
            )))
        }
    }

    /// Run both stages for each dataset, strictly in order.
    ///
    /// Recoverable errors are logged and recorded in the result; any other error
    /// aborts the batch and is returned.
    pub async fn run(&self, datasets: &[String]) -> Result<BatchResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!("Starting transfer run: {}", run_id);

        let mut outcomes = Vec::with_capacity(datasets.len());
        for name in datasets {
            let job = self.job(name);
            let job_start = Instant::now();
            let mut outcome = DatasetOutcome {
                name: job.name.clone(),
                status: "completed".to_string(),
                objects_written: 0,
                rows_loaded: 0,
                duration_seconds: 0.0,
                error: None,
            };

            debug!(
                "{}: {} -> {}/{} -> {}",
                job.name,
                job.local_path.display(),
                self.store.location(),
                job.store_prefix,
                job.table
            );

            match self.execute(&job, &mut outcome).await {
                Ok(()) => {
                    info!(
                        "{}: pipeline completed ({} rows loaded)",
                        job.name, outcome.rows_loaded
                    );
                }
                Err(e) if e.is_recoverable() => {
                    error!("{}: pipeline failed - {}", job.name, e);
                    outcome.status = "failed".to_string();
                    outcome.error = Some(e.to_string());
                }
                Err(e) => return Err(e),
            }

            outcome.duration_seconds = job_start.elapsed().as_secs_f64();
            outcomes.push(outcome);
        }

        let failed_datasets: Vec<String> = outcomes
            .iter()
            .filter(|o| o.error.is_some())
            .map(|o| o.name.clone())
            .collect();
        let rows_loaded = outcomes.iter().map(|o| o.rows_loaded).sum();

        let result = BatchResult {
            run_id,
            status: if failed_datasets.is_empty() {
                "completed".to_string()
            } else {
                "completed_with_failures".to_string()
            },
            started_at,
            completed_at: Utc::now(),
            duration_seconds: start.elapsed().as_secs_f64(),
            datasets_total: outcomes.len(),
            datasets_success: outcomes.len() - failed_datasets.len(),
            datasets_failed: failed_datasets.len(),
            rows_loaded,
            datasets: outcomes,
            failed_datasets,
        };

        info!(
            "Transfer {}: {}/{} datasets, {} rows in {:.1}s",
            result.status,
            result.datasets_success,
            result.datasets_total,
            result.rows_loaded,
            result.duration_seconds
        );

        Ok(result)
    }

    async fn execute(&self, job: &TransferJob, outcome: &mut DatasetOutcome) -> Result<()> {
        let keys = self
            .local_to_store(&job.local_path, &job.store_prefix)
            .await?;
        outcome.objects_written = keys.len();
        outcome.rows_loaded = self
            .store_to_relational(&job.store_prefix, &job.table)
            .await?;
        Ok(())
    }

    /// Check that the store and the database are reachable.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let start = Instant::now();
        let store_result = self.store.health_check().await;
        let store_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let target_result = self.loader.health_check(&self.target).await;
        let target_latency_ms = start.elapsed().as_millis() as u64;

        let store_connected = store_result.is_ok();
        let target_connected = target_result.is_ok();

        Ok(HealthCheckResult {
            store_location: self.store.location(),
            store_connected,
            store_latency_ms,
            store_error: store_result.err().map(|e| e.to_string()),
            target_type: self.loader.db_type().to_string(),
            target_connected,
            target_latency_ms,
            target_error: target_result.err().map(|e| e.to_string()),
            healthy: store_connected && target_connected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Dataset;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use async_trait::async_trait;
    use object_store::memory::InMemory;
    use std::sync::Mutex;

    struct RecordingLoader {
        loads: Mutex<Vec<(String, usize)>>,
        fail_with: Option<fn() -> TransferError>,
    }

    impl RecordingLoader {
        fn new() -> Self {
            Self {
                loads: Mutex::new(Vec::new()),
                fail_with: None,
            }
        }
    }

    #[async_trait]
    impl BulkLoader for RecordingLoader {
        async fn load(&self, dataset: &Dataset, table: &str, _: &TargetConfig) -> Result<u64> {
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            self.loads
                .lock()
                .unwrap()
                .push((table.to_string(), dataset.num_rows()));
            Ok(dataset.num_rows() as u64)
        }

        async fn health_check(&self, _: &TargetConfig) -> Result<()> {
            Err(TransferError::Connection("refused".into()))
        }

        fn db_type(&self) -> &str {
            "recording"
        }
    }

    fn bad_target() -> TransferError {
        TransferError::Config("bad target".into())
    }

    fn target() -> TargetConfig {
        TargetConfig {
            host: "localhost".to_string(),
            port: 5432,
            database: "bank".to_string(),
            user: "etl".to_string(),
            password: String::new(),
            schema: None,
            ssl_mode: "disable".to_string(),
            connect_timeout_secs: 5,
        }
    }

    fn orchestrator(
        dir: &Path,
        loader: Arc<RecordingLoader>,
    ) -> (Orchestrator, Arc<ObjectDatasetStore>) {
        let codec = ParquetCodec::default();
        let store = Arc::new(ObjectDatasetStore::new(
            Arc::new(InMemory::new()),
            codec.clone(),
        ));
        let orch = Orchestrator::new(
            store.clone(),
            loader,
            codec,
            LocalConfig {
                data_dir: dir.to_path_buf(),
            },
            target(),
        );
        (orch, store)
    }

    async fn write_local(dir: &Path, name: &str, rows: i64) {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let dataset = Dataset::try_new(
            schema,
            vec![Arc::new(Int64Array::from((0..rows).collect::<Vec<_>>()))],
        )
        .unwrap();
        ParquetCodec::default()
            .write_file(&dataset, &dir.join(format!("{}.parquet", name)))
            .await
            .unwrap();
    }

    #[test]
    fn test_job_layout() {
        let dir = tempfile::tempdir().unwrap();
        let (mut orch, _) = orchestrator(dir.path(), Arc::new(RecordingLoader::new()));
        let job = orch.job("customers");
        assert_eq!(job.local_path, dir.path().join("customers.parquet"));
        assert_eq!(job.store_prefix, "customers");
        assert_eq!(job.table, "customers");

        orch.target.schema = Some("bank".to_string());
        assert_eq!(orch.job("loans").table, "bank.loans");
    }

    #[tokio::test]
    async fn test_missing_local_file_never_touches_store() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, store) = orchestrator(dir.path(), Arc::new(RecordingLoader::new()));

        let err = orch
            .local_to_store(&dir.path().join("customers.parquet"), "customers")
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::NotFound(_)));
        assert!(store.list("customers").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_loads_every_dataset() {
        let dir = tempfile::tempdir().unwrap();
        write_local(dir.path(), "customers", 3).await;
        write_local(dir.path(), "loans", 5).await;
        let loader = Arc::new(RecordingLoader::new());
        let (orch, _) = orchestrator(dir.path(), loader.clone());

        let datasets = vec!["customers".to_string(), "loans".to_string()];
        orch.check_sources(&datasets).unwrap();
        let result = orch.run(&datasets).await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.rows_loaded, 8);
        assert_eq!(result.datasets[1].objects_written, 1);
        assert_eq!(
            *loader.loads.lock().unwrap(),
            vec![("customers".to_string(), 3), ("loans".to_string(), 5)]
        );
        assert!(result.to_json().unwrap().contains("\"status\": \"completed\""));
    }

    #[tokio::test]
    async fn test_run_contains_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        write_local(dir.path(), "loans", 2).await;
        let (orch, _) = orchestrator(dir.path(), Arc::new(RecordingLoader::new()));

        let datasets = vec!["customers".to_string(), "loans".to_string()];
        assert!(matches!(
            orch.check_sources(&datasets),
            Err(TransferError::NotFound(_))
        ));

        let result = orch.run(&datasets).await.unwrap();
        assert_eq!(result.failed_datasets, vec!["customers"]);
        assert_eq!(result.datasets_success, 1);
        assert_eq!(result.status, "completed_with_failures");
    }

    #[tokio::test]
    async fn test_run_aborts_on_unrecoverable_error() {
        let dir = tempfile::tempdir().unwrap();
        write_local(dir.path(), "customers", 1).await;
        let loader = Arc::new(RecordingLoader {
            loads: Mutex::new(Vec::new()),
            fail_with: Some(bad_target as fn() -> TransferError),
        });
        let (orch, _) = orchestrator(dir.path(), loader);

        let err = orch.run(&["customers".to_string()]).await.unwrap_err();
        assert!(matches!(err, TransferError::Config(_)));
    }

    #[tokio::test]
    async fn test_health_check_reports_each_side() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, _) = orchestrator(dir.path(), Arc::new(RecordingLoader::new()));
        let result = orch.health_check().await.unwrap();
        assert!(result.store_connected);
        assert!(!result.target_connected);
        assert!(!result.healthy);
        assert_eq!(result.target_type, "recording");
        assert!(result.target_error.unwrap().contains("refused"));
    }
}
