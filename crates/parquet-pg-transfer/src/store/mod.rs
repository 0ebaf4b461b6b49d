//! Object store adapter.
//!
//! Datasets live under a prefix inside one bucket. Each write adds new objects named
//! `<prefix>/part-<UTC timestamp>-<uuid>-<shard>.parquet`, and a read returns the union
//! of every object under the prefix.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectStore, PutPayload, RetryConfig};
use tracing::debug;
use uuid::Uuid;

use crate::codec::ParquetCodec;
use crate::config::{StoreConfig, StoreProvider};
use crate::core::{Dataset, DatasetStore};
use crate::error::{Result, TransferError};

/// Build an object store client for the configured provider.
pub fn build_object_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.provider {
        StoreProvider::S3 => build_s3_store(config),
        StoreProvider::Local => build_local_store(config),
        StoreProvider::Memory => Ok(Arc::new(InMemory::new())),
    }
}

fn build_s3_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>> {
    let client_options = ClientOptions::new()
        .with_allow_http(!config.use_ssl)
        .with_allow_invalid_certificates(!config.verify);

    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(&config.bucket)
        .with_region(&config.region)
        .with_virtual_hosted_style_request(false)
        .with_client_options(client_options)
        .with_retry(no_retry());

    if let Some(endpoint) = &config.endpoint {
        builder = builder.with_endpoint(endpoint);
    }

    if let (Some(key), Some(secret)) = (&config.access_key, &config.secret_key) {
        builder = builder
            .with_access_key_id(key)
            .with_secret_access_key(secret);
    }

    let store = builder
        .build()
        .map_err(|e| TransferError::Config(format!("Failed to create S3 client: {}", e)))?;

    Ok(Arc::new(store))
}

/// Requests fail on the first error; the orchestrator decides what happens next.
fn no_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 0,
        ..Default::default()
    }
}

fn build_local_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>> {
    let root = config.root.as_ref().ok_or_else(|| {
        TransferError::Config("store.root is required for the local provider".into())
    })?;
    let bucket_dir = root.join(&config.bucket);

    std::fs::create_dir_all(&bucket_dir).map_err(|e| {
        TransferError::Config(format!(
            "Failed to create local storage directory {}: {}",
            bucket_dir.display(),
            e
        ))
    })?;

    let store = LocalFileSystem::new_with_prefix(&bucket_dir).map_err(|e| {
        TransferError::Config(format!("Failed to create local filesystem store: {}", e))
    })?;

    Ok(Arc::new(store))
}

/// [`DatasetStore`] backed by any [`ObjectStore`].
pub struct ObjectDatasetStore {
    store: Arc<dyn ObjectStore>,
    codec: ParquetCodec,
    location: String,
    max_rows_per_object: Option<usize>,
}

impl ObjectDatasetStore {
    /// Wrap an object store client.
    pub fn new(store: Arc<dyn ObjectStore>, codec: ParquetCodec) -> Self {
        Self {
            store,
            codec,
            location: "memory://".to_string(),
            max_rows_per_object: None,
        }
    }

    /// Build from configuration.
    pub fn from_config(
        config: &StoreConfig,
        codec: ParquetCodec,
        max_rows_per_object: Option<usize>,
    ) -> Result<Self> {
        let store = build_object_store(config)?;
        let scheme = match config.provider {
            StoreProvider::S3 => "s3",
            StoreProvider::Local => "file",
            StoreProvider::Memory => "memory",
        };
        Ok(Self::new(store, codec)
            .with_location(format!("{}://{}", scheme, config.bucket))
            .with_max_rows_per_object(max_rows_per_object))
    }

    /// Cap the number of rows per written object.
    pub fn with_max_rows_per_object(mut self, max_rows: Option<usize>) -> Self {
        self.max_rows_per_object = max_rows;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Access the underlying client.
    pub fn inner(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }
}

#[async_trait]
impl DatasetStore for ObjectDatasetStore {
    async fn write(&self, dataset: &Dataset, prefix: &str) -> Result<Vec<String>> {
        let prefix = normalize_prefix(prefix)?;
        let parts = match self.max_rows_per_object {
            Some(max_rows) => dataset.split(max_rows),
            None => vec![dataset.clone()],
        };

        let stamp = Utc::now().format("%Y%m%dT%H%M%S%6fZ").to_string();
        let write_id = Uuid::new_v4();
        let mut keys = Vec::with_capacity(parts.len());

        for (shard, part) in parts.iter().enumerate() {
            let key = object_key(prefix, &stamp, &write_id, shard);
            let bytes = self.codec.encode(part)?;
            let size = bytes.len();

            self.store
                .put(&ObjectPath::from(key.as_str()), PutPayload::from(bytes))
                .await
                .map_err(|e| map_store_error(&key, e))?;

            debug!(
                "Uploaded {} rows ({} bytes) to {}/{}",
                part.num_rows(),
                size,
                self.location,
                key
            );
            keys.push(key);
        }

        Ok(keys)
    }

    async fn read(&self, prefix: &str) -> Result<Dataset> {
        let keys = self.list(prefix).await?;
        if keys.is_empty() {
            return Err(TransferError::NotFound(format!(
                "no objects under {}/{}",
                self.location,
                normalize_prefix(prefix)?
            )));
        }

        let mut parts = Vec::with_capacity(keys.len());
        for key in &keys {
            let bytes = self.get(key).await?;
            let part = self.codec.decode(bytes).map_err(|e| match e {
                TransferError::Format(msg) => TransferError::Format(format!("{}: {}", key, msg)),
                other => other,
            })?;
            debug!("Read {} rows from {}/{}", part.num_rows(), self.location, key);
            parts.push(part);
        }

        Dataset::union(parts)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = normalize_prefix(prefix)?;
        let path = ObjectPath::from(prefix);

        let objects: Vec<_> = self
            .store
            .list(Some(&path))
            .try_collect()
            .await
            .map_err(|e| map_store_error(prefix, e))?;

        let mut keys: Vec<String> = objects
            .into_iter()
            .map(|meta| meta.location.to_string())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn health_check(&self) -> Result<()> {
        let mut listing = self.store.list(None);
        match listing.next().await {
            Some(Err(e)) => Err(map_store_error(&self.location, e)),
            _ => Ok(()),
        }
    }

    fn location(&self) -> String {
        self.location.clone()
    }
}

impl ObjectDatasetStore {
    async fn get(&self, key: &str) -> Result<Bytes> {
        let path = ObjectPath::from(key);
        let result = self
            .store
            .get(&path)
            .await
            .map_err(|e| map_store_error(key, e))?;
        result.bytes().await.map_err(|e| map_store_error(key, e))
    }
}

/// Strip leading and trailing slashes; an empty prefix is rejected.
pub fn normalize_prefix(prefix: &str) -> Result<&str> {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        return Err(TransferError::Config(format!(
            "invalid store prefix '{}'",
            prefix
        )));
    }
    Ok(trimmed)
}

fn object_key(prefix: &str, stamp: &str, write_id: &Uuid, shard: usize) -> String {
    format!("{}/part-{}-{}-{:05}.parquet", prefix, stamp, write_id, shard)
}

fn map_store_error(what: &str, err: object_store::Error) -> TransferError {
    match err {
        object_store::Error::NotFound { .. } => {
            TransferError::NotFound(format!("{}: {}", what, err))
        }
        other => TransferError::Connectivity(format!("{}: {}", what, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    fn dataset(ids: Vec<i64>) -> Dataset {
        let names: Vec<Option<String>> = ids.iter().map(|i| Some(format!("n{}", i))).collect();
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]));
        Dataset::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(ids)),
                Arc::new(StringArray::from(names)),
            ],
        )
        .unwrap()
    }

    fn memory_store() -> ObjectDatasetStore {
        ObjectDatasetStore::new(Arc::new(InMemory::new()), ParquetCodec::default())
    }

    fn sorted_ids(ds: &Dataset) -> Vec<i64> {
        let ids = ds
            .column("id")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        let mut v = ids.values().to_vec();
        v.sort();
        v
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let store = memory_store();
        let keys = store.write(&dataset(vec![1, 2, 3]), "customers").await.unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with("customers/part-"));
        assert!(keys[0].ends_with("-00000.parquet"));

        let read = store.read("customers").await.unwrap();
        assert_eq!(read.column_names(), vec!["id", "name"]);
        assert_eq!(sorted_ids(&read), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_read_is_idempotent() {
        let store = memory_store();
        store.write(&dataset(vec![1, 2]), "loans").await.unwrap();
        let first = store.read("loans").await.unwrap();
        let second = store.read("loans").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_second_write_adds_objects_and_read_unions() {
        let store = memory_store();
        let first = store.write(&dataset(vec![1, 2]), "customers").await.unwrap();
        let second = store.write(&dataset(vec![3]), "customers").await.unwrap();
        assert_ne!(first, second);

        let keys = store.list("customers").await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&first[0]));
        assert!(keys.contains(&second[0]));

        let read = store.read("customers").await.unwrap();
        assert_eq!(sorted_ids(&read), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_missing_prefix_is_not_found() {
        let store = memory_store();
        let err = store.read("nothing").await.unwrap_err();
        assert!(matches!(err, TransferError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_prefix_is_a_directory() {
        let store = memory_store();
        store.write(&dataset(vec![1]), "customers").await.unwrap();
        store
            .write(&dataset(vec![100, 200]), "customers_archive")
            .await
            .unwrap();

        let read = store.read("customers").await.unwrap();
        assert_eq!(sorted_ids(&read), vec![1]);
        assert_eq!(store.list("/customers/").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_max_rows_per_object_shards_the_write() {
        let store = memory_store().with_max_rows_per_object(Some(2));
        let keys = store
            .write(&dataset(vec![1, 2, 3, 4, 5]), "loans")
            .await
            .unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys[2].ends_with("-00002.parquet"));

        let read = store.read("loans").await.unwrap();
        assert_eq!(sorted_ids(&read), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_read_unions_differing_schemas() {
        let store = memory_store();
        store.write(&dataset(vec![1]), "customers").await.unwrap();

        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("score", DataType::Int64, true),
        ]));
        let other = Dataset::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![2])),
                Arc::new(Int64Array::from(vec![Some(7)])),
            ],
        )
        .unwrap();
        store.write(&other, "customers").await.unwrap();

        let read = store.read("customers").await.unwrap();
        assert_eq!(read.num_rows(), 2);
        let mut names = read.column_names();
        names.sort();
        assert_eq!(names, vec!["id", "name", "score"]);
        assert_eq!(read.column("score").unwrap().null_count(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_object_is_format_error() {
        let store = memory_store();
        store
            .inner()
            .put(
                &ObjectPath::from("customers/part-bad.parquet"),
                PutPayload::from(Bytes::from_static(b"not parquet")),
            )
            .await
            .unwrap();
        let err = store.read("customers").await.unwrap_err();
        assert!(matches!(err, TransferError::Format(ref m) if m.contains("part-bad")));
    }

    #[tokio::test]
    async fn test_empty_prefix_rejected() {
        let store = memory_store();
        assert!(store.write(&dataset(vec![1]), "/").await.is_err());
    }

    #[tokio::test]
    async fn test_local_provider_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            provider: StoreProvider::Local,
            endpoint: None,
            region: "us-east-1".to_string(),
            bucket: "landing-zone".to_string(),
            access_key: None,
            secret_key: None,
            use_ssl: false,
            verify: true,
            root: Some(dir.path().to_path_buf()),
        };
        let store =
            ObjectDatasetStore::from_config(&config, ParquetCodec::default(), None).unwrap();
        assert_eq!(store.location(), "file://landing-zone");

        let keys = store.write(&dataset(vec![4, 5]), "customers").await.unwrap();
        assert!(dir.path().join("landing-zone").join(&keys[0]).exists());
        assert_eq!(sorted_ids(&store.read("customers").await.unwrap()), vec![4, 5]);
        store.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_s3_endpoint_fails_without_retrying() {
        let config = StoreConfig {
            provider: StoreProvider::S3,
            endpoint: Some("http://127.0.0.1:1".to_string()),
            region: "us-east-1".to_string(),
            bucket: "landing-zone".to_string(),
            access_key: Some("minio".to_string()),
            secret_key: Some("minio123".to_string()),
            use_ssl: false,
            verify: true,
            root: None,
        };
        let store =
            ObjectDatasetStore::from_config(&config, ParquetCodec::default(), None).unwrap();

        let start = std::time::Instant::now();
        let err = store.write(&dataset(vec![1]), "customers").await.unwrap_err();
        let elapsed = start.elapsed();

        match err {
            TransferError::Connectivity(msg) => assert!(!msg.contains("after 10 retries"), "{}", msg),
            other => panic!("unexpected error: {:?}", other),
        }
        // The default policy backs off for over two seconds before giving up
        assert!(elapsed < std::time::Duration::from_secs(1), "{:?}", elapsed);

        assert!(matches!(
            store.health_check().await,
            Err(TransferError::Connectivity(_))
        ));
    }
}
