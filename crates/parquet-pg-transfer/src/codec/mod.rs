//! Columnar codec: [`Dataset`] to and from Parquet.
//!
//! Files are written with Snappy compression, dictionary encoding, Parquet writer
//! version 2.0 and the Arrow schema embedded, so column names, order and logical types
//! survive a round trip. Every file carries a format version tag in its key-value
//! metadata and decoding refuses versions it does not know.

use std::path::Path;
use std::sync::Arc;

use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::{WriterProperties, WriterVersion};
use parquet::format::KeyValue;
use tracing::debug;

use crate::core::Dataset;
use crate::error::{Result, TransferError};

/// Key-value metadata key holding the format version.
pub const FORMAT_VERSION_KEY: &str = "parquet_pg_transfer.format_version";

/// The only format version this codec reads and writes.
pub const FORMAT_VERSION: &str = "1";

/// Parquet encoder/decoder for datasets.
#[derive(Debug, Clone)]
pub struct ParquetCodec {
    row_group_size: usize,
}

impl Default for ParquetCodec {
    fn default() -> Self {
        Self::new(64 * 1024)
    }
}

impl ParquetCodec {
    /// Create a codec writing row groups of at most `row_group_size` rows.
    pub fn new(row_group_size: usize) -> Self {
        Self {
            row_group_size: row_group_size.max(1),
        }
    }

    fn writer_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_writer_version(WriterVersion::PARQUET_2_0)
            .set_compression(Compression::SNAPPY)
            .set_dictionary_enabled(true)
            .set_max_row_group_size(self.row_group_size)
            .set_key_value_metadata(Some(vec![KeyValue::new(
                FORMAT_VERSION_KEY.to_string(),
                FORMAT_VERSION.to_string(),
            )]))
            .build()
    }

    /// Encode a dataset as a Parquet file.
    pub fn encode(&self, dataset: &Dataset) -> Result<Bytes> {
        let mut writer = ArrowWriter::try_new(
            Vec::new(),
            dataset.schema(),
            Some(self.writer_properties()),
        )
        .map_err(|e| TransferError::Format(format!("creating parquet writer: {}", e)))?;

        writer
            .write(dataset.batch())
            .map_err(|e| TransferError::Format(format!("writing parquet data: {}", e)))?;

        let buffer = writer
            .into_inner()
            .map_err(|e| TransferError::Format(format!("finishing parquet file: {}", e)))?;

        debug!(
            "Encoded {} rows x {} columns into {} bytes",
            dataset.num_rows(),
            dataset.num_columns(),
            buffer.len()
        );
        Ok(Bytes::from(buffer))
    }

    /// Decode a Parquet file into a dataset.
    pub fn decode(&self, bytes: Bytes) -> Result<Dataset> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)
            .map_err(|e| TransferError::Format(format!("not a valid parquet file: {}", e)))?;

        check_version(
            builder
                .metadata()
                .file_metadata()
                .key_value_metadata()
                .map(|kv| kv.as_slice()),
        )?;

        let schema = builder.schema().clone();
        let reader = builder
            .build()
            .map_err(|e| TransferError::Format(format!("reading parquet file: {}", e)))?;

        let batches = reader
            .collect::<std::result::Result<Vec<RecordBatch>, _>>()
            .map_err(|e| TransferError::Format(format!("decoding parquet data: {}", e)))?;

        let combined = arrow::compute::concat_batches(&schema, &batches)?;
        let normalized = strip_metadata(&schema);
        let options = RecordBatchOptions::new().with_row_count(Some(combined.num_rows()));
        let batch =
            RecordBatch::try_new_with_options(normalized, combined.columns().to_vec(), &options)?;

        Ok(Dataset::new(batch))
    }

    /// Read and decode a local Parquet file.
    pub async fn read_file(&self, path: &Path) -> Result<Dataset> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransferError::NotFound(format!(
                    "local file {} does not exist",
                    path.display()
                )))
            }
            Err(e) => return Err(TransferError::Io(e)),
        };
        self.decode(Bytes::from(bytes))
    }

    /// Encode a dataset and write it to a local file, creating parent directories.
    pub async fn write_file(&self, dataset: &Dataset, path: &Path) -> Result<()> {
        let bytes = self.encode(dataset)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &bytes).await?;
        debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// Files without a tag come from other Parquet producers and are read as plain Parquet.
fn check_version(metadata: Option<&[KeyValue]>) -> Result<()> {
    let tagged = metadata
        .unwrap_or_default()
        .iter()
        .find(|kv| kv.key == FORMAT_VERSION_KEY);

    match tagged.map(|kv| kv.value.as_deref()) {
        None => Ok(()),
        Some(Some(FORMAT_VERSION)) => Ok(()),
        Some(other) => Err(TransferError::Format(format!(
            "unsupported format version '{}' (supported: {})",
            other.unwrap_or(""),
            FORMAT_VERSION
        ))),
    }
}

/// Drop schema- and field-level metadata.
fn strip_metadata(schema: &SchemaRef) -> SchemaRef {
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| f.as_ref().clone().with_metadata(Default::default()))
        .collect();
    Arc::new(Schema::new(fields))
}
