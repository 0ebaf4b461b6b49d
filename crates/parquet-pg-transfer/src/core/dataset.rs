//! In-memory tabular dataset.
//!
//! A [`Dataset`] is an ordered set of named, typed, nullable columns sharing one row
//! count. It wraps a single Arrow [`RecordBatch`], which is what the codec produces and
//! what the bulk loader consumes.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{new_null_array, Array, ArrayRef};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{Field, FieldRef, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::error::{Result, TransferError};

/// An ordered collection of named, typed columns with a uniform row count.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    batch: RecordBatch,
}

impl Dataset {
    /// Wrap an existing record batch.
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Build a dataset from a schema and matching columns.
    pub fn try_new(schema: SchemaRef, columns: Vec<ArrayRef>) -> Result<Self> {
        Ok(Self::new(RecordBatch::try_new(schema, columns)?))
    }

    /// A dataset with the given schema and no rows.
    pub fn empty(schema: SchemaRef) -> Self {
        Self::new(RecordBatch::new_empty(schema))
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// Column names in dataset order.
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Project and reorder columns by name.
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        let schema = self.batch.schema();
        let indices = names
            .iter()
            .map(|name| {
                schema.index_of(name).map_err(|_| {
                    TransferError::Format(format!("dataset has no column '{}'", name))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(self.batch.project(&indices)?))
    }

    /// Split into consecutive datasets of at most `max_rows` rows.
    ///
    /// An empty dataset yields a single empty part so the schema is preserved.
    pub fn split(&self, max_rows: usize) -> Vec<Dataset> {
        let max_rows = max_rows.max(1);
        let rows = self.num_rows();
        if rows <= max_rows {
            return vec![self.clone()];
        }
        (0..rows)
            .step_by(max_rows)
            .map(|offset| Self::new(self.batch.slice(offset, max_rows.min(rows - offset))))
            .collect()
    }

    /// Union the rows of several datasets into one.
    ///
    /// The result schema holds every column seen, in first-seen order. A column absent
    /// from some part is null-filled there and marked nullable. Columns whose types
    /// cannot be reconciled fail with [`TransferError::Format`].
    pub fn union(parts: Vec<Dataset>) -> Result<Self> {
        let mut parts = parts.into_iter();
        let first = match parts.next() {
            Some(first) => first,
            None => {
                return Err(TransferError::Format(
                    "cannot union an empty list of datasets".into(),
                ))
            }
        };
        let rest: Vec<Dataset> = parts.collect();
        if rest.is_empty() {
            return Ok(first);
        }

        let all: Vec<&Dataset> = std::iter::once(&first).chain(rest.iter()).collect();
        let schema = union_schema(&all)?;

        let aligned = all
            .iter()
            .map(|part| align_to(part, &schema))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(concat_batches(&schema, &aligned)?))
    }
}

/// Merge the schemas of all parts into one.
fn union_schema(parts: &[&Dataset]) -> Result<SchemaRef> {
    let mut fields: Vec<Field> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for part in parts {
        for field in part.schema().fields() {
            match positions.get(field.name()) {
                Some(&idx) => {
                    let merged = &mut fields[idx];
                    merged.try_merge(field).map_err(|e| {
                        TransferError::Format(format!(
                            "incompatible types for column '{}': {}",
                            field.name(),
                            e
                        ))
                    })?;
                }
                None => {
                    positions.insert(field.name().clone(), fields.len());
                    fields.push(field.as_ref().clone());
                }
            }
        }
    }

    for field in fields.iter_mut() {
        let missing_somewhere = parts
            .iter()
            .any(|part| part.schema().field_with_name(field.name()).is_err());
        if missing_somewhere && !field.is_nullable() {
            *field = field.clone().with_nullable(true);
        }
    }

    Ok(Arc::new(Schema::new(fields)))
}

/// Reorder, cast and null-fill a part's columns to match `schema`.
fn align_to(part: &Dataset, schema: &SchemaRef) -> Result<RecordBatch> {
    let rows = part.num_rows();
    let columns = schema
        .fields()
        .iter()
        .map(|field: &FieldRef| -> Result<ArrayRef> {
            match part.column(field.name()) {
                Some(column) if column.data_type() == field.data_type() => Ok(column.clone()),
                Some(column) => cast(column, field.data_type()).map_err(|e| {
                    TransferError::Format(format!(
                        "cannot convert column '{}' from {} to {}: {}",
                        field.name(),
                        column.data_type(),
                        field.data_type(),
                        e
                    ))
                }),
                None => Ok(new_null_array(field.data_type(), rows)),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let options = RecordBatchOptions::new().with_row_count(Some(rows));
    Ok(RecordBatch::try_new_with_options(
        schema.clone(),
        columns,
        &options,
    )?)
}
