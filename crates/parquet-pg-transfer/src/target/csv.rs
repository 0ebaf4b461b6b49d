//! CSV payload encoding for `COPY ... FROM STDIN WITH (FORMAT csv)`.
//!
//! PostgreSQL's CSV format reads an unquoted empty field as NULL and a quoted empty
//! field as the empty string, so nulls are written as nothing and values that would be
//! ambiguous are quoted.

use std::fmt::Write as _;

use arrow::array::{Array, ArrayRef};
use arrow::buffer::NullBuffer;
use arrow::datatypes::{DataType, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use bytes::{BufMut, BytesMut};

use crate::error::{Result, TransferError};

/// Check that every column has a text form COPY can ingest.
pub fn check_copy_types(schema: &Schema) -> Result<()> {
    for field in schema.fields() {
        if !has_text_form(field.data_type()) {
            return Err(TransferError::Format(format!(
                "column '{}' has type {} which cannot be loaded with COPY",
                field.name(),
                field.data_type()
            )));
        }
    }
    Ok(())
}

fn has_text_form(data_type: &DataType) -> bool {
    match data_type {
        DataType::Dictionary(_, value) => has_text_form(value),
        DataType::Binary
        | DataType::LargeBinary
        | DataType::BinaryView
        | DataType::FixedSizeBinary(_)
        | DataType::List(_)
        | DataType::LargeList(_)
        | DataType::ListView(_)
        | DataType::LargeListView(_)
        | DataType::FixedSizeList(_, _)
        | DataType::Struct(_)
        | DataType::Map(_, _)
        | DataType::Union(_, _)
        | DataType::RunEndEncoded(_, _) => false,
        _ => true,
    }
}

struct ColumnWriter<'a> {
    nulls: Option<NullBuffer>,
    formatter: Option<ArrayFormatter<'a>>,
}

impl<'a> ColumnWriter<'a> {
    fn try_new(array: &'a ArrayRef, options: &'a FormatOptions<'a>) -> Result<Self> {
        let formatter = match array.data_type() {
            DataType::Null => None,
            _ => Some(ArrayFormatter::try_new(array.as_ref(), options)?),
        };
        Ok(Self {
            nulls: array.logical_nulls(),
            formatter,
        })
    }

    fn is_null(&self, row: usize) -> bool {
        match (&self.formatter, &self.nulls) {
            (None, _) => true,
            (_, Some(nulls)) => nulls.is_null(row),
            (_, None) => false,
        }
    }
}

/// Append rows `offset..offset + len` of `batch` to `buf` as CSV lines.
///
/// No header is written. Column order is batch order.
pub fn encode_rows(batch: &RecordBatch, offset: usize, len: usize, buf: &mut BytesMut) -> Result<()> {
    let options = FormatOptions::default();
    let columns = batch
        .columns()
        .iter()
        .map(|array| ColumnWriter::try_new(array, &options))
        .collect::<Result<Vec<_>>>()?;

    let end = (offset + len).min(batch.num_rows());
    let mut scratch = String::new();

    for row in offset..end {
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                buf.put_u8(b',');
            }
            if column.is_null(row) {
                continue;
            }
            if let Some(formatter) = &column.formatter {
                scratch.clear();
                write!(scratch, "{}", formatter.value(row)).map_err(|_| {
                    TransferError::Format(format!(
                        "cannot render value at row {} of column {}",
                        row,
                        batch.schema().field(i).name()
                    ))
                })?;
                put_field(buf, &scratch);
            }
        }
        buf.put_u8(b'\n');
    }

    Ok(())
}

/// Write one non-null field, quoting when the raw text would be misread.
fn put_field(buf: &mut BytesMut, value: &str) {
    if needs_quotes(value) {
        buf.put_u8(b'"');
        for part in value.split_inclusive('"') {
            buf.put_slice(part.as_bytes());
            if part.ends_with('"') {
                buf.put_u8(b'"');
            }
        }
        buf.put_u8(b'"');
    } else {
        buf.put_slice(value.as_bytes());
    }
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || value == "\\."
        || value
            .bytes()
            .any(|b| matches!(b, b',' | b'"' | b'\n' | b'\r'))
}
