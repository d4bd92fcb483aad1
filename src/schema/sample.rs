//! Building a [`FileDescriptor`] from Arrow data.
//!
//! Only the file's schema and the first batch are looked at.

use arrow::array::Array;
use arrow::datatypes::{DataType, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};

use super::{DeclaredColumn, DeclaredKind, FileDescriptor, SampleRow, SampleValue};

/// Map an Arrow type onto the kinds inference distinguishes.
pub fn declared_kind(data_type: &DataType) -> DeclaredKind {
    match data_type {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => DeclaredKind::Text,
        DataType::List(_)
        | DataType::LargeList(_)
        | DataType::FixedSizeList(_, _)
        | DataType::ListView(_)
        | DataType::LargeListView(_) => DeclaredKind::List,
        DataType::Struct(_) | DataType::Map(_, _) => DeclaredKind::Struct,
        DataType::Dictionary(_, value) => declared_kind(value),
        _ => DeclaredKind::Other,
    }
}

/// Describe a file from its schema and (optionally) its first batch.
pub fn describe(
    view: Option<&str>,
    schema: &Schema,
    first_batch: Option<&RecordBatch>,
    sample_rows: usize,
) -> Result<FileDescriptor, ArrowError> {
    let columns: Vec<DeclaredColumn> = schema
        .fields()
        .iter()
        .map(|f| DeclaredColumn::new(f.name().clone(), declared_kind(f.data_type())))
        .collect();

    let sample = match first_batch {
        Some(batch) => sample_batch(batch, &columns, sample_rows)?,
        None => Vec::new(),
    };

    Ok(FileDescriptor {
        view: view.map(str::to_string),
        columns,
        sample,
    })
}

fn sample_batch(
    batch: &RecordBatch,
    columns: &[DeclaredColumn],
    sample_rows: usize,
) -> Result<Vec<SampleRow>, ArrowError> {
    let rows = batch.num_rows().min(sample_rows);
    let mut sample: Vec<SampleRow> = vec![Vec::with_capacity(columns.len()); rows];
    let options = FormatOptions::default();

    for (idx, col) in columns.iter().enumerate() {
        let array = batch.column(idx);
        let formatter = match col.kind {
            DeclaredKind::Text => Some(ArrayFormatter::try_new(array.as_ref(), &options)?),
            _ => None,
        };

        for (row, cells) in sample.iter_mut().enumerate() {
            let value = if array.is_null(row) {
                SampleValue::Null
            } else {
                match (col.kind, &formatter) {
                    (DeclaredKind::Text, Some(f)) => SampleValue::Text(f.value(row).to_string()),
                    (DeclaredKind::List, _) => SampleValue::List,
                    _ => SampleValue::Other,
                }
            };
            cells.push(value);
        }
    }

    Ok(sample)
}
