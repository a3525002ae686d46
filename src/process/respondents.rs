// src/process/respondents.rs
use arrow::{
    array::{Array, ArrayRef, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::sync::Arc;

use super::raw_table::RawTable;
use super::utils::{clean_str, parse_code};
use crate::error::SchemaError;
use crate::period::STATE_CODES;

/// Turn the harmonized table into a string-typed Arrow batch. Blank cells
/// become nulls so every consumer sees missingness the same way.
pub fn to_record_batch(table: &RawTable) -> Result<RecordBatch, SchemaError> {
    let fields: Vec<Field> = table
        .headers
        .iter()
        .map(|h| Field::new(h, DataType::Utf8, true))
        .collect();
    let columns: Vec<ArrayRef> = (0..table.headers.len())
        .map(|c| {
            let arr: StringArray = table
                .rows
                .iter()
                .map(|row| {
                    row.get(c)
                        .map(|v| clean_str(v))
                        .filter(|v| !v.is_empty())
                })
                .collect();
            Arc::new(arr) as ArrayRef
        })
        .collect();
    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
    Ok(batch)
}

/// Borrow a named string column.
pub fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, SchemaError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| SchemaError::MissingColumn {
            column: name.to_string(),
        })
}

/// Per-row state of residence; `None` when missing or outside 1..=32.
pub fn states(batch: &RecordBatch) -> Result<Vec<Option<i64>>, SchemaError> {
    let ent = string_column(batch, "ent")?;
    Ok((0..ent.len())
        .map(|i| {
            if ent.is_null(i) {
                None
            } else {
                parse_code(ent.value(i)).filter(|s| STATE_CODES.contains(s))
            }
        })
        .collect())
}
