//! Reindex a keyed table onto the contiguous id range `0..=max(id)`

use crate::columns;
use crate::error::Result;
use crate::table::KeyedTable;
use arrow::array::{ArrayRef, UInt32Array};
use arrow::compute::take;
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Return a table with exactly one row per integer in `0..=max(id)`, sorted
/// by id. Ids absent from the input get nulls in every other column.
/// Empty tables are returned unchanged.
pub fn align_id_col(table: &KeyedTable) -> Result<KeyedTable> {
    let Some(max_id) = table.max_id() else {
        return Ok(table.clone());
    };

    let len = max_id as usize + 1;
    let mut positions: Vec<Option<u32>> = vec![None; len];
    for (row, id) in table.ids().values().iter().enumerate() {
        positions[*id as usize] = Some(row as u32);
    }
    let indices = UInt32Array::from(positions);

    let schema = table.schema();
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for (pos, field) in schema.fields().iter().enumerate() {
        if field.name() == columns::ID {
            arrays.push(Arc::new(UInt32Array::from_iter_values(0..=max_id)));
        } else {
            arrays.push(take(table.batch().column(pos).as_ref(), &indices, None)?);
        }
    }

    KeyedTable::try_new(RecordBatch::try_new(schema, arrays)?)
}

/// Whether `align_id_col` would leave the table unchanged
pub fn is_dense(table: &KeyedTable) -> bool {
    table
        .ids()
        .values()
        .iter()
        .enumerate()
        .all(|(row, id)| *id as usize == row)
}
