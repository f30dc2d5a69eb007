//! Upsert of a delta table into a base table
//!
//! Semantically this is: left-join the delta onto the base-only columns,
//! concatenate base then delta, and keep the last row per id while
//! preserving first-occurrence order. The implementation plans the output
//! rows once and gathers every column with a single interleave, so no
//! intermediate concatenated table is materialized.

use crate::columns;
use crate::error::{Result, TmdbIndexError};
use crate::table::KeyedTable;
use arrow::array::{new_null_array, Array, ArrayRef, UInt32Array};
use arrow::compute::kernels::interleave::interleave;
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Where an output row takes its values from
#[derive(Debug, Clone, Copy)]
struct RowPlan {
    id: u32,
    base_row: Option<usize>,
    delta_row: Option<usize>,
}

/// Union of two schemas: base columns in order, then delta-only columns in
/// delta order. Shared columns must agree on their declared type.
pub fn union_schema(base: &Schema, delta: &Schema) -> Result<SchemaRef> {
    let mut fields: Vec<Field> = base.fields().iter().map(|f| f.as_ref().clone()).collect();

    for field in delta.fields() {
        match base.field_with_name(field.name()) {
            Ok(existing) => {
                if existing.data_type() != field.data_type() {
                    return Err(TmdbIndexError::schema_conflict(
                        field.name().as_str(),
                        existing.data_type(),
                        field.data_type(),
                    ));
                }
            }
            Err(_) => fields.push(field.as_ref().clone()),
        }
    }

    if !fields.iter().any(|f| f.name() == columns::ID) {
        return Err(TmdbIndexError::integrity("merged schema has no 'id' column"));
    }

    Ok(Arc::new(Schema::new_with_metadata(
        fields,
        base.metadata().clone(),
    )))
}

/// Upsert `delta` into `base`.
///
/// For ids present in both, columns carried by the delta take the delta's
/// value (nulls included) and base-only columns keep the base value. Base
/// rows keep their order; new ids follow in delta order.
pub fn update_or_append(base: &KeyedTable, delta: &KeyedTable) -> Result<KeyedTable> {
    let schema = union_schema(&base.schema(), &delta.schema())?;

    if base.is_empty() {
        return delta.conform(&schema);
    }
    if delta.is_empty() {
        return base.conform(&schema);
    }

    let plan = plan_rows(base, delta);

    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        if field.name() == columns::ID {
            arrays.push(Arc::new(UInt32Array::from_iter_values(
                plan.iter().map(|row| row.id),
            )));
            continue;
        }

        let base_col = base.column(field.name());
        let delta_col = delta.column(field.name());
        let null = new_null_array(field.data_type(), 1);

        let indices: Vec<(usize, usize)> = plan
            .iter()
            .map(|row| match (row.base_row, row.delta_row) {
                (_, Some(d)) if delta_col.is_some() => (1, d),
                (Some(b), _) if base_col.is_some() => (0, b),
                _ => (2, 0),
            })
            .collect();

        let sources: [&dyn Array; 3] = [
            base_col.map(|c| c.as_ref()).unwrap_or(null.as_ref()),
            delta_col.map(|c| c.as_ref()).unwrap_or(null.as_ref()),
            null.as_ref(),
        ];
        arrays.push(interleave(&sources, &indices)?);
    }

    KeyedTable::try_new(RecordBatch::try_new(schema, arrays)?)
}

fn plan_rows(base: &KeyedTable, delta: &KeyedTable) -> Vec<RowPlan> {
    let delta_index = delta.id_index();
    let base_index = base.id_index();

    let mut plan = Vec::with_capacity(base.height() + delta.height());
    for (row, id) in base.ids().values().iter().enumerate() {
        plan.push(RowPlan {
            id: *id,
            base_row: Some(row),
            delta_row: delta_index.get(id).copied(),
        });
    }
    for (row, id) in delta.ids().values().iter().enumerate() {
        if !base_index.contains_key(id) {
            plan.push(RowPlan {
                id: *id,
                base_row: None,
                delta_row: Some(row),
            });
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::DataType;

    fn int_table(ids: Vec<u32>, name: &str, values: Vec<Option<i64>>) -> KeyedTable {
        KeyedTable::from_columns(
            vec![columns::id_field(), Field::new(name, DataType::Int64, true)],
            vec![
                Arc::new(UInt32Array::from(ids)),
                Arc::new(Int64Array::from(values)),
            ],
        )
        .unwrap()
    }

    fn ints(table: &KeyedTable, name: &str) -> Vec<Option<i64>> {
        table
            .column(name)
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap()
            .iter()
            .collect()
    }

    #[test]
    fn test_merges_and_updates() {
        let base = int_table(vec![0, 1], "value", vec![Some(10), Some(20)]);
        let delta = int_table(vec![1, 2], "value", vec![Some(200), Some(30)]);
        let result = update_or_append(&base, &delta).unwrap();
        assert_eq!(result.ids().values().to_vec(), vec![0, 1, 2]);
        assert_eq!(ints(&result, "value"), vec![Some(10), Some(200), Some(30)]);
    }

    #[test]
    fn test_delta_wins_and_id_set_is_union() {
        let base = int_table(vec![1], "v", vec![Some(10)]);
        let delta = int_table(vec![1, 2], "v", vec![Some(200), Some(30)]);
        let result = update_or_append(&base, &delta).unwrap();
        assert_eq!(result.ids().values().to_vec(), vec![1, 2]);
        assert_eq!(ints(&result, "v"), vec![Some(200), Some(30)]);
    }

    #[test]
    fn test_order_base_first_then_new_delta_ids() {
        let base = int_table(vec![5, 3, 9], "v", vec![Some(1), Some(2), Some(3)]);
        let delta = int_table(vec![7, 3, 1], "v", vec![Some(70), Some(30), Some(10)]);
        let result = update_or_append(&base, &delta).unwrap();
        assert_eq!(result.ids().values().to_vec(), vec![5, 3, 9, 7, 1]);
        assert_eq!(
            ints(&result, "v"),
            vec![Some(1), Some(30), Some(3), Some(70), Some(10)]
        );
    }

    #[test]
    fn test_schema_union() {
        let base = int_table(vec![0, 1], "a", vec![Some(1), Some(2)]);
        let delta = int_table(vec![1, 2], "b", vec![Some(20), Some(30)]);
        let result = update_or_append(&base, &delta).unwrap();
        assert_eq!(result.column_names(), vec!["id", "a", "b"]);
        assert_eq!(ints(&result, "a"), vec![Some(1), Some(2), None]);
        assert_eq!(ints(&result, "b"), vec![None, Some(20), Some(30)]);
    }

    #[test]
    fn test_schema_conflict_rejected() {
        let base = int_table(vec![0], "a", vec![Some(1)]);
        let delta = KeyedTable::from_columns(
            vec![columns::id_field(), Field::new("a", DataType::Utf8, true)],
            vec![
                Arc::new(UInt32Array::from(vec![0])),
                Arc::new(StringArray::from(vec!["x"])),
            ],
        )
        .unwrap();
        let err = update_or_append(&base, &delta).unwrap_err();
        assert!(matches!(err, TmdbIndexError::SchemaConflict { ref column, .. } if column == "a"));
    }

    #[test]
    fn test_merge_with_empty_is_identity() {
        let table = int_table(vec![2, 0, 1], "v", vec![Some(1), None, Some(3)]);
        assert_eq!(update_or_append(&table, &KeyedTable::empty()).unwrap(), table);
        assert_eq!(update_or_append(&table, &table).unwrap(), table);
    }

    #[test]
    fn test_empty_base_returns_conformed_delta() {
        let delta = int_table(vec![4, 2], "v", vec![Some(4), Some(2)]);
        let result = update_or_append(&KeyedTable::empty(), &delta).unwrap();
        assert_eq!(result, delta);
    }

    #[test]
    fn test_base_only_columns_survive_for_updated_ids() {
        // base: id 1 has `a` but no `b`; delta only carries `b`
        let base = KeyedTable::from_columns(
            vec![
                columns::id_field(),
                Field::new("a", DataType::Int64, true),
                Field::new("b", DataType::Int64, true),
            ],
            vec![
                Arc::new(UInt32Array::from(vec![1, 2])),
                Arc::new(Int64Array::from(vec![Some(5), None])),
                Arc::new(Int64Array::from(vec![None, Some(6)])),
            ],
        )
        .unwrap();
        let delta = int_table(vec![1, 2], "b", vec![Some(7), None]);

        let result = update_or_append(&base, &delta).unwrap();
        assert_eq!(ints(&result, "a"), vec![Some(5), None]);
        assert_eq!(ints(&result, "b"), vec![Some(7), None]);
    }

    #[test]
    fn test_delta_nulls_overwrite_shared_columns() {
        let base = int_table(vec![1], "v", vec![Some(10)]);
        let delta = int_table(vec![1], "v", vec![None]);
        let result = update_or_append(&base, &delta).unwrap();
        assert_eq!(ints(&result, "v"), vec![None]);
    }
}
