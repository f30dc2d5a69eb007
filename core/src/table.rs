//! Keyed table: an Arrow record batch whose rows are addressed by a unique `id`
//!
//! Every table handed out by this crate satisfies the key contract: the `id`
//! column exists, is `UInt32`, has no nulls and no duplicates. All other
//! columns are nullable.

use crate::columns;
use crate::error::{Result, TmdbIndexError};
use arrow::array::{new_null_array, Array, ArrayRef, UInt32Array};
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct KeyedTable {
    batch: RecordBatch,
    ids: UInt32Array,
}

impl Default for KeyedTable {
    fn default() -> Self {
        Self::empty()
    }
}

impl KeyedTable {
    /// Empty table whose schema is just `{id}`
    pub fn empty() -> Self {
        let schema = Arc::new(Schema::new(vec![columns::id_field()]));
        Self {
            batch: RecordBatch::new_empty(schema),
            ids: UInt32Array::from(Vec::<u32>::new()),
        }
    }

    /// Empty table with the given schema (normalized like [`KeyedTable::try_new`])
    pub fn empty_with_schema(schema: SchemaRef) -> Result<Self> {
        Self::try_new(RecordBatch::new_empty(schema))
    }

    /// Wrap a record batch, validating the key contract.
    ///
    /// The schema is normalized: `id` becomes non-nullable and every other
    /// field nullable. Declared types are left untouched.
    pub fn try_new(batch: RecordBatch) -> Result<Self> {
        let schema = batch.schema();
        let id_pos = schema
            .index_of(columns::ID)
            .map_err(|_| TmdbIndexError::integrity("table has no 'id' column"))?;

        let ids = batch
            .column(id_pos)
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| {
                TmdbIndexError::integrity(format!(
                    "'id' column must be UInt32, found {}",
                    schema.field(id_pos).data_type()
                ))
            })?
            .clone();

        if ids.null_count() > 0 {
            return Err(TmdbIndexError::integrity(format!(
                "'id' column contains {} null values",
                ids.null_count()
            )));
        }

        let mut seen = HashSet::with_capacity(ids.len());
        for id in ids.values().iter() {
            if !seen.insert(*id) {
                return Err(TmdbIndexError::integrity(format!("duplicate id {id}")));
            }
        }

        let fields: Vec<Field> = schema
            .fields()
            .iter()
            .map(|f| {
                let nullable = f.name() != columns::ID;
                f.as_ref().clone().with_nullable(nullable)
            })
            .collect();
        let normalized = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));

        let batch = RecordBatch::try_new(normalized, batch.columns().to_vec())?;
        Ok(Self { batch, ids })
    }

    /// Build a table from parallel field and column lists
    pub fn from_columns(fields: Vec<Field>, columns: Vec<ArrayRef>) -> Result<Self> {
        let schema = Arc::new(Schema::new(fields));
        Self::try_new(RecordBatch::try_new(schema, columns)?)
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().index_of(name).is_ok()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    /// The key column
    pub fn ids(&self) -> &UInt32Array {
        &self.ids
    }

    pub fn max_id(&self) -> Option<u32> {
        self.ids().values().iter().copied().max()
    }

    /// Map from id to row position
    pub fn id_index(&self) -> HashMap<u32, usize> {
        self.ids()
            .values()
            .iter()
            .enumerate()
            .map(|(row, id)| (*id, row))
            .collect()
    }

    /// Reshape to `target`, filling columns this table lacks with nulls.
    ///
    /// Columns of `self` absent from `target` are rejected, as is any shared
    /// column whose declared type differs.
    pub fn conform(&self, target: &SchemaRef) -> Result<KeyedTable> {
        let own = self.batch.schema();
        for field in own.fields() {
            if target.field_with_name(field.name()).is_err() {
                return Err(TmdbIndexError::invalid_input(format!(
                    "cannot conform table: column '{}' is missing from the target schema",
                    field.name()
                )));
            }
        }

        let height = self.height();
        let mut arrays = Vec::with_capacity(target.fields().len());
        for field in target.fields() {
            match own.index_of(field.name()) {
                Ok(pos) => {
                    let existing = own.field(pos).data_type();
                    if existing != field.data_type() {
                        return Err(TmdbIndexError::schema_conflict(
                            field.name().as_str(),
                            existing,
                            field.data_type(),
                        ));
                    }
                    arrays.push(self.batch.column(pos).clone());
                }
                Err(_) => arrays.push(new_null_array(field.data_type(), height)),
            }
        }

        Self::try_new(RecordBatch::try_new(target.clone(), arrays)?)
    }

    /// Remove a non-key column. Missing columns are ignored.
    pub fn drop_column(&self, name: &str) -> Result<KeyedTable> {
        if name == columns::ID {
            return Err(TmdbIndexError::invalid_input("the 'id' column cannot be dropped"));
        }
        match self.batch.schema().index_of(name) {
            Ok(pos) => {
                let mut batch = self.batch.clone();
                batch.remove_column(pos);
                Ok(Self {
                    batch,
                    ids: self.ids.clone(),
                })
            }
            Err(_) => Ok(self.clone()),
        }
    }

    /// Insert `array` as column `field` at `position` (appended when `None`).
    pub fn insert_column(
        &self,
        position: Option<usize>,
        field: Field,
        array: ArrayRef,
    ) -> Result<KeyedTable> {
        if self.has_column(field.name()) {
            return Err(TmdbIndexError::invalid_input(format!(
                "column '{}' already exists",
                field.name()
            )));
        }
        let schema = self.batch.schema();
        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        let mut arrays = self.batch.columns().to_vec();
        let at = position.unwrap_or(fields.len()).min(fields.len());
        fields.insert(at, field);
        arrays.insert(at, array);
        Self::from_columns(fields, arrays)
    }

    /// Render the first `limit` rows as a text table
    pub fn pretty(&self, limit: usize) -> Result<String> {
        let head = self.batch.slice(0, limit.min(self.height()));
        Ok(pretty_format_batches(&[head])?.to_string())
    }
}
