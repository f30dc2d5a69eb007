//! Row-level diff between two snapshots of a keyed table
//!
//! Rows are matched by `id`. A row counts as updated when its content digest
//! differs between the snapshots. Digests are blake3 hashes of the row's
//! Arrow row encoding after both tables are conformed to their union schema,
//! so a column introduced by schema evolution that is still all-null does not
//! mark rows as changed.

use crate::error::Result;
use crate::merge::union_schema;
use crate::table::KeyedTable;
use arrow::row::{RowConverter, SortField};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Counts of added, removed and updated rows between two snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
}

impl ChangeSummary {
    pub fn has_changes(&self) -> bool {
        self.added > 0 || self.removed > 0 || self.updated > 0
    }

    pub fn total_changes(&self) -> usize {
        self.added + self.removed + self.updated
    }
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{} -{} ~{}", self.added, self.removed, self.updated)
    }
}

/// Content digest of every row, keyed by id
#[derive(Debug, Default)]
pub struct RowDigests {
    digests: HashMap<u32, blake3::Hash>,
}

impl RowDigests {
    /// Digest each row of `table` using the column layout of `table` itself.
    pub fn compute(table: &KeyedTable) -> Result<Self> {
        let batch = table.batch();
        let fields = batch
            .schema()
            .fields()
            .iter()
            .map(|f| SortField::new(f.data_type().clone()))
            .collect();
        let converter = RowConverter::new(fields)?;
        let rows = converter.convert_columns(batch.columns())?;

        let mut digests = HashMap::with_capacity(table.height());
        for (row, id) in table.ids().values().iter().enumerate() {
            digests.insert(*id, blake3::hash(rows.row(row).as_ref()));
        }
        Ok(Self { digests })
    }

    pub fn get(&self, id: u32) -> Option<&blake3::Hash> {
        self.digests.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.digests.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.digests.keys().copied()
    }
}

/// Compare two snapshots of a table.
///
/// `updated` is the number of ids common to both whose full row differs,
/// i.e. common-by-key minus identical-by-content.
pub fn summary(old: &KeyedTable, new: &KeyedTable) -> Result<ChangeSummary> {
    let schema = union_schema(&old.schema(), &new.schema())?;
    let old_digests = RowDigests::compute(&old.conform(&schema)?)?;
    let new_digests = RowDigests::compute(&new.conform(&schema)?)?;

    let mut result = ChangeSummary::default();
    for id in new_digests.ids() {
        match old_digests.get(id) {
            None => result.added += 1,
            Some(old_hash) => {
                if new_digests.get(id) != Some(old_hash) {
                    result.updated += 1;
                }
            }
        }
    }
    result.removed = old_digests
        .ids()
        .filter(|id| !new_digests.contains(*id))
        .count();

    log::debug!("change summary: {result}");
    Ok(result)
}
