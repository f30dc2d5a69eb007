//! Rationing of per-id external-id lookups
//!
//! Three independent policies pick ids for a lookup this run:
//!
//! - **changed**: the entity changed on or after the day of its last fetch
//! - **backfill**: never fetched, capped to `backfill_limit` rows in table order
//! - **refresh**: the `refresh_limit` oldest fetches
//!
//! The union of the three is looked up and folded back into the table.

use crate::columns;
use crate::densify::align_id_col;
use crate::entity::EntityType;
use crate::error::{Result, TmdbIndexError};
use crate::merge::update_or_append;
use crate::table::KeyedTable;
use crate::upstream::{ExternalIdsResult, ExternalIdsSource};
use arrow::array::{Array, ArrayRef, BooleanArray, Date32Array, TimestampNanosecondArray, UInt32Array};
use arrow::datatypes::DataType;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;

const NANOS_PER_DAY: i64 = 86_400 * 1_000_000_000;

/// Ids chosen for lookup, with how many each policy contributed
/// (an id may be counted by more than one policy).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSelection {
    pub ids: Vec<u32>,
    pub changed: usize,
    pub backfill: usize,
    pub refresh: usize,
}

impl RefreshSelection {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

fn retrieved_at_nanos(table: &KeyedTable) -> Result<Option<TimestampNanosecondArray>> {
    let Some(column) = table.column(columns::RETRIEVED_AT) else {
        return Ok(None);
    };
    if column.data_type() != &columns::retrieved_at_type() {
        return Err(TmdbIndexError::schema_conflict(
            columns::RETRIEVED_AT,
            column.data_type(),
            &columns::retrieved_at_type(),
        ));
    }
    Ok(column
        .as_any()
        .downcast_ref::<TimestampNanosecondArray>()
        .cloned())
}

fn change_dates(table: &KeyedTable) -> Result<Option<Date32Array>> {
    let Some(column) = table.column(columns::DATE) else {
        return Ok(None);
    };
    column
        .as_any()
        .downcast_ref::<Date32Array>()
        .cloned()
        .map(Some)
        .ok_or_else(|| {
            TmdbIndexError::schema_conflict(columns::DATE, column.data_type(), &DataType::Date32)
        })
}

/// Pick the ids that get an external-id lookup this run.
///
/// Policies whose columns are missing or whose limit is zero are skipped;
/// when none applies the selection is empty.
pub fn select_for_refresh(
    table: &KeyedTable,
    backfill_limit: usize,
    refresh_limit: usize,
) -> Result<RefreshSelection> {
    let ids = table.ids();
    let retrieved = retrieved_at_nanos(table)?;
    let dates = change_dates(table)?;
    let mut selected = BTreeSet::new();
    let mut selection = RefreshSelection::default();

    // changed since last fetch
    if let (Some(retrieved), Some(dates)) = (&retrieved, &dates) {
        for row in 0..table.height() {
            if retrieved.is_null(row) || dates.is_null(row) {
                continue;
            }
            let fetched_day = retrieved.value(row).div_euclid(NANOS_PER_DAY);
            if i64::from(dates.value(row)) >= fetched_day {
                selected.insert(ids.value(row));
                selection.changed += 1;
            }
        }
    }

    // never fetched
    if backfill_limit > 0 {
        match &retrieved {
            Some(retrieved) => {
                for row in (0..table.height())
                    .filter(|row| retrieved.is_null(*row))
                    .take(backfill_limit)
                {
                    selected.insert(ids.value(row));
                    selection.backfill += 1;
                }
            }
            None => {
                log::warn!(
                    "table has no '{}' column; backfilling the first {backfill_limit} ids",
                    columns::RETRIEVED_AT
                );
                let mut all: Vec<u32> = ids.values().to_vec();
                all.sort_unstable();
                for id in all.into_iter().take(backfill_limit) {
                    selected.insert(id);
                    selection.backfill += 1;
                }
            }
        }
    }

    // oldest fetches
    if refresh_limit > 0 {
        if let Some(retrieved) = &retrieved {
            for id in oldest_fetched(ids, retrieved, refresh_limit) {
                selected.insert(id);
                selection.refresh += 1;
            }
        }
    }

    selection.ids = selected.into_iter().collect();
    log::info!(
        "selected {} ids for external-id lookup (changed {}, backfill {}, refresh {})",
        selection.ids.len(),
        selection.changed,
        selection.backfill,
        selection.refresh
    );
    Ok(selection)
}

/// The `limit` ids with the smallest non-null fetch time, ties broken by id.
fn oldest_fetched(ids: &UInt32Array, retrieved: &TimestampNanosecondArray, limit: usize) -> Vec<u32> {
    let mut candidates: Vec<(i64, u32)> = (0..ids.len())
        .filter(|row| !retrieved.is_null(*row))
        .map(|row| (retrieved.value(row), ids.value(row)))
        .collect();

    if limit < candidates.len() {
        candidates.select_nth_unstable(limit - 1);
        candidates.truncate(limit);
    }
    candidates.sort_unstable();
    candidates.into_iter().map(|(_, id)| id).collect()
}

/// Build the external-ids delta table for `entity`.
///
/// Movies have no `tvdb_id` column; a movie result carrying one is logged and
/// the value dropped.
pub fn external_ids_to_table(entity: EntityType, results: &[ExternalIdsResult]) -> Result<KeyedTable> {
    let schema = entity.external_ids_schema();
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

    if !entity.has_tvdb_id() {
        for result in results.iter().filter(|r| r.tvdb_id.is_some()) {
            log::warn!(
                "unexpected tvdb_id {:?} for {entity} {}; dropping it",
                result.tvdb_id,
                result.id
            );
        }
    }

    for field in schema.fields() {
        let array: ArrayRef = match field.name().as_str() {
            columns::ID => Arc::new(UInt32Array::from_iter_values(results.iter().map(|r| r.id))),
            columns::SUCCESS => Arc::new(
                results
                    .iter()
                    .map(|r| Some(r.success))
                    .collect::<BooleanArray>(),
            ),
            columns::RETRIEVED_AT => Arc::new(TimestampNanosecondArray::from(
                results
                    .iter()
                    .map(|r| r.retrieved_at.timestamp_nanos_opt())
                    .collect::<Vec<_>>(),
            )),
            columns::IMDB_NUMERIC_ID => Arc::new(UInt32Array::from(
                results.iter().map(|r| r.imdb_numeric_id).collect::<Vec<_>>(),
            )),
            columns::TVDB_ID => Arc::new(UInt32Array::from(
                results.iter().map(|r| r.tvdb_id).collect::<Vec<_>>(),
            )),
            columns::WIKIDATA_NUMERIC_ID => Arc::new(UInt32Array::from(
                results
                    .iter()
                    .map(|r| r.wikidata_numeric_id)
                    .collect::<Vec<_>>(),
            )),
            other => {
                return Err(TmdbIndexError::invalid_input(format!(
                    "unknown external-ids column '{other}'"
                )))
            }
        };
        arrays.push(array);
    }

    KeyedTable::from_columns(
        schema.fields().iter().map(|f| f.as_ref().clone()).collect(),
        arrays,
    )
}

/// Look up every id in `ids`, at most `concurrency` at a time.
///
/// Results come back in `ids` order. The first error aborts the batch and
/// discards every result gathered so far.
pub async fn fetch_external_ids<S>(
    source: &S,
    entity: EntityType,
    ids: &[u32],
    concurrency: usize,
    progress: Option<&(dyn Fn(u64, u64) + Sync)>,
) -> Result<Vec<ExternalIdsResult>>
where
    S: ExternalIdsSource + ?Sized,
{
    let total = ids.len() as u64;
    let mut done = 0u64;
    stream::iter(ids.iter().copied())
        .map(|id| source.fetch_external_ids(entity, id))
        .buffered(concurrency.max(1))
        .inspect_ok(|_| {
            done += 1;
            if let Some(callback) = progress {
                callback(done, total);
            }
        })
        .try_collect()
        .await
}

/// Look up `ids` and fold the results into `table` as one delta.
pub async fn refresh_external_ids<S>(
    table: &KeyedTable,
    entity: EntityType,
    source: &S,
    ids: &[u32],
    concurrency: usize,
    progress: Option<&(dyn Fn(u64, u64) + Sync)>,
) -> Result<(KeyedTable, Vec<ExternalIdsResult>)>
where
    S: ExternalIdsSource + ?Sized,
{
    if ids.is_empty() {
        return Ok((table.clone(), Vec::new()));
    }
    let results = fetch_external_ids(source, entity, ids, concurrency, progress).await?;
    let delta = external_ids_to_table(entity, &results)?;
    log::debug!("external id changes:\n{}", delta.pretty(20)?);

    let merged = align_id_col(&update_or_append(table, &delta)?)?;
    Ok((merged, results))
}
