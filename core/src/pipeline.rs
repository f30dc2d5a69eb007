//! One synchronization run for one entity type
//!
//! Change replay, export reconciliation and refresh run in that order: the
//! refresh policies need current membership and the freshest change dates.

use crate::config::{Config, LimitsConfig};
use crate::entity::EntityType;
use crate::error::{Result, TmdbIndexError};
use crate::export::{fetch_export, reconcile_export};
use crate::planner::plan_dates;
use crate::refresh::{refresh_external_ids, select_for_refresh};
use crate::replay::replay_changes;
use crate::table::KeyedTable;
use crate::upstream::Upstream;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Smallest replay window that reaches past the watermark: the overlap day,
/// the watermark day and one new day.
pub const MIN_REPLAY_DAYS: usize = 3;

fn replay_window(days_limit: usize) -> usize {
    if days_limit < MIN_REPLAY_DAYS {
        log::warn!(
            "days limit {days_limit} cannot advance the watermark; replaying {MIN_REPLAY_DAYS} day(s)"
        );
    }
    days_limit.max(MIN_REPLAY_DAYS)
}

/// Per-run caps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub days_limit: usize,
    pub backfill_limit: usize,
    pub refresh_limit: usize,
    pub concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&LimitsConfig> for SyncOptions {
    fn from(limits: &LimitsConfig) -> Self {
        Self {
            days_limit: limits.days,
            backfill_limit: limits.backfill,
            refresh_limit: limits.refresh,
            concurrency: Config::default().tmdb.concurrency,
        }
    }
}

impl From<&Config> for SyncOptions {
    fn from(config: &Config) -> Self {
        Self {
            concurrency: config.tmdb.concurrency,
            ..Self::from(&config.limits)
        }
    }
}

/// What a run did, step by step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub entity: Option<EntityType>,
    pub dates_planned: usize,
    pub dates_replayed: Vec<NaiveDate>,
    pub change_events: usize,
    pub export_size: usize,
    pub selected_changed: usize,
    pub selected_backfill: usize,
    pub selected_refresh: usize,
    pub lookups: usize,
    pub lookups_succeeded: usize,
    pub lookups_not_found: usize,
    pub rows_before: usize,
    pub rows_after: usize,
}

/// Progress notifications emitted while a run is in flight
pub trait SyncProgress: Sync {
    fn step(&self, message: &str);
    fn lookups(&self, done: u64, total: u64);
}

/// Result of [`process`]
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub table: KeyedTable,
    pub report: SyncReport,
}

/// Run change replay, export reconciliation and refresh against `table`.
///
/// `today` is the last date replayed and the preferred export date.
pub async fn process<U>(
    table: &KeyedTable,
    entity: EntityType,
    upstream: &U,
    options: &SyncOptions,
    today: NaiveDate,
    progress: Option<&dyn SyncProgress>,
) -> Result<SyncOutcome>
where
    U: Upstream + ?Sized,
{
    let mut report = SyncReport {
        entity: Some(entity),
        rows_before: table.height(),
        ..SyncReport::default()
    };
    let step = |message: &str| {
        log::info!("{message}");
        if let Some(p) = progress {
            p.step(message);
        }
    };

    let mut dates = plan_dates(table, entity.epoch(), today)?;
    report.dates_planned = dates.len();
    let days_limit = replay_window(options.days_limit);
    if dates.len() > days_limit {
        log::info!(
            "{} day(s) behind; replaying the first {} this run",
            dates.len(),
            days_limit
        );
        dates.truncate(days_limit);
    }

    step(&format!("Replaying {} day(s) of {entity} changes", dates.len()));
    let (replayed, stats) = replay_changes(table, entity, upstream, &dates).await?;
    report.dates_replayed = stats.dates_replayed;
    report.change_events = stats.events;

    step(&format!("Reconciling {entity} export membership"));
    let membership = fetch_export(upstream, entity, today).await?;
    report.export_size = membership.len();
    let reconciled = reconcile_export(&replayed, &membership)?;

    let selection = select_for_refresh(&reconciled, options.backfill_limit, options.refresh_limit)?;
    report.selected_changed = selection.changed;
    report.selected_backfill = selection.backfill;
    report.selected_refresh = selection.refresh;
    report.lookups = selection.ids.len();

    step(&format!("Fetching external ids for {} {entity} ids", selection.ids.len()));
    let on_lookup: &(dyn Fn(u64, u64) + Sync) = &|done, total| {
        if let Some(p) = progress {
            p.lookups(done, total);
        }
    };
    let (refreshed, results) = refresh_external_ids(
        &reconciled,
        entity,
        upstream,
        &selection.ids,
        options.concurrency,
        Some(on_lookup),
    )
    .await?;
    report.lookups_succeeded = results.iter().filter(|r| r.success).count();
    report.lookups_not_found = results.len() - report.lookups_succeeded;
    report.rows_after = refreshed.height();

    Ok(SyncOutcome {
        table: refreshed,
        report,
    })
}

/// Check that a run only ever grew the table.
///
/// Row count must not decrease, and every column of `before` must still be
/// present with the same type.
pub fn verify_integrity(before: &KeyedTable, after: &KeyedTable) -> Result<()> {
    if after.height() < before.height() {
        return Err(TmdbIndexError::integrity(format!(
            "table shrank from {} to {} rows",
            before.height(),
            after.height()
        )));
    }

    let after_schema = after.schema();
    for field in before.schema().fields() {
        match after_schema.field_with_name(field.name()) {
            Ok(kept) if kept.data_type() == field.data_type() => {}
            Ok(kept) => {
                return Err(TmdbIndexError::integrity(format!(
                    "column '{}' changed type from {} to {}",
                    field.name(),
                    field.data_type(),
                    kept.data_type()
                )))
            }
            Err(_) => {
                return Err(TmdbIndexError::integrity(format!(
                    "column '{}' disappeared",
                    field.name()
                )))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns;
    use arrow::array::{Int64Array, UInt32Array};
    use arrow::datatypes::{DataType, Field};
    use std::sync::Arc;

    fn table(ids: Vec<u32>) -> KeyedTable {
        KeyedTable::from_columns(
            vec![columns::id_field()],
            vec![Arc::new(UInt32Array::from(ids))],
        )
        .unwrap()
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.limits.days = 3;
        config.tmdb.concurrency = 16;
        let options = SyncOptions::from(&config);
        assert_eq!(options.days_limit, 3);
        assert_eq!(options.backfill_limit, 1_000);
        assert_eq!(options.concurrency, 16);
    }

    #[test]
    fn test_replay_window_reaches_past_watermark() {
        assert_eq!(replay_window(0), MIN_REPLAY_DAYS);
        assert_eq!(replay_window(2), MIN_REPLAY_DAYS);
        assert_eq!(replay_window(3), 3);
        assert_eq!(replay_window(30), 30);
    }

    #[test]
    fn test_integrity_rejects_shrinking() {
        let err = verify_integrity(&table(vec![0, 1, 2]), &table(vec![0, 1])).unwrap_err();
        assert!(matches!(err, TmdbIndexError::IntegrityViolation(_)));
        assert!(verify_integrity(&table(vec![0]), &table(vec![0, 1])).is_ok());
    }

    #[test]
    fn test_integrity_rejects_lost_or_retyped_columns() {
        let before = KeyedTable::from_columns(
            vec![columns::id_field(), Field::new("v", DataType::Int64, true)],
            vec![
                Arc::new(UInt32Array::from(vec![0])),
                Arc::new(Int64Array::from(vec![1])),
            ],
        )
        .unwrap();
        assert!(verify_integrity(&before, &table(vec![0, 1])).is_err());

        let retyped = KeyedTable::from_columns(
            vec![columns::id_field(), Field::new("v", DataType::Utf8, true)],
            vec![
                Arc::new(UInt32Array::from(vec![0])),
                Arc::new(arrow::array::StringArray::from(vec!["1"])),
            ],
        )
        .unwrap();
        assert!(verify_integrity(&before, &retyped).is_err());
    }
}
