//! Replay of the daily change feed into the catalog table

use crate::columns;
use crate::densify::align_id_col;
use crate::entity::EntityType;
use crate::error::Result;
use crate::merge::update_or_append;
use crate::table::KeyedTable;
use crate::upstream::{ChangeEvent, ChangeFeed};
use arrow::array::{ArrayRef, BooleanArray, Date32Array, UInt32Array};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

/// Counters collected while replaying
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub dates_replayed: Vec<NaiveDate>,
    pub events: usize,
}

/// Build the `{id, date, adult}` delta for one day of events.
///
/// Repeated ids collapse to their last event; surviving rows keep the
/// relative order of those last events.
pub fn changes_to_table(events: &[ChangeEvent]) -> Result<KeyedTable> {
    let mut last: HashMap<u32, usize> = HashMap::with_capacity(events.len());
    for (pos, event) in events.iter().enumerate() {
        last.insert(event.id, pos);
    }
    let kept: Vec<&ChangeEvent> = events
        .iter()
        .enumerate()
        .filter(|(pos, event)| last.get(&event.id) == Some(pos))
        .map(|(_, event)| event)
        .collect();

    let ids: ArrayRef = Arc::new(UInt32Array::from_iter_values(kept.iter().map(|e| e.id)));
    let dates: ArrayRef = Arc::new(Date32Array::from_iter_values(
        kept.iter().map(|e| columns::date_to_days(e.date)),
    ));
    let adult: ArrayRef = Arc::new(kept.iter().map(|e| e.adult).collect::<BooleanArray>());

    KeyedTable::from_columns(
        vec![
            columns::id_field(),
            columns::date_field(),
            columns::adult_field(),
        ],
        vec![ids, dates, adult],
    )
}

/// Fold the change feed for each of `dates` into `table`, in order.
///
/// Every date observes the merges of the dates before it. The table is
/// re-densified after each date.
pub async fn replay_changes<F>(
    table: &KeyedTable,
    entity: EntityType,
    feed: &F,
    dates: &[NaiveDate],
) -> Result<(KeyedTable, ReplayStats)>
where
    F: ChangeFeed + ?Sized,
{
    let mut current = table.clone();
    let mut stats = ReplayStats::default();

    for date in dates {
        let events = feed.fetch_changes(entity, *date).await?;
        let delta = changes_to_table(&events)?;
        log::debug!("{entity} changes on {date}: {} ids", delta.height());

        current = align_id_col(&update_or_append(&current, &delta)?)?;
        stats.events += delta.height();
        stats.dates_replayed.push(*date);
    }

    log::info!(
        "replayed {} day(s) of {entity} changes ({} events)",
        stats.dates_replayed.len(),
        stats.events
    );
    Ok((current, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    fn event(id: u32, day: u32, adult: Option<bool>) -> ChangeEvent {
        ChangeEvent {
            id,
            date: d(day),
            adult,
        }
    }

    #[test]
    fn test_changes_table_schema() {
        let table = changes_to_table(&[event(3, 1, Some(false))]).unwrap();
        assert_eq!(table.column_names(), vec!["id", "date", "adult"]);
    }

    #[test]
    fn test_duplicate_ids_keep_last() {
        let table = changes_to_table(&[
            event(5, 1, Some(false)),
            event(2, 1, None),
            event(5, 1, Some(true)),
        ])
        .unwrap();
        assert_eq!(table.ids().values().to_vec(), vec![2, 5]);
        let adult = table
            .column(columns::ADULT)
            .unwrap()
            .as_any()
            .downcast_ref::<BooleanArray>()
            .unwrap();
        assert!(adult.is_null(0));
        assert!(adult.value(1));
    }

    #[test]
    fn test_empty_day_gives_empty_delta() {
        let table = changes_to_table(&[]).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.column_names(), vec!["id", "date", "adult"]);
    }
}
