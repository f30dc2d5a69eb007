//! Backfill range planning for change-feed replay

use crate::columns;
use crate::error::{Result, TmdbIndexError};
use crate::table::KeyedTable;
use arrow::array::{Array, Date32Array};
use chrono::{Days, NaiveDate};

/// Latest change date recorded in the table, if any.
pub fn watermark(table: &KeyedTable) -> Result<Option<NaiveDate>> {
    let Some(column) = table.column(columns::DATE) else {
        return Ok(None);
    };
    let dates = column
        .as_any()
        .downcast_ref::<Date32Array>()
        .ok_or_else(|| {
            TmdbIndexError::schema_conflict(
                columns::DATE,
                column.data_type(),
                &arrow::datatypes::DataType::Date32,
            )
        })?;

    Ok(dates.iter().flatten().max().and_then(columns::days_to_date))
}

/// Ordered list of dates whose change feed still has to be replayed.
///
/// Starts one day before the watermark (the upstream may still have been
/// assigning events to that day when the previous run read it), or at
/// `epoch` when the table has no recorded change date. Ends at `today`
/// inclusive. Empty when the start lies after `today`.
pub fn plan_dates(table: &KeyedTable, epoch: NaiveDate, today: NaiveDate) -> Result<Vec<NaiveDate>> {
    let start = match watermark(table)? {
        Some(max_date) => max_date.checked_sub_days(Days::new(1)).unwrap_or(max_date),
        None => epoch,
    };

    let dates: Vec<NaiveDate> = start
        .iter_days()
        .take_while(|d| *d <= today)
        .collect();

    log::debug!(
        "planned {} change-feed dates from {start} to {today}",
        dates.len()
    );
    Ok(dates)
}
