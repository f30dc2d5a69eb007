//! Export snapshot membership and the `in_export` flag
//!
//! The flag is a pure function of the most recent published export: it is
//! rebuilt from scratch on every run and keeps no history.

use crate::columns;
use crate::entity::EntityType;
use crate::error::{Result, TmdbIndexError};
use crate::table::KeyedTable;
use crate::upstream::ExportSource;
use arrow::array::{ArrayRef, BooleanArray};
use chrono::{Days, NaiveDate};
use std::sync::Arc;

/// Sorted, deduplicated set of ids present in an export snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportMembership {
    ids: Vec<u32>,
}

impl ExportMembership {
    pub fn from_ids(ids: impl IntoIterator<Item = u32>) -> Self {
        let mut ids: Vec<u32> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }
}

/// Whether every export file making up `entity`'s snapshot is published for `date`
pub async fn export_available<S>(source: &S, entity: EntityType, date: NaiveDate) -> Result<bool>
where
    S: ExportSource + ?Sized,
{
    for kind in entity.export_kinds() {
        if !source.export_available(kind, date).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Latest export date: `today` when already published, otherwise the day before.
pub async fn latest_export_date<S>(source: &S, entity: EntityType, today: NaiveDate) -> Result<NaiveDate>
where
    S: ExportSource + ?Sized,
{
    if export_available(source, entity, today).await? {
        return Ok(today);
    }
    let yesterday = today
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| TmdbIndexError::invalid_input(format!("no day before {today}")))?;
    log::debug!("{entity} export for {today} not published yet, using {yesterday}");
    Ok(yesterday)
}

/// Fetch the current membership snapshot for `entity` (the union of its export files).
pub async fn fetch_export<S>(source: &S, entity: EntityType, today: NaiveDate) -> Result<ExportMembership>
where
    S: ExportSource + ?Sized,
{
    let date = latest_export_date(source, entity, today).await?;
    let mut ids = Vec::new();
    for kind in entity.export_kinds() {
        ids.extend(source.fetch_export_file(kind, date).await?);
    }
    let membership = ExportMembership::from_ids(ids);
    log::info!("{entity} export {date}: {} ids", membership.len());
    Ok(membership)
}

/// Replace the `in_export` column with membership in `membership`.
///
/// Ids absent from the snapshot are flagged `false`. The column keeps its
/// previous position, or is appended when the table did not have it.
pub fn reconcile_export(table: &KeyedTable, membership: &ExportMembership) -> Result<KeyedTable> {
    let position = table.schema().index_of(columns::IN_EXPORT).ok();
    let stripped = table.drop_column(columns::IN_EXPORT)?;

    let flags: BooleanArray = table
        .ids()
        .values()
        .iter()
        .map(|id| Some(membership.contains(*id)))
        .collect();
    let flags: ArrayRef = Arc::new(flags);

    stripped.insert_column(position, columns::in_export_field(), flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int64Array, UInt32Array};
    use arrow::datatypes::{DataType, Field};
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn flags(table: &KeyedTable) -> Vec<Option<bool>> {
        table
            .column(columns::IN_EXPORT)
            .unwrap()
            .as_any()
            .downcast_ref::<BooleanArray>()
            .unwrap()
            .iter()
            .collect()
    }

    #[test]
    fn test_membership_sorted_and_deduplicated() {
        let m = ExportMembership::from_ids(vec![5, 1, 5, 3]);
        assert_eq!(m.ids(), &[1, 3, 5]);
        assert!(m.contains(3));
        assert!(!m.contains(2));
    }

    #[test]
    fn test_flag_appended_when_new() {
        let table = KeyedTable::from_columns(
            vec![columns::id_field(), Field::new("v", DataType::Int64, true)],
            vec![
                Arc::new(UInt32Array::from(vec![0, 1, 2])),
                Arc::new(Int64Array::from(vec![1, 2, 3])),
            ],
        )
        .unwrap();
        let result = reconcile_export(&table, &ExportMembership::from_ids(vec![2, 0, 9])).unwrap();
        assert_eq!(result.column_names(), vec!["id", "v", "in_export"]);
        assert_eq!(flags(&result), vec![Some(true), Some(false), Some(true)]);
    }

    #[test]
    fn test_existing_flag_replaced_in_place() {
        let table = KeyedTable::from_columns(
            vec![
                columns::id_field(),
                columns::in_export_field(),
                Field::new("v", DataType::Int64, true),
            ],
            vec![
                Arc::new(UInt32Array::from(vec![0, 1])),
                Arc::new(BooleanArray::from(vec![Some(true), None])),
                Arc::new(Int64Array::from(vec![1, 2])),
            ],
        )
        .unwrap();
        let result = reconcile_export(&table, &ExportMembership::from_ids(vec![1])).unwrap();
        assert_eq!(result.column_names(), vec!["id", "in_export", "v"]);
        assert_eq!(flags(&result), vec![Some(false), Some(true)]);
    }

    #[test]
    fn test_empty_membership_flags_everything_false() {
        let table = KeyedTable::from_columns(
            vec![columns::id_field()],
            vec![Arc::new(UInt32Array::from(vec![0, 1]))],
        )
        .unwrap();
        let result = reconcile_export(&table, &ExportMembership::default()).unwrap();
        assert_eq!(flags(&result), vec![Some(false), Some(false)]);
        assert_eq!(result.column(columns::IN_EXPORT).unwrap().null_count(), 0);
    }

    struct Files {
        published: HashMap<(String, NaiveDate), Vec<u32>>,
    }

    #[async_trait]
    impl ExportSource for Files {
        async fn export_available(&self, kind: &str, date: NaiveDate) -> Result<bool> {
            Ok(self.published.contains_key(&(kind.to_string(), date)))
        }

        async fn fetch_export_file(&self, kind: &str, date: NaiveDate) -> Result<Vec<u32>> {
            self.published
                .get(&(kind.to_string(), date))
                .cloned()
                .ok_or_else(|| TmdbIndexError::upstream(format!("{kind} {date} missing")))
        }
    }

    #[tokio::test]
    async fn test_movie_export_falls_back_and_unions() {
        let today = NaiveDate::from_ymd_opt(2025, 2, 2).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let mut published = HashMap::new();
        published.insert(("movie".to_string(), yesterday), vec![10, 2]);
        published.insert(("collection".to_string(), yesterday), vec![7, 2]);
        // only half of today's movie snapshot is out
        published.insert(("movie".to_string(), today), vec![1]);
        let files = Files { published };

        assert_eq!(
            latest_export_date(&files, EntityType::Movie, today).await.unwrap(),
            yesterday
        );
        let membership = fetch_export(&files, EntityType::Movie, today).await.unwrap();
        assert_eq!(membership.ids(), &[2, 7, 10]);
    }
}
