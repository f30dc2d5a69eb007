//! Common test utilities and fixtures

#![allow(dead_code)]

use arrow::array::{Array, ArrayRef, BooleanArray, Date32Array, TimestampNanosecondArray, UInt32Array};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tmdb_index_core::columns;
use tmdb_index_core::upstream::{
    ChangeEvent, ChangeFeed, ExportSource, ExternalIdsPayload, ExternalIdsResult, ExternalIdsSource,
};
use tmdb_index_core::{EntityType, KeyedTable, Result, TmdbIndexError};

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// In-memory upstream with fixed answers and a fixed lookup clock
pub struct StaticUpstream {
    pub changes: HashMap<NaiveDate, Vec<ChangeEvent>>,
    pub exports: HashMap<(String, NaiveDate), Vec<u32>>,
    pub external_ids: HashMap<u32, ExternalIdsPayload>,
    pub broken_ids: HashSet<u32>,
    pub retrieved_at: DateTime<Utc>,
    pub lookups: AtomicUsize,
    pub change_requests: AtomicUsize,
}

impl StaticUpstream {
    pub fn new(retrieved_at: DateTime<Utc>) -> Self {
        Self {
            changes: HashMap::new(),
            exports: HashMap::new(),
            external_ids: HashMap::new(),
            broken_ids: HashSet::new(),
            retrieved_at,
            lookups: AtomicUsize::new(0),
            change_requests: AtomicUsize::new(0),
        }
    }

    pub fn at_noon(date: NaiveDate) -> Self {
        Self::new(
            Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).expect("valid time")),
        )
    }

    pub fn with_change(mut self, date: NaiveDate, id: u32, adult: Option<bool>) -> Self {
        self.changes
            .entry(date)
            .or_default()
            .push(ChangeEvent { id, date, adult });
        self
    }

    /// Publish the same ids under every export kind of `entity`
    pub fn with_export(mut self, entity: EntityType, date: NaiveDate, ids: &[u32]) -> Self {
        for kind in entity.export_kinds() {
            self.exports.insert((kind.to_string(), date), ids.to_vec());
        }
        self
    }

    pub fn with_imdb(mut self, id: u32, imdb: &str) -> Self {
        self.external_ids.insert(
            id,
            ExternalIdsPayload {
                imdb_id: Some(imdb.to_string()),
                tvdb_id: None,
                wikidata_id: None,
            },
        );
        self
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeFeed for StaticUpstream {
    async fn fetch_changes(&self, _entity: EntityType, date: NaiveDate) -> Result<Vec<ChangeEvent>> {
        self.change_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.changes.get(&date).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ExportSource for StaticUpstream {
    async fn export_available(&self, kind: &str, date: NaiveDate) -> Result<bool> {
        Ok(self.exports.contains_key(&(kind.to_string(), date)))
    }

    async fn fetch_export_file(&self, kind: &str, date: NaiveDate) -> Result<Vec<u32>> {
        Ok(self
            .exports
            .get(&(kind.to_string(), date))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ExternalIdsSource for StaticUpstream {
    async fn fetch_external_ids(&self, entity: EntityType, id: u32) -> Result<ExternalIdsResult> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.broken_ids.contains(&id) {
            return Err(TmdbIndexError::upstream(format!("connection reset looking up {id}")));
        }
        Ok(ExternalIdsResult::from_payload(
            entity,
            id,
            self.retrieved_at,
            self.external_ids.get(&id).cloned(),
        ))
    }
}

/// Table with `{id, date}` rows
pub fn dated_table(rows: &[(u32, Option<NaiveDate>)]) -> KeyedTable {
    let ids: ArrayRef = Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.0)));
    let dates: ArrayRef = Arc::new(Date32Array::from(
        rows.iter()
            .map(|r| r.1.map(columns::date_to_days))
            .collect::<Vec<_>>(),
    ));
    KeyedTable::from_columns(vec![columns::id_field(), columns::date_field()], vec![ids, dates])
        .expect("valid table")
}

pub fn bool_column(table: &KeyedTable, name: &str) -> Vec<Option<bool>> {
    table
        .column(name)
        .expect("column present")
        .as_any()
        .downcast_ref::<BooleanArray>()
        .expect("boolean column")
        .iter()
        .collect()
}

pub fn u32_column(table: &KeyedTable, name: &str) -> Vec<Option<u32>> {
    table
        .column(name)
        .expect("column present")
        .as_any()
        .downcast_ref::<UInt32Array>()
        .expect("u32 column")
        .iter()
        .collect()
}

pub fn date_column(table: &KeyedTable) -> Vec<Option<NaiveDate>> {
    table
        .column(columns::DATE)
        .expect("date column present")
        .as_any()
        .downcast_ref::<Date32Array>()
        .expect("date32 column")
        .iter()
        .map(|d| d.and_then(columns::days_to_date))
        .collect()
}

pub fn retrieved_count(table: &KeyedTable) -> usize {
    table
        .column(columns::RETRIEVED_AT)
        .map(|c| {
            let ts = c
                .as_any()
                .downcast_ref::<TimestampNanosecondArray>()
                .expect("timestamp column");
            ts.len() - ts.null_count()
        })
        .unwrap_or(0)
}

/// Temporary directory holding table files for a test
pub struct TestWorkspace {
    pub temp_dir: TempDir,
    pub path: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().to_path_buf();
        Self { temp_dir, path }
    }

    pub fn table_path(&self, entity: EntityType) -> PathBuf {
        self.path.join(format!("{entity}.parquet"))
    }
}
