//! Column names and Arrow types of the catalog table

use arrow::datatypes::{DataType, Field, TimeUnit};
use chrono::NaiveDate;

pub const ID: &str = "id";
pub const DATE: &str = "date";
pub const ADULT: &str = "adult";
pub const IN_EXPORT: &str = "in_export";
pub const SUCCESS: &str = "success";
pub const RETRIEVED_AT: &str = "retrieved_at";
pub const IMDB_NUMERIC_ID: &str = "imdb_numeric_id";
pub const TVDB_ID: &str = "tvdb_id";
pub const WIKIDATA_NUMERIC_ID: &str = "wikidata_numeric_id";

/// Arrow type of `retrieved_at`
pub fn retrieved_at_type() -> DataType {
    DataType::Timestamp(TimeUnit::Nanosecond, None)
}

/// The key column. The only non-nullable field of any table.
pub fn id_field() -> Field {
    Field::new(ID, DataType::UInt32, false)
}

pub fn date_field() -> Field {
    Field::new(DATE, DataType::Date32, true)
}

pub fn adult_field() -> Field {
    Field::new(ADULT, DataType::Boolean, true)
}

pub fn in_export_field() -> Field {
    Field::new(IN_EXPORT, DataType::Boolean, true)
}

pub fn success_field() -> Field {
    Field::new(SUCCESS, DataType::Boolean, true)
}

pub fn retrieved_at_field() -> Field {
    Field::new(RETRIEVED_AT, retrieved_at_type(), true)
}

pub fn uint_id_field(name: &str) -> Field {
    Field::new(name, DataType::UInt32, true)
}

/// Days between 0001-01-01 and 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Date32 representation of a calendar date
pub fn date_to_days(date: NaiveDate) -> i32 {
    use chrono::Datelike;
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Calendar date of a Date32 value
pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}
