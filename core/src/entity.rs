//! Entity types tracked by the catalog and their per-type quirks

use crate::columns;
use arrow::datatypes::{Schema, SchemaRef};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Top-level TMDB category. Each variant carries its own change-feed epoch,
/// export file names and external-id schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Movie,
    Tv,
    Person,
}

impl EntityType {
    /// Path segment used by the TMDB API
    pub fn api_path(&self) -> &'static str {
        match self {
            EntityType::Movie => "movie",
            EntityType::Tv => "tv",
            EntityType::Person => "person",
        }
    }

    /// First date of the upstream change feed; replay of an empty table starts here.
    pub fn epoch(&self) -> NaiveDate {
        let (y, m, d) = match self {
            EntityType::Movie => (2012, 10, 1),
            EntityType::Tv => (2012, 10, 1),
            EntityType::Person => (2012, 10, 1),
        };
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
    }

    /// Daily export files whose union forms this type's membership snapshot
    pub fn export_kinds(&self) -> &'static [&'static str] {
        match self {
            EntityType::Movie => &["movie", "collection"],
            EntityType::Tv => &["tv_series"],
            EntityType::Person => &["person"],
        }
    }

    /// Pattern extracting the numeric part of an IMDb identifier
    pub fn imdb_pattern(&self) -> &'static str {
        match self {
            EntityType::Movie | EntityType::Tv => r"tt(\d+)",
            EntityType::Person => r"nm(\d+)",
        }
    }

    /// Movies never carry a TheTVDB cross-reference.
    pub fn has_tvdb_id(&self) -> bool {
        !matches!(self, EntityType::Movie)
    }

    /// Schema of an external-ids delta for this type.
    pub fn external_ids_schema(&self) -> SchemaRef {
        let mut fields = vec![
            columns::id_field(),
            columns::success_field(),
            columns::retrieved_at_field(),
            columns::uint_id_field(columns::IMDB_NUMERIC_ID),
        ];
        if self.has_tvdb_id() {
            fields.push(columns::uint_id_field(columns::TVDB_ID));
        }
        fields.push(columns::uint_id_field(columns::WIKIDATA_NUMERIC_ID));
        Arc::new(Schema::new(fields))
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_path())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "movie" => Ok(EntityType::Movie),
            "tv" => Ok(EntityType::Tv),
            "person" => Ok(EntityType::Person),
            other => Err(format!(
                "unknown TMDB type '{other}' (expected movie, tv or person)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entity_type() {
        assert_eq!("movie".parse::<EntityType>().unwrap(), EntityType::Movie);
        assert_eq!(" TV ".parse::<EntityType>().unwrap(), EntityType::Tv);
        assert_eq!("person".parse::<EntityType>().unwrap(), EntityType::Person);
        assert!("collection".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_movie_schema_has_no_tvdb_id() {
        let movie = EntityType::Movie.external_ids_schema();
        assert!(movie.field_with_name(columns::TVDB_ID).is_err());

        for entity in [EntityType::Tv, EntityType::Person] {
            let schema = entity.external_ids_schema();
            assert!(schema.field_with_name(columns::TVDB_ID).is_ok());
            assert_eq!(schema.field(0).name(), columns::ID);
        }
    }

    #[test]
    fn test_movie_export_is_union_of_two_files() {
        assert_eq!(EntityType::Movie.export_kinds(), &["movie", "collection"]);
        assert_eq!(EntityType::Tv.export_kinds(), &["tv_series"]);
    }
}
