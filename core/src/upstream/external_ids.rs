//! Cross-reference identifiers returned by the per-id lookup

use crate::entity::EntityType;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// Raw `external_ids` response body. Only the consumed fields are modelled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalIdsPayload {
    #[serde(default)]
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub tvdb_id: Option<i64>,
    #[serde(default)]
    pub wikidata_id: Option<String>,
}

/// Outcome of one lookup, failures included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdsResult {
    pub id: u32,
    pub success: bool,
    pub retrieved_at: DateTime<Utc>,
    pub imdb_numeric_id: Option<u32>,
    pub tvdb_id: Option<u32>,
    pub wikidata_numeric_id: Option<u32>,
}

impl ExternalIdsResult {
    /// Lookup that found nothing upstream
    pub fn not_found(id: u32, retrieved_at: DateTime<Utc>) -> Self {
        Self {
            id,
            success: false,
            retrieved_at,
            imdb_numeric_id: None,
            tvdb_id: None,
            wikidata_numeric_id: None,
        }
    }

    /// Interpret a lookup response. `None` means the id was not found.
    ///
    /// Identifiers that do not parse are logged and stored as null; they never
    /// fail the lookup.
    pub fn from_payload(
        entity: EntityType,
        id: u32,
        retrieved_at: DateTime<Utc>,
        payload: Option<ExternalIdsPayload>,
    ) -> Self {
        let Some(payload) = payload else {
            return Self::not_found(id, retrieved_at);
        };

        let imdb_numeric_id = payload
            .imdb_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .and_then(|s| parse_numeric(imdb_regex(entity), s, "IMDb", id));

        let wikidata_numeric_id = payload
            .wikidata_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .and_then(|s| parse_numeric(wikidata_regex(), s, "Wikidata", id));

        let tvdb_id = payload.tvdb_id.and_then(|raw| match u32::try_from(raw) {
            Ok(v) if v > 0 => Some(v),
            Ok(_) => None,
            Err(_) => {
                log::warn!("TheTVDB ID out of range for {entity} {id}: {raw}");
                None
            }
        });

        Self {
            id,
            success: true,
            retrieved_at,
            imdb_numeric_id,
            tvdb_id,
            wikidata_numeric_id,
        }
    }
}

fn parse_numeric(re: &Regex, raw: &str, label: &str, id: u32) -> Option<u32> {
    let parsed = re
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok());
    if parsed.is_none() {
        log::warn!("{label} ID parse error for {id}: {raw}");
    }
    parsed
}

fn imdb_regex(entity: EntityType) -> &'static Regex {
    static TITLE: OnceLock<Regex> = OnceLock::new();
    static NAME: OnceLock<Regex> = OnceLock::new();
    let cell = match entity {
        EntityType::Person => &NAME,
        EntityType::Movie | EntityType::Tv => &TITLE,
    };
    cell.get_or_init(|| Regex::new(entity.imdb_pattern()).expect("Invalid IMDb pattern"))
}

fn wikidata_regex() -> &'static Regex {
    static WIKIDATA: OnceLock<Regex> = OnceLock::new();
    WIKIDATA.get_or_init(|| Regex::new(r"Q(\d+)").expect("Invalid Wikidata pattern"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    fn payload(imdb: Option<&str>, tvdb: Option<i64>, wikidata: Option<&str>) -> ExternalIdsPayload {
        ExternalIdsPayload {
            imdb_id: imdb.map(str::to_string),
            tvdb_id: tvdb,
            wikidata_id: wikidata.map(str::to_string),
        }
    }

    #[test]
    fn test_parses_movie_ids() {
        let result = ExternalIdsResult::from_payload(
            EntityType::Movie,
            550,
            now(),
            Some(payload(Some("tt0137523"), None, Some("Q190050"))),
        );
        assert!(result.success);
        assert_eq!(result.imdb_numeric_id, Some(137523));
        assert_eq!(result.wikidata_numeric_id, Some(190050));
        assert_eq!(result.tvdb_id, None);
    }

    #[test]
    fn test_person_uses_name_prefix() {
        let person = ExternalIdsResult::from_payload(
            EntityType::Person,
            287,
            now(),
            Some(payload(Some("nm0000093"), Some(1234), None)),
        );
        assert_eq!(person.imdb_numeric_id, Some(93));
        assert_eq!(person.tvdb_id, Some(1234));

        // a title id on a person is an anomaly, not an error
        let anomaly = ExternalIdsResult::from_payload(
            EntityType::Person,
            287,
            now(),
            Some(payload(Some("tt0000093"), None, None)),
        );
        assert!(anomaly.success);
        assert_eq!(anomaly.imdb_numeric_id, None);
    }

    #[test]
    fn test_not_found_has_no_ids() {
        let result = ExternalIdsResult::from_payload(EntityType::Tv, 1, now(), None);
        assert_eq!(result, ExternalIdsResult::not_found(1, now()));
        assert!(!result.success);
    }

    #[test]
    fn test_unparseable_and_empty_values_become_null() {
        let result = ExternalIdsResult::from_payload(
            EntityType::Tv,
            1399,
            now(),
            Some(payload(Some(""), Some(-5), Some("not-a-qid"))),
        );
        assert!(result.success);
        assert_eq!(result.imdb_numeric_id, None);
        assert_eq!(result.tvdb_id, None);
        assert_eq!(result.wikidata_numeric_id, None);
    }

    #[test]
    fn test_payload_deserializes_with_missing_fields() {
        let payload: ExternalIdsPayload =
            serde_json::from_str(r#"{"id": 550, "imdb_id": "tt0137523", "facebook_id": null}"#)
                .unwrap();
        assert_eq!(payload.imdb_id.as_deref(), Some("tt0137523"));
        assert!(payload.tvdb_id.is_none());
    }
}
