//! TMDB implementation of the upstream collaborators

use super::{ChangeEvent, ChangeFeed, ExportSource, ExternalIdsPayload, ExternalIdsResult, ExternalIdsSource};
use crate::config::TmdbConfig;
use crate::entity::EntityType;
use crate::error::{Result, TmdbIndexError};
use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use flate2::read::GzDecoder;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::{BufRead, BufReader, Read};
use std::time::Duration;

/// One page of `/{type}/changes`
#[derive(Debug, Deserialize)]
struct ChangesPage {
    #[serde(default)]
    results: Vec<RawChange>,
    #[serde(default)]
    total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawChange {
    id: Option<u32>,
    #[serde(default)]
    adult: Option<bool>,
}

/// One line of a daily export file
#[derive(Debug, Deserialize)]
struct ExportLine {
    id: Option<u32>,
}

/// HTTP client for the TMDB API and daily export files
pub struct TmdbClient {
    client: reqwest::Client,
    api_url: String,
    export_url: String,
    api_key: String,
}

impl TmdbClient {
    pub fn new(config: &TmdbConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("tmdb-index/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            export_url: config.export_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn changes_url(&self, entity: EntityType) -> String {
        format!("{}/3/{}/changes", self.api_url, entity.api_path())
    }

    fn external_ids_url(&self, entity: EntityType, id: u32) -> String {
        format!("{}/3/{}/{id}/external_ids", self.api_url, entity.api_path())
    }

    /// URL of the export file `kind` published for `date`
    pub fn export_file_url(&self, kind: &str, date: NaiveDate) -> String {
        format!(
            "{}/p/exports/{kind}_ids_{}.json.gz",
            self.export_url,
            date.format("%m_%d_%Y")
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.send().await?.error_for_status()?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| TmdbIndexError::upstream(format!("malformed response body: {e}")))
    }
}

#[async_trait]
impl ChangeFeed for TmdbClient {
    async fn fetch_changes(&self, entity: EntityType, date: NaiveDate) -> Result<Vec<ChangeEvent>> {
        let start_date = date.format("%Y-%m-%d").to_string();
        let end_date = date
            .checked_add_days(Days::new(1))
            .unwrap_or(date)
            .format("%Y-%m-%d")
            .to_string();

        let mut events = Vec::new();
        let mut page = 1u32;
        loop {
            let request = self.client.get(self.changes_url(entity)).query(&[
                ("api_key", self.api_key.as_str()),
                ("start_date", start_date.as_str()),
                ("end_date", end_date.as_str()),
                ("page", page.to_string().as_str()),
            ]);
            let body: ChangesPage = self.get_json(request).await?;

            events.extend(body.results.into_iter().filter_map(|raw| {
                raw.id.map(|id| ChangeEvent {
                    id,
                    date,
                    adult: raw.adult,
                })
            }));

            let total_pages = body.total_pages.unwrap_or(1);
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        log::debug!("fetch_changes({entity}, {date}): {} events", events.len());
        Ok(events)
    }
}

#[async_trait]
impl ExportSource for TmdbClient {
    async fn export_available(&self, kind: &str, date: NaiveDate) -> Result<bool> {
        let url = self.export_file_url(kind, date);
        let response = self.client.head(&url).send().await?;
        export_status(&url, response.status())
    }

    async fn fetch_export_file(&self, kind: &str, date: NaiveDate) -> Result<Vec<u32>> {
        let url = self.export_file_url(kind, date);
        log::debug!("downloading export {url}");
        let body = self.client.get(&url).send().await?.error_for_status()?.bytes().await?;

        let ids = tokio::task::spawn_blocking(move || parse_export(GzDecoder::new(&body[..])))
            .await
            .map_err(|e| TmdbIndexError::upstream(format!("export decoding task failed: {e}")))??;

        log::debug!("export {kind} {date}: {} ids", ids.len());
        Ok(ids)
    }
}

#[async_trait]
impl ExternalIdsSource for TmdbClient {
    async fn fetch_external_ids(&self, entity: EntityType, id: u32) -> Result<ExternalIdsResult> {
        let retrieved_at = Utc::now();
        let response = self
            .client
            .get(self.external_ids_url(entity, id))
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;

        let found = lookup_status(response.status()).map_err(|e| {
            log::error!("Error fetching external IDs for {entity} {id}: {e}");
            e
        })?;
        if !found {
            return Ok(ExternalIdsResult::from_payload(entity, id, retrieved_at, None));
        }

        let body = response.bytes().await?;
        let payload: ExternalIdsPayload = serde_json::from_slice(&body).map_err(|e| {
            TmdbIndexError::upstream(format!("malformed external_ids body for {entity} {id}: {e}"))
        })?;

        Ok(ExternalIdsResult::from_payload(entity, id, retrieved_at, Some(payload)))
    }
}

/// Whether a HEAD on an export file means it is published. Client errors
/// mean not yet; server errors fail the run.
fn export_status(url: &str, status: StatusCode) -> Result<bool> {
    if status.is_success() {
        Ok(true)
    } else if status.is_client_error() {
        log::debug!("export {url} not available: {status}");
        Ok(false)
    } else {
        Err(TmdbIndexError::upstream(format!("HEAD {url}: {status}")))
    }
}

/// `Ok(false)` when the id is unknown upstream, an error for any other failure
fn lookup_status(status: StatusCode) -> Result<bool> {
    if status.is_success() {
        Ok(true)
    } else if status == StatusCode::NOT_FOUND {
        Ok(false)
    } else {
        Err(TmdbIndexError::upstream(format!("external_ids lookup: {status}")))
    }
}

/// Decode a line-delimited JSON export. Lines without an id are skipped;
/// lines that are not JSON objects fail the whole export.
pub fn parse_export<R: Read>(reader: R) -> Result<Vec<u32>> {
    let mut ids = Vec::new();
    for (lineno, line) in BufReader::new(reader).lines().enumerate() {
        let line = line.map_err(|e| TmdbIndexError::upstream(format!("export read failed: {e}")))?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: ExportLine = serde_json::from_str(&line).map_err(|e| {
            TmdbIndexError::upstream(format!("malformed export line {}: {e}", lineno + 1))
        })?;
        if let Some(id) = parsed.id {
            ids.push(id);
        }
    }
    Ok(ids)
}
