//! Upstream collaborators consumed by the synchronization engine
//!
//! The engine only talks to these traits. [`TmdbClient`] is the production
//! implementation; tests provide in-memory ones.

use crate::entity::EntityType;
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

pub mod external_ids;
pub mod tmdb;

pub use external_ids::{ExternalIdsPayload, ExternalIdsResult};
pub use tmdb::TmdbClient;

/// One entity whose upstream record changed on `date`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub id: u32,
    pub date: NaiveDate,
    pub adult: Option<bool>,
}

/// Daily change feed
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Change events announced for `date`, in upstream order.
    /// Events without an id are already dropped.
    async fn fetch_changes(&self, entity: EntityType, date: NaiveDate) -> Result<Vec<ChangeEvent>>;
}

/// Periodic full-membership export files
#[async_trait]
pub trait ExportSource: Send + Sync {
    /// Whether the export file `kind` for `date` has been published
    async fn export_available(&self, kind: &str, date: NaiveDate) -> Result<bool>;

    /// Ids listed in the export file `kind` for `date`
    async fn fetch_export_file(&self, kind: &str, date: NaiveDate) -> Result<Vec<u32>>;
}

/// Per-id cross-reference lookup
#[async_trait]
pub trait ExternalIdsSource: Send + Sync {
    /// Look up one id. Not-found must come back as `success = false`;
    /// only transport-level failures are errors.
    async fn fetch_external_ids(&self, entity: EntityType, id: u32) -> Result<ExternalIdsResult>;
}

/// Everything the pipeline needs from upstream
pub trait Upstream: ChangeFeed + ExportSource + ExternalIdsSource {}

impl<T: ChangeFeed + ExportSource + ExternalIdsSource> Upstream for T {}
