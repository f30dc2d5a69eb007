//! # tmdb-index-core
//!
//! Incremental synchronization engine for a local, id-keyed index of the TMDB
//! catalog. Each run replays the daily change feed, reconciles membership
//! against the latest export snapshot and refreshes a bounded set of
//! external-id lookups, folding everything into one columnar table per
//! entity type.
//!
//! The crate is independent of any interface: the CLI (and tests) drive it
//! through [`pipeline::process`] with any [`upstream::Upstream`] implementation.

pub mod change_detection;
pub mod columns;
pub mod config;
pub mod densify;
pub mod entity;
pub mod error;
pub mod export;
pub mod merge;
pub mod pipeline;
pub mod planner;
pub mod refresh;
pub mod replay;
pub mod storage;
pub mod table;
pub mod upstream;

// Re-export the most commonly used types for convenience
pub use change_detection::{summary, ChangeSummary};
pub use config::Config;
pub use densify::align_id_col;
pub use entity::EntityType;
pub use error::{Result, TmdbIndexError};
pub use export::{reconcile_export, ExportMembership};
pub use merge::update_or_append;
pub use pipeline::{process, verify_integrity, SyncOptions, SyncOutcome, SyncProgress, SyncReport};
pub use planner::plan_dates;
pub use refresh::{select_for_refresh, RefreshSelection};
pub use storage::{LocalStorage, TableStorage};
pub use table::KeyedTable;
pub use upstream::{TmdbClient, Upstream};
