//! Error types for tmdb-index

use thiserror::Error;

/// Errors raised by the synchronization engine and its adapters.
///
/// Not-found lookups and unparseable cross-reference identifiers are not
/// represented here: both are recovered where they occur.
#[derive(Error, Debug)]
pub enum TmdbIndexError {
    /// Network failure, timeout, non-2xx response or malformed payload
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// A column shared by two tables has different declared types
    #[error("Schema conflict on column '{column}': {left} vs {right}")]
    SchemaConflict {
        column: String,
        left: String,
        right: String,
    },

    /// The keyed table contract was broken (id missing, null, duplicated,
    /// or the table shrank across a run)
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl TmdbIndexError {
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::IntegrityViolation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn schema_conflict(
        column: impl Into<String>,
        left: &arrow::datatypes::DataType,
        right: &arrow::datatypes::DataType,
    ) -> Self {
        Self::SchemaConflict {
            column: column.into(),
            left: left.to_string(),
            right: right.to_string(),
        }
    }
}

impl From<reqwest::Error> for TmdbIndexError {
    fn from(e: reqwest::Error) -> Self {
        Self::Upstream(e.to_string())
    }
}

impl From<toml::de::Error> for TmdbIndexError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// Result type alias for tmdb-index operations
pub type Result<T> = std::result::Result<T, TmdbIndexError>;
