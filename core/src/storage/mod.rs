use crate::error::Result;
use crate::table::KeyedTable;
use async_trait::async_trait;
use std::path::Path;

/// Where catalog tables live between runs
#[async_trait]
pub trait TableStorage: Send + Sync {
    /// Load the table stored at `path`
    async fn read_table(&self, path: &Path) -> Result<KeyedTable>;

    /// Replace the table stored at `path`
    async fn write_table(&self, path: &Path, table: &KeyedTable) -> Result<()>;

    /// Check if a table exists at `path`
    async fn exists(&self, path: &Path) -> Result<bool>;
}

pub mod local;

pub use local::{LocalStorage, TableLock};
