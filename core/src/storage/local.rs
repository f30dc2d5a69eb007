use super::TableStorage;
use crate::error::{Result, TmdbIndexError};
use crate::table::KeyedTable;
use arrow::compute::concat_batches;
use async_trait::async_trait;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Parquet files on the local filesystem.
///
/// Relative paths resolve against `base_path`.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.base_path.join(path)
    }

    /// Take the single-writer lock for the table at `path`.
    ///
    /// Fails when another run already holds it.
    pub fn lock(&self, path: &Path) -> Result<TableLock> {
        TableLock::acquire(&self.resolve(path))
    }

    fn writer_properties() -> WriterProperties {
        WriterProperties::builder()
            .set_compression(Compression::ZSTD(ZstdLevel::default()))
            .set_statistics_enabled(EnabledStatistics::Page)
            .build()
    }
}

#[async_trait]
impl TableStorage for LocalStorage {
    async fn read_table(&self, path: &Path) -> Result<KeyedTable> {
        let full_path = self.resolve(path);
        let file = File::open(&full_path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();
        let batches = builder.build()?.collect::<std::result::Result<Vec<_>, _>>()?;

        let batch = concat_batches(&schema, &batches)?;
        log::debug!(
            "read {} rows x {} columns from {}",
            batch.num_rows(),
            batch.num_columns(),
            full_path.display()
        );
        KeyedTable::try_new(batch)
    }

    async fn write_table(&self, path: &Path, table: &KeyedTable) -> Result<()> {
        let full_path = self.resolve(path);
        let dir = match full_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        // Written next to the target so the final rename stays on one filesystem
        let mut tmp = NamedTempFile::new_in(&dir)?;
        let mut writer = ArrowWriter::try_new(
            &mut tmp,
            table.schema(),
            Some(Self::writer_properties()),
        )?;
        writer.write(table.batch())?;
        writer.close()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&full_path).map_err(|e| e.error)?;

        log::debug!("wrote {} rows to {}", table.height(), full_path.display());
        Ok(())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.resolve(path).exists())
    }
}

/// Exclusive `<table>.lock` file, removed when dropped
#[derive(Debug)]
pub struct TableLock {
    path: PathBuf,
}

impl TableLock {
    fn acquire(table_path: &Path) -> Result<Self> {
        let mut name = table_path.as_os_str().to_owned();
        name.push(".lock");
        let path = PathBuf::from(name);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(TmdbIndexError::invalid_input(format!(
                    "{} is locked by another run (remove {} if that run is gone)",
                    table_path.display(),
                    path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TableLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("could not remove lock {}: {e}", self.path.display());
        }
    }
}
